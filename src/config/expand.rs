use serde_json::Value;
use tracing::debug;

use crate::config::run_config::{ConfigSpec, ParamMap};

/// Expand a grid specification into the cross product of its list-valued keys.
///
/// Keys are processed in declaration order. Each list-valued key multiplies the
/// combinations built so far, so values of later keys vary fastest. Scalars are
/// copied into every combination. An empty spec expands to no configs at all.
pub fn expand(spec: &ConfigSpec) -> Vec<ParamMap> {
    if spec.is_empty() {
        return Vec::new();
    }

    let mut combinations = vec![ParamMap::new()];

    for (key, value) in spec {
        match value {
            Value::Array(candidates) => {
                let mut next = Vec::with_capacity(combinations.len() * candidates.len());
                for combination in &combinations {
                    for candidate in candidates {
                        let mut extended = combination.clone();
                        extended.insert(key.clone(), candidate.clone());
                        next.push(extended);
                    }
                }
                combinations = next;
            }
            scalar => {
                for combination in &mut combinations {
                    combination.insert(key.clone(), scalar.clone());
                }
            }
        }
    }

    debug!(keys = spec.len(), configs = combinations.len(), "expanded grid");
    combinations
}
