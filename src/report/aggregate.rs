use serde_json::Value;

use crate::config::{format_value, ParamMap, RunResult};
use crate::error::Result;
use crate::metrics::{confidence_interval, DEFAULT_CONFIDENCE};

/// Placeholder for a metric a result does not report.
pub const MISSING: &str = "N/A";

/// All results sharing one tag, with their formatted summary.
#[derive(Debug, Clone)]
pub struct ResultGroup {
    pub tag: String,
    pub results: Vec<RunResult>,
    /// Metric name to formatted summary, in the group's first-result order.
    pub fields: ParamMap,
}

impl ResultGroup {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn field(&self, key: &str) -> &str {
        self.fields.get(key).and_then(Value::as_str).unwrap_or(MISSING)
    }
}

/// Summary of a finished sweep.
#[derive(Debug, Clone, Default)]
pub struct Report {
    /// `tag` followed by the first result's metric keys.
    pub columns: Vec<String>,
    pub groups: Vec<ResultGroup>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, tag: &str) -> Option<&ResultGroup> {
        self.groups.iter().find(|g| g.tag == tag)
    }

    /// Tag to formatted fields, in first-seen tag order.
    pub fn parsed(&self) -> ParamMap {
        self.groups
            .iter()
            .map(|g| (g.tag.clone(), Value::Object(g.fields.clone())))
            .collect()
    }
}

/// `mean±half` as percentages with one decimal.
///
/// A single sample is reported with a zero interval.
pub fn format_interval(samples: &[f64]) -> Result<String> {
    let (mean, half) = match samples {
        [only] => (*only, 0.0),
        _ => confidence_interval(samples, DEFAULT_CONFIDENCE)?,
    };
    Ok(format!("{:.1}±{:.1}", mean * 100.0, half * 100.0))
}

fn summarize(results: &[RunResult], key: &str) -> Result<String> {
    let numeric: Option<Vec<f64>> = results
        .iter()
        .map(|r| r.get(key).and_then(Value::as_f64))
        .collect();

    if let Some(samples) = numeric {
        return format_interval(&samples);
    }

    let mut text = results
        .first()
        .and_then(|r| r.get(key))
        .map(format_value)
        .unwrap_or_else(|| MISSING.to_string());
    if results.len() > 1 {
        text.push_str(&format!(" ({})", results.len()));
    }
    Ok(text)
}

/// Group results by tag and summarize every metric of each group.
pub fn aggregate(results: &[RunResult]) -> Result<Report> {
    let Some(first) = results.first() else {
        return Ok(Report::default());
    };

    let mut columns = vec!["tag".to_string()];
    columns.extend(first.keys().filter(|k| k.as_str() != "tag").cloned());

    let mut groups: Vec<ResultGroup> = Vec::new();
    for result in results {
        let tag = result
            .get("tag")
            .map(format_value)
            .unwrap_or_else(|| MISSING.to_string());
        match groups.iter_mut().find(|g| g.tag == tag) {
            Some(group) => group.results.push(result.clone()),
            None => groups.push(ResultGroup {
                tag,
                results: vec![result.clone()],
                fields: ParamMap::new(),
            }),
        }
    }

    for group in &mut groups {
        let mut keys = vec!["tag".to_string()];
        keys.extend(
            group.results[0]
                .keys()
                .filter(|k| k.as_str() != "tag")
                .cloned(),
        );
        for key in keys {
            let summary = summarize(&group.results, &key)?;
            group.fields.insert(key, Value::from(summary));
        }
    }

    Ok(Report { columns, groups })
}
