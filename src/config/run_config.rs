use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered parameter bag. Key order is the order parameters were declared in.
pub type ParamMap = serde_json::Map<String, Value>;

/// A grid specification: each value is either a scalar or a list of candidates.
pub type ConfigSpec = ParamMap;

/// Metrics returned by a run function.
pub type RunResult = ParamMap;

/// Key holding the checkpoint reference in test mode.
pub const CHECKPOINT_KEY: &str = "test_from_ckpt";

/// Lifecycle of one configuration within a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Skip,
    Done,
    Interrupted,
    Error,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStatus::Pending => "pending",
            RunStatus::Skip => "skip",
            RunStatus::Done => "done",
            RunStatus::Interrupted => "interrupted",
            RunStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// A fully resolved configuration, ready to be handed to a run function.
///
/// `params` holds the user's parameters exactly as expanded from the grid.
/// Everything else is injected by the runner before execution.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub params: ParamMap,
    pub tag: String,
    /// Console-only label built from blocked special keys (seed, gpu, ...).
    pub display_name: String,
    pub run_id: String,
    pub cid: usize,
    pub gpu: Option<String>,
    pub output: PathBuf,
    pub debug: bool,
    pub offline: bool,
    pub status: RunStatus,
}

impl RunConfig {
    pub fn new(params: ParamMap, cid: usize) -> Self {
        Self {
            params,
            tag: String::new(),
            display_name: String::new(),
            run_id: String::new(),
            cid,
            gpu: None,
            output: PathBuf::from("output"),
            debug: false,
            offline: false,
            status: RunStatus::Pending,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(Value::as_f64)
    }

    /// Seed used for ordering; configs without one sort first.
    pub fn seed(&self) -> f64 {
        self.get_f64("seed").unwrap_or(0.0)
    }

    /// Checkpoint reference for test runs, if any.
    pub fn checkpoint(&self) -> Option<&str> {
        self.get_str(CHECKPOINT_KEY)
    }

    /// Run id named by the config itself, overriding the sweep's.
    pub fn own_run_id(&self) -> Option<&str> {
        self.get_str("run_id")
    }

    /// Flatten params and injected fields into one map.
    ///
    /// Injected fields win over parameters of the same name.
    pub fn to_map(&self) -> ParamMap {
        let mut map = self.params.clone();
        map.insert("tag".to_string(), Value::from(self.tag.clone()));
        map.insert("run_id".to_string(), Value::from(self.run_id.clone()));
        map.insert("cid".to_string(), Value::from(self.cid));
        map.insert(
            "gpu".to_string(),
            self.gpu.clone().map(Value::from).unwrap_or(Value::Null),
        );
        map.insert(
            "output".to_string(),
            Value::from(self.output.to_string_lossy().into_owned()),
        );
        map.insert("debug".to_string(), Value::from(self.debug));
        map.insert("offline".to_string(), Value::from(self.offline));
        map.insert("status".to_string(), Value::from(self.status.to_string()));
        map
    }
}
