use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SweepError};

/// File a training run persists its configuration to inside a checkpoint dir.
pub const CHECKPOINT_CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Deserialize)]
struct CheckpointConfig {
    tag: Option<String>,
}

/// Directories resolve to the config file they contain.
pub fn resolve_checkpoint_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(CHECKPOINT_CONFIG_FILE)
    } else {
        path.to_path_buf()
    }
}

/// Read the training tag recorded in a checkpoint's config file.
pub fn load_checkpoint_tag(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path).map_err(|e| {
        SweepError::Configuration(format!(
            "cannot read checkpoint config {}: {}",
            path.display(),
            e
        ))
    })?;
    let config: CheckpointConfig = serde_yaml::from_str(&content)?;
    config.tag.ok_or_else(|| {
        SweepError::Configuration(format!("checkpoint config {} has no tag", path.display()))
    })
}
