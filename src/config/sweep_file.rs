use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::run_config::ConfigSpec;
use crate::config::tag::NamingIndex;
use crate::error::Result;
use crate::runner::{RunOptions, RunnerConfig};

/// Naming index given inline or as a path to a YAML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IndexSource {
    Path(PathBuf),
    Inline(HashMap<String, String>),
}

/// YAML description of a sweep, as consumed by the `sweep` binary.
///
/// ```yaml
/// name: Baseline
/// block: [seed]
/// index: { learning_rate: lr }
/// main_metric: acc
/// train:
///   - model: [a, b]
///     learning_rate: 0.1
///     seed: [1, 2, 3]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SweepFile {
    pub name: Option<String>,
    pub run_id: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub index: Option<IndexSource>,
    pub block: Vec<String>,
    pub train: Vec<ConfigSpec>,
    pub test: Vec<ConfigSpec>,
    pub main_metric: Option<String>,
    pub skip_threshold: Option<f64>,
    pub best_first: bool,
    pub sort_by_seed: bool,
    pub start_index: usize,
}

impl SweepFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Resolve the naming index; relative paths are taken from `base_dir`.
    pub fn naming_index(&self, base_dir: &Path) -> Result<NamingIndex> {
        match &self.index {
            None => Ok(NamingIndex::new()),
            Some(IndexSource::Inline(map)) => Ok(NamingIndex::from(map.clone())),
            Some(IndexSource::Path(path)) => NamingIndex::from_yaml_file(base_dir.join(path)),
        }
    }

    pub fn runner_config(&self, base_dir: &Path, fallback_log_dir: &Path) -> Result<RunnerConfig> {
        let mut config = RunnerConfig {
            run_id: self.run_id.clone(),
            log_dir: self
                .log_dir
                .clone()
                .unwrap_or_else(|| fallback_log_dir.to_path_buf()),
            index: self.naming_index(base_dir)?,
            block: self.block.clone(),
            ..RunnerConfig::default()
        };
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        Ok(config)
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            start_index: self.start_index,
            main_metric: self.main_metric.clone(),
            skip_threshold: self.skip_threshold,
            best_first: self.best_first,
            sort_by_seed: self.sort_by_seed,
            gpu: None,
        }
    }
}
