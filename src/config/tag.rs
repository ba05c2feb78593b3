use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::run_config::ParamMap;
use crate::error::Result;

/// Fragment formatter for a reserved key. Receives the raw value.
pub type Formatter = fn(&Value) -> String;

/// Short display names for parameter keys. Unlisted keys display as themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct NamingIndex(HashMap<String, String>);

impl NamingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an index from a YAML mapping of `key: short_name`.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let index: HashMap<String, String> = serde_yaml::from_str(&content)?;
        Ok(Self(index))
    }

    pub fn with(mut self, key: &str, name: &str) -> Self {
        self.0.insert(key.to_string(), name.to_string());
        self
    }

    pub fn display<'a>(&'a self, key: &'a str) -> &'a str {
        self.0.get(key).map(String::as_str).unwrap_or(key)
    }
}

impl From<HashMap<String, String>> for NamingIndex {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

/// Render a parameter value the way it appears inside a tag.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn seed_fragment(value: &Value) -> String {
    format!("-SEED@{}", format_value(value))
}

/// `-D` followed by the last character of the dataset file stem.
fn dataset_fragment(value: &Value) -> String {
    let path = format_value(value);
    let file_name = path.rsplit('/').next().unwrap_or(&path);
    let stem = file_name.split('.').next().unwrap_or(file_name);
    let last = stem.chars().last().map(String::from).unwrap_or_default();
    format!("-D{}", last)
}

fn gpu_fragment(value: &Value) -> String {
    format!("-GPU#{}", format_value(value))
}

fn default_fragment(name: &str, value: &Value) -> String {
    match value {
        Value::Bool(true) => format!("-{}", name),
        Value::Bool(false) | Value::Null => String::new(),
        other => format!("-{}#{}", name, format_value(other)),
    }
}

/// Builds tags and console display names for resolved parameter sets.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    index: NamingIndex,
    block: BTreeSet<String>,
    special: HashMap<String, Formatter>,
}

impl TagGenerator {
    pub fn new<I, S>(index: NamingIndex, block: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut special: HashMap<String, Formatter> = HashMap::new();
        special.insert("seed".to_string(), seed_fragment);
        special.insert("dataset_config".to_string(), dataset_fragment);
        special.insert("gpu".to_string(), gpu_fragment);

        Self {
            index,
            block: block.into_iter().map(Into::into).collect(),
            special,
        }
    }

    /// Register (or replace) the fragment formatter for a reserved key.
    pub fn with_formatter(mut self, key: &str, formatter: Formatter) -> Self {
        self.special.insert(key.to_string(), formatter);
        self
    }

    pub fn is_blocked(&self, key: &str) -> bool {
        self.block.contains(key)
    }

    /// Tag fragments for every non-blocked key, in parameter order.
    pub fn fragments(&self, params: &ParamMap) -> String {
        let mut tag = String::new();
        for (key, value) in params {
            if self.is_blocked(key) {
                continue;
            }
            match self.special.get(key) {
                Some(formatter) => tag.push_str(&formatter(value)),
                None => tag.push_str(&default_fragment(self.index.display(key), value)),
            }
        }
        tag
    }

    /// Full tag: `prefix` followed by the fragments.
    pub fn tag(&self, prefix: &str, params: &ParamMap) -> String {
        format!("{}{}", prefix, self.fragments(params))
    }

    /// Console label from keys that are both reserved and blocked.
    pub fn display_name(&self, params: &ParamMap) -> String {
        params
            .iter()
            .filter(|(key, _)| self.is_blocked(key))
            .filter_map(|(key, value)| self.special.get(key).map(|f| f(value)))
            .collect()
    }

    /// Parameters that take part in the tag, used to tell real duplicates
    /// apart from accidental collisions.
    pub fn identity(&self, params: &ParamMap) -> String {
        let visible: ParamMap = params
            .iter()
            .filter(|(key, _)| !self.is_blocked(key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(visible).to_string()
    }
}
