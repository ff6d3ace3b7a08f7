use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input data for one phase of training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatasetConfig {
    /// A single file pattern, e.g. `data/train-*.csv`.
    Pattern(String),
    /// CSV files matching any of the given patterns.
    Csv { file_pattern: Vec<String> },
}

impl DatasetConfig {
    pub fn file_patterns(&self) -> Vec<&str> {
        match self {
            Self::Pattern(pattern) => vec![pattern.as_str()],
            Self::Csv { file_pattern } => file_pattern.iter().map(String::as_str).collect(),
        }
    }
}

/// Settings for a managed cloud training job.
///
/// Everything except the region is handed to the executor untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudConfig {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_tier: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Where the training job runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTarget {
    Local,
    Cloud(CloudConfig),
}

impl From<Option<CloudConfig>> for ExecutionTarget {
    fn from(cloud: Option<CloudConfig>) -> Self {
        cloud.map_or(Self::Local, Self::Cloud)
    }
}
