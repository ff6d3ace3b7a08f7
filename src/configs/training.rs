use std::{
    collections::BTreeMap,
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::execution::{CloudConfig, DatasetConfig, ExecutionTarget};
use crate::{error::TrainError, features::FeatureSource};

const DEFAULT_MAX_STEPS: NonZeroUsize = NonZeroUsize::new(5000).unwrap();
const DEFAULT_TRAIN_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(100).unwrap();
const DEFAULT_EVAL_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(16).unwrap();
const DEFAULT_MIN_EVAL_FREQUENCY: NonZeroUsize = NonZeroUsize::new(100).unwrap();
const DEFAULT_LEARNING_RATE: f64 = 0.01;
const DEFAULT_EPSILON: f64 = 0.0005;

/// Scalar training parameters forwarded to the trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// Number of training steps to perform.
    #[serde(default = "default_max_steps")]
    pub max_steps: NonZeroUsize,
    /// Upper bound on passes over the training data. Training stops at
    /// `max_steps` or `num_epochs`, whichever comes first.
    #[serde(default)]
    pub num_epochs: Option<NonZeroUsize>,
    #[serde(default = "default_train_batch_size")]
    pub train_batch_size: NonZeroUsize,
    /// Rows per evaluation step. A trailing partial batch is not evaluated.
    #[serde(default = "default_eval_batch_size")]
    pub eval_batch_size: NonZeroUsize,
    /// Minimum number of training steps between evaluations.
    #[serde(default = "default_min_eval_frequency")]
    pub min_eval_frequency: NonZeroUsize,
    /// Number of top classes reported by the exported model. Passed through
    /// as is; the trainer decides what `None` means.
    #[serde(default)]
    pub top_n: Option<NonZeroUsize>,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            num_epochs: None,
            train_batch_size: DEFAULT_TRAIN_BATCH_SIZE,
            eval_batch_size: DEFAULT_EVAL_BATCH_SIZE,
            min_eval_frequency: DEFAULT_MIN_EVAL_FREQUENCY,
            top_n: None,
            learning_rate: DEFAULT_LEARNING_RATE,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

fn default_max_steps() -> NonZeroUsize {
    DEFAULT_MAX_STEPS
}

fn default_train_batch_size() -> NonZeroUsize {
    DEFAULT_TRAIN_BATCH_SIZE
}

fn default_eval_batch_size() -> NonZeroUsize {
    DEFAULT_EVAL_BATCH_SIZE
}

fn default_min_eval_frequency() -> NonZeroUsize {
    DEFAULT_MIN_EVAL_FREQUENCY
}

fn default_learning_rate() -> f64 {
    DEFAULT_LEARNING_RATE
}

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}

/// Everything needed to start a DNN classification training job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrainingConfig {
    pub train_dataset: DatasetConfig,
    pub eval_dataset: DatasetConfig,
    /// Output directory of the analysis phase.
    pub analysis_dir: PathBuf,
    pub output_dir: PathBuf,
    pub features: FeatureSource,
    /// Hidden layer widths, in order. Required by multi-layer models.
    pub layer_sizes: Vec<NonZeroUsize>,
    #[serde(flatten)]
    pub hyperparameters: Hyperparameters,
    /// A name is generated from the model's prefix when absent.
    #[serde(default)]
    pub job_name: Option<String>,
    /// Run in the cloud instead of locally.
    #[serde(default)]
    pub cloud: Option<CloudConfig>,
    /// Keys no other field claimed. Must stay after `hyperparameters`.
    #[serde(flatten)]
    unknown: BTreeMap<String, Value>,
}

impl TrainingConfig {
    /// Creates a local training config with default hyperparameters.
    pub fn new<F: Into<FeatureSource>>(
        train_dataset: DatasetConfig,
        eval_dataset: DatasetConfig,
        analysis_dir: PathBuf,
        output_dir: PathBuf,
        features: F,
        layer_sizes: Vec<NonZeroUsize>,
    ) -> Self {
        Self {
            train_dataset,
            eval_dataset,
            analysis_dir,
            output_dir,
            features: features.into(),
            layer_sizes,
            hyperparameters: Hyperparameters::default(),
            job_name: None,
            cloud: None,
            unknown: BTreeMap::new(),
        }
    }

    /// Loads a training config from a JSON file.
    ///
    /// # Errors
    /// Returns `Io` if the file cannot be read and `InvalidConfig` if it is
    /// not a valid training config document.
    pub fn from_file(path: &Path) -> Result<Self, TrainError> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| TrainError::InvalidConfig(format!("{}: {e}", path.display())))
    }

    pub fn execution_target(&self) -> ExecutionTarget {
        self.cloud.clone().into()
    }

    /// Keys in the config document that are not training config fields.
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.unknown.keys().map(String::as_str)
    }

    /// Checks the invariants that the types alone cannot express. Unknown
    /// keys are logged and ignored.
    ///
    /// # Errors
    /// Returns `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<(), TrainError> {
        for key in self.unknown_keys() {
            warn!(key = key; "ignoring unknown training config key");
        }

        for (name, dataset) in [
            ("train_dataset", &self.train_dataset),
            ("eval_dataset", &self.eval_dataset),
        ] {
            let patterns = dataset.file_patterns();
            if patterns.is_empty() || patterns.iter().any(|p| p.trim().is_empty()) {
                return Err(TrainError::InvalidConfig(format!(
                    "{name} must have non-empty file patterns"
                )));
            }
        }

        let hp = &self.hyperparameters;
        for (name, value) in [("learning_rate", hp.learning_rate), ("epsilon", hp.epsilon)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrainError::InvalidConfig(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }

        if self.job_name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(TrainError::InvalidConfig("job_name must not be empty".into()));
        }

        if let Some(cloud) = &self.cloud {
            if cloud.region.trim().is_empty() {
                return Err(TrainError::InvalidConfig(
                    "cloud.region must not be empty".into(),
                ));
            }
        }

        Ok(())
    }
}
