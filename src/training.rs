use std::{
    fmt,
    num::NonZeroUsize,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use log::info;
use serde::Serialize;
use tokio::runtime::Runtime;

use crate::{
    configs::{DatasetConfig, ExecutionTarget, Hyperparameters, TrainingConfig},
    error::TrainError,
    features::{FeatureSpecValidator, NormalizedSpec},
    job::{Job, JobState},
    schema::Schema,
};

/// Model families understood by the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    DnnClassification,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DnnClassification => "dnn_classification",
        }
    }

    /// Prefix for generated job names.
    pub fn job_name_prefix(&self) -> &'static str {
        match self {
            Self::DnnClassification => "mltoolbox_classification_dnn",
        }
    }

    /// Whether the model is a multi-layer network that needs `layer_sizes`.
    pub fn requires_layers(&self) -> bool {
        match self {
            Self::DnnClassification => true,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully validated job description handed to an [`Executor`].
#[derive(Debug, Clone, Serialize)]
pub struct TrainingRequest {
    pub model_type: ModelType,
    pub job_name: String,
    pub job_name_prefix: &'static str,
    pub train_dataset: DatasetConfig,
    pub eval_dataset: DatasetConfig,
    pub analysis_dir: PathBuf,
    pub output_dir: PathBuf,
    pub features: NormalizedSpec,
    pub layer_sizes: Vec<NonZeroUsize>,
    pub hyperparameters: Hyperparameters,
    /// Where the job runs.
    pub execution: ExecutionTarget,
}

/// Runs training jobs, locally or on a managed service.
pub trait Executor {
    /// Starts `request` and returns a handle to the running job.
    fn submit(&self, request: TrainingRequest) -> Result<Job, TrainError>;
}

/// Validates `config` for `model_type` and builds the request an executor
/// receives. Loads the analysis schema and the feature spec from disk as
/// needed; nothing is submitted.
///
/// # Errors
/// Returns a `TrainError` if the config, the analysis output or the feature
/// specification is invalid.
pub fn prepare(
    model_type: ModelType,
    config: TrainingConfig,
) -> Result<TrainingRequest, TrainError> {
    config.validate()?;
    if model_type.requires_layers() && config.layer_sizes.is_empty() {
        return Err(TrainError::InvalidConfig(format!(
            "{model_type} requires layer_sizes"
        )));
    }

    let schema = Schema::load(&config.analysis_dir)?;
    let features = FeatureSpecValidator::new().validate(&config.features, &schema)?;

    let execution = config.execution_target();
    let job_name = config
        .job_name
        .unwrap_or_else(|| default_job_name(model_type.job_name_prefix()));

    Ok(TrainingRequest {
        model_type,
        job_name,
        job_name_prefix: model_type.job_name_prefix(),
        train_dataset: config.train_dataset,
        eval_dataset: config.eval_dataset,
        analysis_dir: config.analysis_dir,
        output_dir: config.output_dir,
        features,
        layer_sizes: config.layer_sizes,
        hyperparameters: config.hyperparameters,
        execution,
    })
}

fn default_job_name(prefix: &str) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("{prefix}_{secs}")
}

/// Starts training a DNN classification model and returns without waiting.
///
/// # Arguments
/// * `executor` - Runs the job, locally or in the cloud.
/// * `config` - Datasets, feature specification, layer sizes and hyperparameters.
///
/// # Returns
/// A handle to the submitted job, or a `TrainError` if validation or
/// submission failed. Invalid configs never reach the executor.
pub async fn train_async<E: Executor + ?Sized>(
    executor: &E,
    config: TrainingConfig,
) -> Result<Job, TrainError> {
    let request = prepare(ModelType::DnnClassification, config)?;
    info!(
        job = request.job_name.as_str(), model = request.model_type.as_str();
        "submitting training job with {} feature column(s)",
        request.features.features().count()
    );
    executor.submit(request)
}

/// Blocking version of [`train_async`]: submits the job and waits until it
/// finishes.
///
/// # Returns
/// The terminal state of the job.
pub fn train<E: Executor + ?Sized>(
    executor: &E,
    config: TrainingConfig,
) -> Result<JobState, TrainError> {
    let runtime = Runtime::new()?;
    let state = runtime.block_on(async {
        let job = train_async(executor, config).await?;
        Ok::<_, TrainError>(job.wait().await)
    })?;

    info!("Training: {state}");
    Ok(state)
}
