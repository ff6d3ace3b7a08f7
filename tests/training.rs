use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use mltoolbox_dnn::{
    Executor, Job, JobState, ModelType, SpecErrorKind, TrainError, TrainingRequest,
    configs::{CloudConfig, DatasetConfig, ExecutionTarget, TrainingConfig},
    features::{ColumnDefault, ColumnSpec, FeatureSpecification, Transform},
    train, train_async,
};

/// Records every request and finishes each job with a fixed outcome.
struct RecordingExecutor {
    outcome: Result<(), String>,
    requests: Mutex<Vec<TrainingRequest>>,
}

impl RecordingExecutor {
    fn new(outcome: Result<(), String>) -> Self {
        Self {
            outcome,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn submitted(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last(&self) -> TrainingRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

impl Executor for RecordingExecutor {
    fn submit(&self, request: TrainingRequest) -> Result<Job, TrainError> {
        let name = request.job_name.clone();
        self.requests.lock().unwrap().push(request);
        let outcome = self.outcome.clone();
        Ok(Job::spawn(name, async move { outcome }))
    }
}

fn analysis_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "mltoolbox-dnn-training-{name}-{}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("schema.json"),
        json!([
            {"name": "col_A", "type": "FLOAT"},
            {"name": "col_B", "type": "INTEGER"},
            {"name": "col_C", "type": "STRING"},
            {"name": "col_D", "type": "STRING"},
            {"name": "col_target", "type": "STRING"},
            {"name": "col_key", "type": "INTEGER"}
        ])
        .to_string(),
    )
    .unwrap();
    fs::write(
        dir.join("numerical_analysis.json"),
        json!({
            "col_A": {"mean": 12.5, "min": 0.0, "max": 25.0},
            "col_B": {"mean": 3.0, "min": 1.0, "max": 5.0}
        })
        .to_string(),
    )
    .unwrap();
    dir
}

fn features() -> FeatureSpecification {
    FeatureSpecification::new()
        .with_column("col_B", ColumnSpec::new("scale").with_parameter("value", 4))
        .with_column(
            "col_D",
            ColumnSpec::new("hash_one_hot").with_parameter("hash_bucket_size", 4),
        )
        .with_column("col_target", ColumnSpec::new("target"))
        .with_column("col_key", ColumnSpec::new("key"))
}

fn config(dir: &Path, features: FeatureSpecification) -> TrainingConfig {
    TrainingConfig::new(
        DatasetConfig::Pattern("train-*.csv".into()),
        DatasetConfig::Pattern("eval-*.csv".into()),
        dir.to_path_buf(),
        dir.join("out"),
        features,
        vec![NonZeroUsize::new(10).unwrap(), NonZeroUsize::new(3).unwrap()],
    )
}

#[test]
fn train_waits_for_success() {
    let dir = analysis_dir("success");
    let executor = RecordingExecutor::new(Ok(()));

    let state = train(&executor, config(&dir, features())).unwrap();
    assert_eq!(state, JobState::Succeeded);
    assert_eq!(executor.submitted(), 1);

    let request = executor.last();
    assert_eq!(request.model_type, ModelType::DnnClassification);
    assert_eq!(request.job_name_prefix, "mltoolbox_classification_dnn");
    assert!(request.job_name.starts_with("mltoolbox_classification_dnn_"));
    assert_eq!(request.execution, ExecutionTarget::Local);
    assert_eq!(request.layer_sizes.len(), 2);
    assert_eq!(request.hyperparameters.max_steps.get(), 5000);

    let features = &request.features;
    assert_eq!(features.len(), 6);
    assert_eq!(features.target_column(), "col_target");
    assert_eq!(features.key_column(), "col_key");

    let a = features.get("col_A").unwrap();
    assert_eq!(a.transform, Transform::Identity);
    assert_eq!(a.default, ColumnDefault::Mean(Some(12.5)));

    let c = features.get("col_C").unwrap();
    assert_eq!(c.transform, Transform::OneHot);
    assert_eq!(c.default, ColumnDefault::Text(String::new()));

    assert_eq!(
        features.get("col_B").unwrap().transform,
        Transform::Scale { value: 4.0 }
    );

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn train_reports_failed_job() {
    let dir = analysis_dir("failure");
    let executor = RecordingExecutor::new(Err("out of memory".into()));

    let state = train(&executor, config(&dir, features())).unwrap();
    assert_eq!(state, JobState::Failed);

    fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn train_async_returns_running_handle() {
    let dir = analysis_dir("async");
    let executor = RecordingExecutor::new(Ok(()));

    let mut cfg = config(&dir, features());
    cfg.job_name = Some("nightly".into());
    cfg.cloud = Some(CloudConfig {
        region: "us-central1".into(),
        scale_tier: None,
        extra: Default::default(),
    });

    let job = assert_ok!(train_async(&executor, cfg).await);
    assert_eq!(job.name(), "nightly");
    assert_eq!(job.wait().await, JobState::Succeeded);

    let request = executor.last();
    assert!(matches!(
        request.execution,
        ExecutionTarget::Cloud(ref c) if c.region == "us-central1"
    ));

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn empty_layer_sizes_never_reach_executor() {
    let dir = analysis_dir("no-layers");
    let executor = RecordingExecutor::new(Ok(()));

    let mut cfg = config(&dir, features());
    cfg.layer_sizes.clear();

    let err = assert_err!(train(&executor, cfg));
    assert!(matches!(err, TrainError::InvalidConfig(_)));
    assert_eq!(executor.submitted(), 0);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn invalid_features_never_reach_executor() {
    let dir = analysis_dir("bad-features");
    let executor = RecordingExecutor::new(Ok(()));

    let no_target = FeatureSpecification::new().with_column("col_key", ColumnSpec::new("key"));
    match train(&executor, config(&dir, no_target)) {
        Err(TrainError::Spec(e)) => assert_eq!(e.kind(), SpecErrorKind::MissingTarget),
        other => panic!("expected spec error, got {other:?}"),
    }

    let unknown = features().with_column("col_Z", ColumnSpec::new("identity"));
    match train(&executor, config(&dir, unknown)) {
        Err(TrainError::Spec(e)) => assert_eq!(e.kind(), SpecErrorKind::UnknownColumn),
        other => panic!("expected spec error, got {other:?}"),
    }

    assert_eq!(executor.submitted(), 0);
    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn config_file_with_feature_file_is_loaded() {
    let dir = analysis_dir("files");
    let features_path = dir.join("features.json");
    fs::write(
        &features_path,
        json!({
            "col_A": {"transform": "scale", "default": 0.0},
            "col_C": {"transform": "embedding", "embedding_dim": 2},
            "col_target": {"transform": "target"},
            "col_key": {"transform": "key"}
        })
        .to_string(),
    )
    .unwrap();

    let config_path = dir.join("training.json");
    fs::write(
        &config_path,
        json!({
            "train_dataset": "train.csv",
            "eval_dataset": "eval.csv",
            "analysis_dir": dir,
            "output_dir": dir.join("out"),
            "features": features_path,
            "layer_sizes": [8, 4],
            "max_steps": 50,
            "top_n": 2
        })
        .to_string(),
    )
    .unwrap();

    let executor = RecordingExecutor::new(Ok(()));
    let cfg = TrainingConfig::from_file(&config_path).unwrap();
    assert_eq!(train(&executor, cfg).unwrap(), JobState::Succeeded);

    let request = executor.last();
    assert_eq!(request.hyperparameters.max_steps.get(), 50);
    assert_eq!(request.hyperparameters.top_n.map(NonZeroUsize::get), Some(2));
    assert_eq!(
        request.features.get("col_A").unwrap().default,
        ColumnDefault::Number(0.0)
    );

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn malformed_feature_file_is_parse_error() {
    let dir = analysis_dir("malformed");
    let features_path = dir.join("features.json");
    fs::write(&features_path, "{ not json").unwrap();

    let mut cfg = config(&dir, FeatureSpecification::new());
    cfg.features = features_path.into();

    let executor = RecordingExecutor::new(Ok(()));
    match train(&executor, cfg) {
        Err(TrainError::Spec(e)) => assert_eq!(e.kind(), SpecErrorKind::Parse),
        other => panic!("expected parse error, got {other:?}"),
    }

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn malformed_inline_features_are_parse_errors() {
    let dir = analysis_dir("inline-malformed");
    let config_path = dir.join("training.json");
    fs::write(
        &config_path,
        json!({
            "train_dataset": "train.csv",
            "eval_dataset": "eval.csv",
            "analysis_dir": dir,
            "output_dir": dir.join("out"),
            "features": {
                "col_A": {"default": 1.0},
                "col_target": {"transform": "target"},
                "col_key": {"transform": "key"}
            },
            "layer_sizes": [8]
        })
        .to_string(),
    )
    .unwrap();

    let cfg = assert_ok!(TrainingConfig::from_file(&config_path));
    let executor = RecordingExecutor::new(Ok(()));
    match train(&executor, cfg) {
        Err(TrainError::Spec(e)) => {
            assert_eq!(e.kind(), SpecErrorKind::Parse);
            assert_eq!(e.column(), Some("col_A"));
        }
        other => panic!("expected parse error, got {other:?}"),
    }

    assert_eq!(executor.submitted(), 0);
    fs::remove_dir_all(dir).unwrap();
}

struct RejectingExecutor;

impl Executor for RejectingExecutor {
    fn submit(&self, request: TrainingRequest) -> Result<Job, TrainError> {
        Err(TrainError::Job(format!("quota exceeded for {}", request.job_name)))
    }
}

#[test]
fn submission_errors_are_returned() {
    let dir = analysis_dir("rejected");

    let err = assert_err!(train(&RejectingExecutor, config(&dir, features())));
    assert!(matches!(err, TrainError::Job(ref msg) if msg.starts_with("quota exceeded")));

    fs::remove_dir_all(dir).unwrap();
}
