use std::{env, path::PathBuf};

use anyhow::Context;
use log::info;

use mltoolbox_dnn::{ModelType, configs::TrainingConfig, prepare};

const CONFIG_ENV: &str = "MLTOOLBOX_TRAINING_CONFIG";

/// Validates a training config and prints the request a trainer would receive.
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path: PathBuf = env::args()
        .nth(1)
        .or_else(|| env::var(CONFIG_ENV).ok())
        .map(PathBuf::from)
        .with_context(|| {
            format!("usage: mltoolbox-dnn <training-config.json> (or set {CONFIG_ENV})")
        })?;

    let config = TrainingConfig::from_file(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    let request = prepare(ModelType::DnnClassification, config)?;

    info!(
        job = request.job_name.as_str();
        "validated {} column(s), target '{}', key '{}'",
        request.features.len(),
        request.features.target_column(),
        request.features.key_column()
    );
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}
