mod execution;
mod training;

pub use execution::{CloudConfig, DatasetConfig, ExecutionTarget};
pub use training::{Hyperparameters, TrainingConfig};
