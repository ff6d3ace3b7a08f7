//! Training front-end for DNN classification models.
//!
//! Validates the feature specification against the analysis schema, tags the
//! request with the model type and hands it to an [`Executor`].

pub mod configs;
pub mod error;
pub mod features;
pub mod job;
pub mod schema;
mod training;

pub use error::{SpecError, SpecErrorKind, TrainError};
pub use job::{Job, JobState};
pub use training::{Executor, ModelType, TrainingRequest, prepare, train, train_async};
