//! Feature specifications: how each input column is declared, defaulted and
//! transformed before training.

mod normalized;
mod spec;
mod transform;
mod validator;

pub use normalized::{ColumnDefault, NormalizedSpec, ResolvedColumn};
pub use spec::{ColumnSpec, FeatureSource, FeatureSpecification};
pub use transform::{DEFAULT_SCALE_BOUND, Transform, TransformName};
pub use validator::{FeatureSpecValidator, validate};
