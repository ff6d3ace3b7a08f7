use std::{collections::BTreeMap, fmt, num::NonZeroUsize, str::FromStr};

use serde::Serialize;
use serde_json::Value;

use crate::{error::SpecError, schema::ColumnKind};

const SCALE_PARAMS: &[&str] = &["value"];
const HASH_ONE_HOT_PARAMS: &[&str] = &["hash_bucket_size"];
const EMBEDDING_PARAMS: &[&str] = &["embedding_dim"];

/// Bound used by `scale` when no `value` is given.
pub const DEFAULT_SCALE_BOUND: f64 = 1.0;

/// The transform names accepted in a feature specification document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformName {
    Identity,
    Scale,
    OneHot,
    HashOneHot,
    Embedding,
    Target,
    Key,
}

impl TransformName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Scale => "scale",
            Self::OneHot => "one_hot",
            Self::HashOneHot => "hash_one_hot",
            Self::Embedding => "embedding",
            Self::Target => "target",
            Self::Key => "key",
        }
    }

    /// The transform applied to a column of `kind` when the feature spec omits it.
    pub fn default_for(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Numeric => Self::Identity,
            ColumnKind::Categorical => Self::OneHot,
        }
    }

    /// Parameter keys this transform understands.
    pub fn accepted_parameters(&self) -> &'static [&'static str] {
        match self {
            Self::Scale => SCALE_PARAMS,
            Self::HashOneHot => HASH_ONE_HOT_PARAMS,
            Self::Embedding => EMBEDDING_PARAMS,
            Self::Identity | Self::OneHot | Self::Target | Self::Key => &[],
        }
    }

    /// Whether this transform can encode a column of `kind`.
    pub fn applies_to(&self, kind: ColumnKind) -> bool {
        match self {
            Self::Identity | Self::Scale => kind == ColumnKind::Numeric,
            Self::OneHot | Self::HashOneHot | Self::Embedding => kind == ColumnKind::Categorical,
            Self::Target | Self::Key => true,
        }
    }
}

impl FromStr for TransformName {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(Self::Identity),
            "scale" => Ok(Self::Scale),
            "one_hot" => Ok(Self::OneHot),
            "hash_one_hot" => Ok(Self::HashOneHot),
            "embedding" => Ok(Self::Embedding),
            "target" => Ok(Self::Target),
            "key" => Ok(Self::Key),
            other => Err(SpecError::parse(format!("unknown transform '{other}'"))),
        }
    }
}

impl fmt::Display for TransformName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transform together with its resolved parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "transform", rename_all = "snake_case")]
pub enum Transform {
    Identity,
    /// Scales values to `[-value, value]`.
    Scale { value: f64 },
    OneHot,
    HashOneHot { hash_bucket_size: NonZeroUsize },
    Embedding { embedding_dim: NonZeroUsize },
    Target,
    Key,
}

impl Transform {
    /// Resolves the parameters of `name` for `column`.
    ///
    /// # Errors
    /// Returns a `BadParameter` error if a parameter is unknown to the
    /// transform, missing when required, of the wrong type or out of range.
    pub fn resolve(
        name: TransformName,
        parameters: &BTreeMap<String, Value>,
        column: &str,
    ) -> Result<Self, SpecError> {
        let accepted = name.accepted_parameters();
        if let Some(key) = parameters.keys().find(|k| !accepted.contains(&k.as_str())) {
            return Err(SpecError::bad_parameter(
                column,
                format!("transform '{name}' does not accept parameter '{key}'"),
            ));
        }

        let transform = match name {
            TransformName::Identity => Self::Identity,
            TransformName::OneHot => Self::OneHot,
            TransformName::Target => Self::Target,
            TransformName::Key => Self::Key,
            TransformName::Scale => {
                let value = match parameters.get("value") {
                    Some(v) => positive_number(column, "value", v)?,
                    None => DEFAULT_SCALE_BOUND,
                };
                Self::Scale { value }
            }
            TransformName::HashOneHot => Self::HashOneHot {
                hash_bucket_size: required_positive_integer(
                    column,
                    "hash_bucket_size",
                    parameters,
                )?,
            },
            TransformName::Embedding => Self::Embedding {
                embedding_dim: required_positive_integer(column, "embedding_dim", parameters)?,
            },
        };

        Ok(transform)
    }

    pub fn name(&self) -> TransformName {
        match self {
            Self::Identity => TransformName::Identity,
            Self::Scale { .. } => TransformName::Scale,
            Self::OneHot => TransformName::OneHot,
            Self::HashOneHot { .. } => TransformName::HashOneHot,
            Self::Embedding { .. } => TransformName::Embedding,
            Self::Target => TransformName::Target,
            Self::Key => TransformName::Key,
        }
    }

    /// The parameters in document form, as they would appear next to the
    /// `transform` key.
    pub fn parameters(&self) -> BTreeMap<String, Value> {
        let mut params = BTreeMap::new();
        match *self {
            Self::Scale { value } => {
                params.insert("value".to_string(), Value::from(value));
            }
            Self::HashOneHot { hash_bucket_size } => {
                params.insert(
                    "hash_bucket_size".to_string(),
                    Value::from(hash_bucket_size.get()),
                );
            }
            Self::Embedding { embedding_dim } => {
                params.insert("embedding_dim".to_string(), Value::from(embedding_dim.get()));
            }
            Self::Identity | Self::OneHot | Self::Target | Self::Key => {}
        }
        params
    }
}

fn positive_number(column: &str, key: &str, value: &Value) -> Result<f64, SpecError> {
    value
        .as_f64()
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| {
            SpecError::bad_parameter(
                column,
                format!("{key} must be a positive number, got {value}"),
            )
        })
}

fn required_positive_integer(
    column: &str,
    key: &str,
    parameters: &BTreeMap<String, Value>,
) -> Result<NonZeroUsize, SpecError> {
    let value = parameters
        .get(key)
        .ok_or_else(|| SpecError::bad_parameter(column, format!("{key} is required")))?;

    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            SpecError::bad_parameter(
                column,
                format!("{key} must be a positive integer, got {value}"),
            )
        })
}
