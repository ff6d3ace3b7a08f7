use std::collections::{BTreeMap, btree_map};

use serde::Serialize;
use serde_json::Value;

use super::{
    spec::{ColumnSpec, FeatureSpecification},
    transform::Transform,
};
use crate::schema::ColumnKind;

/// Value used to fill a missing cell at training and prediction time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnDefault {
    Number(f64),
    Text(String),
    /// Fill with the column's training-set mean. `None` if the analysis phase
    /// did not record one; the trainer then looks it up by column name.
    Mean(Option<f64>),
}

impl ColumnDefault {
    /// The default in document form. Means are implicit and yield `None`.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Self::Number(n) => Some(Value::from(*n)),
            Self::Text(s) => Some(Value::from(s.as_str())),
            Self::Mean(_) => None,
        }
    }
}

/// A fully resolved column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedColumn {
    #[serde(flatten)]
    pub transform: Transform,
    pub role: ColumnKind,
    pub default: ColumnDefault,
}

/// An immutable, validated feature specification covering every schema
/// column exactly once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSpec {
    columns: BTreeMap<String, ResolvedColumn>,
    target: String,
    key: String,
}

impl NormalizedSpec {
    pub(crate) fn new(
        columns: BTreeMap<String, ResolvedColumn>,
        target: String,
        key: String,
    ) -> Self {
        Self {
            columns,
            target,
            key,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedColumn> {
        self.columns.get(name)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ResolvedColumn> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Name of the column holding the training label.
    pub fn target_column(&self) -> &str {
        &self.target
    }

    /// Name of the row identifier column.
    pub fn key_column(&self) -> &str {
        &self.key
    }

    /// Columns that feed the model, i.e. neither target nor key.
    pub fn features(&self) -> impl Iterator<Item = (&str, &ResolvedColumn)> {
        self.columns
            .iter()
            .filter(|(name, _)| **name != self.target && **name != self.key)
            .map(|(name, column)| (name.as_str(), column))
    }

    /// Converts back to document form. Validating the result against the
    /// same schema yields this spec again.
    pub fn to_spec(&self) -> FeatureSpecification {
        self.columns
            .iter()
            .fold(FeatureSpecification::new(), |spec, (name, column)| {
                let entry = ColumnSpec {
                    transform: column.transform.name().as_str().to_string(),
                    default: column.default.to_value(),
                    parameters: column.transform.parameters(),
                };
                spec.with_column(name.as_str(), entry)
            })
    }
}

impl<'a> IntoIterator for &'a NormalizedSpec {
    type Item = (&'a String, &'a ResolvedColumn);
    type IntoIter = btree_map::Iter<'a, String, ResolvedColumn>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
