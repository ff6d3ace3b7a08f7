use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::TrainError;

pub const SCHEMA_FILE: &str = "schema.json";
pub const NUMERICAL_ANALYSIS_FILE: &str = "numerical_analysis.json";

/// Declared kind of a column, as recorded by the analysis phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// A column known to the analysis phase.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaColumn {
    pub name: String,
    pub kind: ColumnKind,
    /// Training-set mean, only recorded for numeric columns.
    pub mean: Option<f64>,
}

/// The set of columns produced by the analysis phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    columns: BTreeMap<String, SchemaColumn>,
}

#[derive(Deserialize)]
struct SchemaEntry {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Deserialize)]
struct NumericStats {
    mean: Option<f64>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a numeric column with an optional training-set mean.
    pub fn with_numeric<N: Into<String>>(mut self, name: N, mean: Option<f64>) -> Self {
        self.insert(SchemaColumn {
            name: name.into(),
            kind: ColumnKind::Numeric,
            mean,
        });
        self
    }

    pub fn with_categorical<N: Into<String>>(mut self, name: N) -> Self {
        self.insert(SchemaColumn {
            name: name.into(),
            kind: ColumnKind::Categorical,
            mean: None,
        });
        self
    }

    /// Inserts a column, replacing any previous column with the same name.
    pub fn insert(&mut self, column: SchemaColumn) {
        self.columns.insert(column.name.clone(), column);
    }

    pub fn get(&self, name: &str) -> Option<&SchemaColumn> {
        self.columns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Iterates the columns ordered by name.
    pub fn columns(&self) -> impl Iterator<Item = &SchemaColumn> {
        self.columns.values()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Loads the schema written by the analysis phase into `analysis_dir`.
    ///
    /// # Arguments
    /// * `analysis_dir` - Directory containing `schema.json` and, optionally,
    ///   `numerical_analysis.json`.
    ///
    /// # Returns
    /// The schema, or a `TrainError` if the files are missing or malformed.
    pub fn load(analysis_dir: &Path) -> Result<Self, TrainError> {
        let schema_path = analysis_dir.join(SCHEMA_FILE);
        let content = fs::read_to_string(&schema_path)?;
        let entries: Vec<SchemaEntry> = serde_json::from_str(&content)
            .map_err(|e| TrainError::Schema(format!("{}: {e}", schema_path.display())))?;

        let stats_path = analysis_dir.join(NUMERICAL_ANALYSIS_FILE);
        let stats: HashMap<String, NumericStats> = if stats_path.exists() {
            let content = fs::read_to_string(&stats_path)?;
            serde_json::from_str(&content)
                .map_err(|e| TrainError::Schema(format!("{}: {e}", stats_path.display())))?
        } else {
            debug!("no numerical analysis at {}", stats_path.display());
            HashMap::new()
        };

        let mut schema = Self::new();
        for entry in entries {
            if schema.contains(&entry.name) {
                return Err(TrainError::Schema(format!(
                    "column '{}' declared more than once",
                    entry.name
                )));
            }

            let kind = match entry.ty.as_str() {
                "STRING" => ColumnKind::Categorical,
                "INTEGER" | "FLOAT" => ColumnKind::Numeric,
                other => {
                    return Err(TrainError::Schema(format!(
                        "column '{}' has unsupported type {other}",
                        entry.name
                    )));
                }
            };

            let mean = match kind {
                ColumnKind::Numeric => stats.get(&entry.name).and_then(|s| s.mean),
                ColumnKind::Categorical => None,
            };

            schema.insert(SchemaColumn {
                name: entry.name,
                kind,
                mean,
            });
        }

        debug!(columns = schema.len(); "loaded analysis schema");
        Ok(schema)
    }
}
