use std::{
    borrow::Cow,
    collections::{BTreeMap, btree_map},
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::SpecError;

/// One entry of a feature specification, in document form.
///
/// Besides `transform` and `default`, every other key is kept as a
/// transform-specific parameter and checked during validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub transform: String,
    /// `None` only when the key is absent; an explicit `null` is kept as
    /// `Some(Value::Null)` and rejected during validation.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<Value>,
    #[serde(flatten)]
    pub parameters: BTreeMap<String, Value>,
}

impl ColumnSpec {
    pub fn new<T: Into<String>>(transform: T) -> Self {
        Self {
            transform: transform.into(),
            default: None,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_default<V: Into<Value>>(mut self, default: V) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_parameter<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Mapping from column name to its [`ColumnSpec`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSpecification {
    columns: BTreeMap<String, ColumnSpec>,
}

impl FeatureSpecification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column<N: Into<String>>(mut self, name: N, column: ColumnSpec) -> Self {
        self.insert(name, column);
        self
    }

    pub fn insert<N: Into<String>>(&mut self, name: N, column: ColumnSpec) {
        self.columns.insert(name.into(), column);
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ColumnSpec> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Parses a specification from a JSON document.
    ///
    /// # Errors
    /// Returns a `Parse` error if the document is not a mapping of column
    /// names to objects carrying a string `transform`.
    pub fn from_json_str(content: &str) -> Result<Self, SpecError> {
        let value = serde_json::from_str(content)
            .map_err(|e| SpecError::parse(format!("malformed feature spec: {e}")).with_source(e))?;
        Self::from_value(value)
    }

    /// Interprets an already parsed JSON value as a specification.
    ///
    /// # Errors
    /// Returns a `Parse` error naming the first malformed column entry.
    pub fn from_value(value: Value) -> Result<Self, SpecError> {
        match value {
            Value::Object(entries) => Self::from_entries(entries),
            other => Err(SpecError::parse(format!(
                "feature spec must be an object, got {other}"
            ))),
        }
    }

    fn from_entries(entries: Map<String, Value>) -> Result<Self, SpecError> {
        entries
            .into_iter()
            .map(|(name, entry)| match serde_json::from_value::<ColumnSpec>(entry) {
                Ok(column) => Ok((name, column)),
                Err(e) => Err(SpecError::parse(format!("malformed column entry: {e}"))
                    .with_column(name)
                    .with_source(e)),
            })
            .collect::<Result<BTreeMap<_, _>, SpecError>>()
            .map(|columns| Self { columns })
    }

    /// Reads and parses a specification file.
    pub fn from_file(path: &Path) -> Result<Self, SpecError> {
        let content = fs::read_to_string(path).map_err(|e| {
            SpecError::parse(format!("cannot read '{}': {e}", path.display())).with_source(e)
        })?;
        Self::from_json_str(&content)
    }
}

impl<'a> IntoIterator for &'a FeatureSpecification {
    type Item = (&'a String, &'a ColumnSpec);
    type IntoIter = btree_map::Iter<'a, String, ColumnSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Where a feature specification comes from: a file on disk or an in-memory
/// mapping.
///
/// In a JSON config a string is read as a path and an object as an inline
/// document. Inline documents are kept raw, so both forms are interpreted by
/// [`FeatureSource::load`] and report the same errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureSource {
    File(PathBuf),
    Inline(Map<String, Value>),
    Parsed(FeatureSpecification),
}

#[derive(Deserialize)]
#[serde(untagged, expecting = "a feature spec path or an inline feature spec object")]
enum RawSource {
    File(PathBuf),
    Inline(Map<String, Value>),
}

impl<'de> Deserialize<'de> for FeatureSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawSource::deserialize(deserializer)? {
            RawSource::File(path) => Self::File(path),
            RawSource::Inline(doc) => Self::Inline(doc),
        })
    }
}

impl FeatureSource {
    /// Resolves the source into a specification, reading the file if needed.
    ///
    /// # Errors
    /// Returns a `Parse` error if the file cannot be read or the document is
    /// malformed.
    pub fn load(&self) -> Result<Cow<'_, FeatureSpecification>, SpecError> {
        match self {
            Self::File(path) => FeatureSpecification::from_file(path).map(Cow::Owned),
            Self::Inline(doc) => FeatureSpecification::from_entries(doc.clone()).map(Cow::Owned),
            Self::Parsed(spec) => Ok(Cow::Borrowed(spec)),
        }
    }
}

impl From<PathBuf> for FeatureSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for FeatureSource {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

impl From<FeatureSpecification> for FeatureSource {
    fn from(spec: FeatureSpecification) -> Self {
        Self::Parsed(spec)
    }
}
