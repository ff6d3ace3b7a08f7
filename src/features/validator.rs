use std::collections::BTreeMap;

use log::debug;
use serde_json::Value;

use super::{
    normalized::{ColumnDefault, NormalizedSpec, ResolvedColumn},
    spec::{ColumnSpec, FeatureSource, FeatureSpecification},
    transform::{Transform, TransformName},
};
use crate::{
    error::{SpecError, SpecErrorKind},
    schema::{ColumnKind, Schema, SchemaColumn},
};

/// Validates feature specifications against an analysis schema and resolves
/// every omitted transform, parameter and default.
///
/// Holds no state; a single instance can be shared freely between threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeatureSpecValidator;

impl FeatureSpecValidator {
    pub fn new() -> Self {
        Self
    }

    /// Loads `source` and validates it against `schema`.
    ///
    /// # Errors
    /// Returns a `SpecError` describing the first violated rule.
    pub fn validate(
        &self,
        source: &FeatureSource,
        schema: &Schema,
    ) -> Result<NormalizedSpec, SpecError> {
        let spec = source.load()?;
        self.validate_spec(&spec, schema)
    }

    /// Validates an in-memory specification against `schema`.
    pub fn validate_spec(
        &self,
        spec: &FeatureSpecification,
        schema: &Schema,
    ) -> Result<NormalizedSpec, SpecError> {
        let names = self.parse_names(spec)?;
        self.check_known_columns(spec, schema)?;

        let target = self.unique_column(&names, TransformName::Target)?;
        let key = self.unique_column(&names, TransformName::Key)?;

        let columns = schema
            .columns()
            .map(|column| {
                let resolved = match (spec.get(&column.name), names.get(column.name.as_str())) {
                    (Some(entry), Some(&name)) => self.resolve_column(column, name, entry)?,
                    _ => self.synthesize_column(column),
                };
                Ok((column.name.clone(), resolved))
            })
            .collect::<Result<BTreeMap<_, _>, SpecError>>()?;

        debug!(
            columns = columns.len(), target_col = target, key_col = key;
            "feature spec validated"
        );
        Ok(NormalizedSpec::new(columns, target.to_string(), key.to_string()))
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    fn parse_names<'a>(
        &self,
        spec: &'a FeatureSpecification,
    ) -> Result<BTreeMap<&'a str, TransformName>, SpecError> {
        spec.iter()
            .map(|(name, entry)| {
                let transform = entry
                    .transform
                    .parse::<TransformName>()
                    .map_err(|e| e.with_column(name.as_str()))?;
                Ok((name.as_str(), transform))
            })
            .collect()
    }

    fn check_known_columns(
        &self,
        spec: &FeatureSpecification,
        schema: &Schema,
    ) -> Result<(), SpecError> {
        match spec.iter().find(|(name, _)| !schema.contains(name)) {
            Some((name, _)) => Err(SpecError::new(
                SpecErrorKind::UnknownColumn,
                "column is not part of the analysis schema",
            )
            .with_column(name.as_str())),
            None => Ok(()),
        }
    }

    /// Finds the single column using `transform`, which must be `target` or `key`.
    fn unique_column<'a>(
        &self,
        names: &BTreeMap<&'a str, TransformName>,
        transform: TransformName,
    ) -> Result<&'a str, SpecError> {
        let (missing, duplicate) = match transform {
            TransformName::Target => {
                (SpecErrorKind::MissingTarget, SpecErrorKind::DuplicateTarget)
            }
            _ => (SpecErrorKind::MissingKey, SpecErrorKind::DuplicateKey),
        };

        let matching: Vec<&str> = names
            .iter()
            .filter(|(_, t)| **t == transform)
            .map(|(name, _)| *name)
            .collect();

        match matching.as_slice() {
            [single] => Ok(*single),
            [] => Err(SpecError::new(
                missing,
                format!("exactly one column must use the '{transform}' transform"),
            )),
            many => Err(SpecError::new(
                duplicate,
                format!(
                    "exactly one column must use the '{transform}' transform, found {}: {}",
                    many.len(),
                    many.join(", ")
                ),
            )),
        }
    }

    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------

    fn synthesize_column(&self, column: &SchemaColumn) -> ResolvedColumn {
        let transform = match TransformName::default_for(column.kind) {
            TransformName::OneHot => Transform::OneHot,
            _ => Transform::Identity,
        };
        debug!(column = column.name.as_str(); "synthesized default transform {}", transform.name());

        ResolvedColumn {
            transform,
            role: column.kind,
            default: self.implicit_default(column),
        }
    }

    fn resolve_column(
        &self,
        column: &SchemaColumn,
        name: TransformName,
        entry: &ColumnSpec,
    ) -> Result<ResolvedColumn, SpecError> {
        if !name.applies_to(column.kind) {
            return Err(SpecError::bad_parameter(
                column.name.as_str(),
                format!(
                    "transform '{name}' cannot be applied to a {} column",
                    kind_name(column.kind)
                ),
            ));
        }

        let transform = Transform::resolve(name, &entry.parameters, &column.name)?;
        let default = match &entry.default {
            Some(value) => self.explicit_default(column, value)?,
            None => self.implicit_default(column),
        };

        Ok(ResolvedColumn {
            transform,
            role: column.kind,
            default,
        })
    }

    fn explicit_default(
        &self,
        column: &SchemaColumn,
        value: &Value,
    ) -> Result<ColumnDefault, SpecError> {
        match (column.kind, value) {
            (ColumnKind::Numeric, Value::Number(n)) => n
                .as_f64()
                .map(ColumnDefault::Number)
                .ok_or_else(|| SpecError::bad_parameter(&column.name, "default is out of range")),
            (ColumnKind::Categorical, Value::String(s)) => Ok(ColumnDefault::Text(s.clone())),
            (kind, other) => Err(SpecError::bad_parameter(
                &column.name,
                format!("default for a {} column cannot be {other}", kind_name(kind)),
            )),
        }
    }

    fn implicit_default(&self, column: &SchemaColumn) -> ColumnDefault {
        match column.kind {
            ColumnKind::Numeric => ColumnDefault::Mean(column.mean),
            ColumnKind::Categorical => ColumnDefault::Text(String::new()),
        }
    }
}

fn kind_name(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Numeric => "numeric",
        ColumnKind::Categorical => "categorical",
    }
}

/// Validates `source` against `schema` with a default [`FeatureSpecValidator`].
pub fn validate(source: &FeatureSource, schema: &Schema) -> Result<NormalizedSpec, SpecError> {
    FeatureSpecValidator::new().validate(source, schema)
}
