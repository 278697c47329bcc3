//! Parameter resolution.
//!
//! Config supplies a raw map of parameter name to JSON value, with key case
//! preserved exactly. Resolution walks the transformer's declared
//! parameters, fills defaults, binds column-naming parameters to the
//! table's columns, propagates linked bindings, and reports every problem
//! as a validation warning so one pass surfaces them all.

use std::collections::BTreeMap;

use serde_json::Value;

use veildump_core::{Column, Severity, ValidationWarning};

use crate::definition::{ColumnProperties, Parameter};
use crate::error::{TransformError, TransformResult};

/// Raw parameter values as parsed from config.
pub type RawParams = BTreeMap<String, Value>;

/// One resolved parameter.
#[derive(Debug, Clone)]
pub struct ResolvedValue {
    /// The effective value (config value or declared default).
    pub value: Value,
    /// The column bound by this parameter, directly or via a link.
    pub column: Option<Column>,
    /// Columns bound by a column-container parameter.
    pub columns: Vec<Column>,
    /// The declared column constraints, if any.
    pub properties: Option<ColumnProperties>,
}

/// Resolved parameters keyed by declared name.
#[derive(Debug, Clone, Default)]
pub struct ResolvedParams {
    values: BTreeMap<String, ResolvedValue>,
}

impl ResolvedParams {
    /// Looks up a resolved parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResolvedValue> {
        self.values.get(name)
    }

    /// Iterates over resolved parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResolvedValue)> {
        self.values.iter()
    }

    /// Returns a string parameter.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Parameter`] if missing or not a string.
    pub fn require_str(&self, name: &str) -> TransformResult<&str> {
        match self.get(name).map(|v| &v.value) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(TransformError::parameter(
                name,
                format!("expected a string, got {other}"),
            )),
            None => Err(TransformError::parameter(name, "missing")),
        }
    }

    /// Returns an optional string parameter.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Parameter`] if present but not a string.
    pub fn opt_str(&self, name: &str) -> TransformResult<Option<&str>> {
        match self.get(name).map(|v| &v.value) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => {
                Err(TransformError::parameter(name, format!("expected a string, got {other}")))
            }
        }
    }

    /// Returns an integer parameter.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Parameter`] if missing or not an integer.
    pub fn require_i64(&self, name: &str) -> TransformResult<i64> {
        match self.get(name).map(|v| &v.value) {
            Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
                TransformError::parameter(name, format!("{n} is not a 64-bit integer"))
            }),
            Some(other) => {
                Err(TransformError::parameter(name, format!("expected an integer, got {other}")))
            }
            None => Err(TransformError::parameter(name, "missing")),
        }
    }

    /// Returns an optional integer parameter.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Parameter`] if present but not an integer.
    pub fn opt_i64(&self, name: &str) -> TransformResult<Option<i64>> {
        match self.get(name).map(|v| &v.value) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.require_i64(name).map(Some),
        }
    }

    /// Returns a float parameter.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Parameter`] if missing or not a number.
    pub fn require_f64(&self, name: &str) -> TransformResult<f64> {
        match self.get(name).map(|v| &v.value) {
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| TransformError::parameter(name, format!("{n} is not a float"))),
            Some(other) => {
                Err(TransformError::parameter(name, format!("expected a number, got {other}")))
            }
            None => Err(TransformError::parameter(name, "missing")),
        }
    }

    /// Returns an optional boolean parameter.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Parameter`] if present but not a boolean.
    pub fn opt_bool(&self, name: &str) -> TransformResult<Option<bool>> {
        match self.get(name).map(|v| &v.value) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => {
                Err(TransformError::parameter(name, format!("expected a boolean, got {other}")))
            }
        }
    }

    /// Returns the column bound by a parameter.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Parameter`] if the parameter bound no
    /// column (resolution rejects such configs before instantiation).
    pub fn require_column(&self, name: &str) -> TransformResult<&Column> {
        self.get(name)
            .and_then(|v| v.column.as_ref())
            .ok_or_else(|| TransformError::parameter(name, "no column bound"))
    }

    /// Ordinals of all columns the transformer declared it writes.
    #[must_use]
    pub fn affected_columns(&self) -> Vec<usize> {
        let mut out = Vec::new();
        for value in self.values.values() {
            let Some(props) = &value.properties else { continue };
            if !props.affected {
                continue;
            }
            if let Some(column) = &value.column {
                out.push(column.ordinal);
            }
            out.extend(value.columns.iter().map(|c| c.ordinal));
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Ordinals of columns whose NULL bypasses the transformer.
    #[must_use]
    pub fn skip_on_null_columns(&self) -> Vec<usize> {
        let mut out = Vec::new();
        for value in self.values.values() {
            let Some(props) = &value.properties else { continue };
            if !props.skip_on_null {
                continue;
            }
            if let Some(column) = &value.column {
                out.push(column.ordinal);
            }
            out.extend(value.columns.iter().map(|c| c.ordinal));
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

fn find_column<'a>(columns: &'a [Column], name: &str) -> Option<&'a Column> {
    columns.iter().find(|c| c.name == name)
}

fn check_allowed_types(
    column: &Column,
    props: &ColumnProperties,
    parameter: &str,
    warnings: &mut Vec<ValidationWarning>,
) -> bool {
    if props.allowed_types.is_empty() || props.allowed_types.iter().any(|t| t == &column.type_name)
    {
        return true;
    }
    warnings.push(
        ValidationWarning::error()
            .with_msg("column type is not allowed for this transformer")
            .with_meta("parameter", parameter)
            .with_meta("column", column.name.clone())
            .with_meta("type", column.type_name.clone())
            .with_meta("allowed_types", props.allowed_types.join(", ")),
    );
    false
}

/// Resolves raw config values against the declared parameters.
///
/// Problems are reported as warnings; an error-severity warning means the
/// transformer must not be instantiated.
pub fn resolve_parameters(
    declared: &[Parameter],
    raw: &RawParams,
    columns: &[Column],
) -> (ResolvedParams, Vec<ValidationWarning>) {
    let mut warnings = Vec::new();
    let mut resolved = ResolvedParams::default();

    for key in raw.keys() {
        if !declared.iter().any(|p| &p.name == key) {
            warnings.push(
                ValidationWarning::new(Severity::Warning)
                    .with_msg("parameter is not declared by the transformer")
                    .with_meta("parameter", key.clone()),
            );
        }
    }

    // First pass: values, defaults, direct column bindings.
    for param in declared {
        let value = match raw.get(&param.name) {
            Some(v) => v.clone(),
            None if param.required => {
                warnings.push(
                    ValidationWarning::error()
                        .with_msg("required parameter is not provided")
                        .with_meta("parameter", param.name.clone()),
                );
                continue;
            }
            None => match &param.default_value {
                Some(v) => v.clone(),
                None => continue,
            },
        };

        let mut entry = ResolvedValue {
            value,
            column: None,
            columns: Vec::new(),
            properties: param.column_properties.clone(),
        };

        if let Some(props) = &param.column_properties {
            if param.is_column_container {
                match &entry.value {
                    Value::Array(items) => {
                        for item in items {
                            let Value::String(name) = item else {
                                warnings.push(
                                    ValidationWarning::error()
                                        .with_msg("column container entries must be strings")
                                        .with_meta("parameter", param.name.clone()),
                                );
                                continue;
                            };
                            match find_column(columns, name) {
                                Some(column) => {
                                    if check_allowed_types(column, props, &param.name, &mut warnings)
                                    {
                                        entry.columns.push(column.clone());
                                    }
                                }
                                None => warnings.push(
                                    ValidationWarning::error()
                                        .with_msg("column is not found on the table")
                                        .with_meta("parameter", param.name.clone())
                                        .with_meta("column", name.clone()),
                                ),
                            }
                        }
                    }
                    other => warnings.push(
                        ValidationWarning::error()
                            .with_msg("column container must be an array of column names")
                            .with_meta("parameter", param.name.clone())
                            .with_meta("value", other.to_string()),
                    ),
                }
            } else {
                match &entry.value {
                    Value::String(name) => match find_column(columns, name) {
                        Some(column) => {
                            if check_allowed_types(column, props, &param.name, &mut warnings) {
                                entry.column = Some(column.clone());
                            }
                        }
                        None => warnings.push(
                            ValidationWarning::error()
                                .with_msg("column is not found on the table")
                                .with_meta("parameter", param.name.clone())
                                .with_meta("column", name.clone()),
                        ),
                    },
                    other => warnings.push(
                        ValidationWarning::error()
                            .with_msg("column parameter must be a string")
                            .with_meta("parameter", param.name.clone())
                            .with_meta("value", other.to_string()),
                    ),
                }
            }
        }

        resolved.values.insert(param.name.clone(), entry);
    }

    // Second pass: linked column bindings.
    for param in declared {
        let Some(link) = &param.link_column_parameter else { continue };
        if !resolved.values.contains_key(&param.name) {
            continue;
        }
        let linked_column = resolved.values.get(link.as_str()).and_then(|v| v.column.clone());
        match linked_column {
            Some(column) => {
                if let Some(entry) = resolved.values.get_mut(&param.name) {
                    entry.column = Some(column);
                }
            }
            None => warnings.push(
                ValidationWarning::error()
                    .with_msg("linked parameter does not bind a column")
                    .with_meta("parameter", param.name.clone())
                    .with_meta("linked_parameter", link.clone()),
            ),
        }
    }

    (resolved, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    use veildump_core::is_fatal;

    fn columns() -> Vec<Column> {
        vec![
            Column::new("id", 0, 23, "int4").with_not_null(true),
            Column::new("email", 1, 25, "text"),
        ]
    }

    fn column_param(name: &str) -> Parameter {
        Parameter::new(name, "target column").required().as_column(ColumnProperties {
            allowed_types: vec!["text".into(), "varchar".into()],
            affected: true,
            skip_original_data: false,
            skip_on_null: true,
        })
    }

    #[test]
    fn required_missing_is_fatal() {
        let declared = vec![column_param("column")];
        let (_, warnings) = resolve_parameters(&declared, &RawParams::new(), &columns());
        assert!(is_fatal(&warnings));
    }

    #[test]
    fn defaults_fill_optional_parameters() {
        let declared = vec![Parameter::new("mask_char", "mask character").with_default("*")];
        let (resolved, warnings) = resolve_parameters(&declared, &RawParams::new(), &columns());
        assert!(warnings.is_empty());
        assert_eq!(resolved.require_str("mask_char").unwrap(), "*");
    }

    #[test]
    fn column_binding_and_metadata() {
        let declared = vec![column_param("column")];
        let mut raw = RawParams::new();
        raw.insert("column".into(), "email".into());
        let (resolved, warnings) = resolve_parameters(&declared, &raw, &columns());
        assert!(warnings.is_empty());
        let column = resolved.require_column("column").unwrap();
        assert_eq!(column.ordinal, 1);
        assert_eq!(column.type_name, "text");
        assert_eq!(resolved.affected_columns(), vec![1]);
        assert_eq!(resolved.skip_on_null_columns(), vec![1]);
    }

    #[test]
    fn unknown_column_is_fatal() {
        let declared = vec![column_param("column")];
        let mut raw = RawParams::new();
        raw.insert("column".into(), "nope".into());
        let (_, warnings) = resolve_parameters(&declared, &raw, &columns());
        assert!(is_fatal(&warnings));
    }

    #[test]
    fn disallowed_type_is_fatal() {
        let declared = vec![column_param("column")];
        let mut raw = RawParams::new();
        raw.insert("column".into(), "id".into());
        let (_, warnings) = resolve_parameters(&declared, &raw, &columns());
        assert!(is_fatal(&warnings));
        assert!(warnings.iter().any(|w| w.msg.contains("type is not allowed")));
    }

    #[test]
    fn linked_parameter_inherits_binding() {
        let declared = vec![
            column_param("column"),
            Parameter::new("min", "lower bound").linked_to("column"),
        ];
        let mut raw = RawParams::new();
        raw.insert("column".into(), "email".into());
        raw.insert("min".into(), "a".into());
        let (resolved, warnings) = resolve_parameters(&declared, &raw, &columns());
        assert!(warnings.is_empty());
        assert_eq!(resolved.require_column("min").unwrap().name, "email");
    }

    #[test]
    fn undeclared_parameter_warns_without_fatality() {
        let declared = vec![Parameter::new("a", "").with_default(1)];
        let mut raw = RawParams::new();
        raw.insert("typo".into(), 1.into());
        let (_, warnings) = resolve_parameters(&declared, &raw, &columns());
        assert_eq!(warnings.len(), 1);
        assert!(!is_fatal(&warnings));
    }

    #[test]
    fn case_sensitive_keys() {
        let declared = vec![Parameter::new("maxLen", "").required()];
        let mut raw = RawParams::new();
        raw.insert("maxlen".into(), 1.into());
        let (_, warnings) = resolve_parameters(&declared, &raw, &columns());
        // The lowercased key is undeclared and the declared one is missing.
        assert!(is_fatal(&warnings));
        assert_eq!(warnings.len(), 2);
    }
}
