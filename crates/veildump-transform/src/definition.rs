//! Transformer definitions and parameter declarations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use veildump_core::{is_fatal, Column, ValidationWarning};

use crate::error::TransformResult;
use crate::params::{resolve_parameters, RawParams, ResolvedParams};
use crate::transformer::{BoundTransformer, Transformer};

/// Constraints a parameter places on the column it names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnProperties {
    /// Type names the column may have; empty means any type.
    #[serde(default)]
    pub allowed_types: Vec<String>,
    /// Whether the transformer writes this column.
    #[serde(default)]
    pub affected: bool,
    /// Whether the transformer never reads the original value.
    #[serde(default)]
    pub skip_original_data: bool,
    /// Whether the transformer is bypassed when this column is NULL.
    #[serde(default)]
    pub skip_on_null: bool,
}

/// One declared parameter of a transformer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name, case-sensitive.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the parameter must be present in config.
    #[serde(default)]
    pub required: bool,
    /// Value used when the parameter is omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    /// Name of another parameter whose column binding this one inherits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_column_parameter: Option<String>,
    /// Database type the raw value should be cast to before use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cast_db_type: Option<String>,
    /// Present when the parameter names a column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_properties: Option<ColumnProperties>,
    /// Whether the value is a container naming several columns.
    #[serde(default)]
    pub is_column_container: bool,
}

impl Parameter {
    /// Declares a parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
            default_value: None,
            link_column_parameter: None,
            cast_db_type: None,
            column_properties: None,
            is_column_container: false,
        }
    }

    /// Marks the parameter required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Makes the parameter name a column with the given constraints.
    #[must_use]
    pub fn as_column(mut self, properties: ColumnProperties) -> Self {
        self.column_properties = Some(properties);
        self
    }

    /// Inherits the column binding of another parameter.
    #[must_use]
    pub fn linked_to(mut self, parameter: impl Into<String>) -> Self {
        self.link_column_parameter = Some(parameter.into());
        self
    }
}

/// Context handed to a transformer factory: the table's columns and the
/// resolved parameter values.
#[derive(Debug, Clone)]
pub struct TransformContext {
    /// Columns of the table, in COPY order.
    pub columns: Vec<Column>,
    /// Resolved parameters.
    pub params: ResolvedParams,
}

type NewFn =
    Arc<dyn Fn(&TransformContext) -> TransformResult<Box<dyn Transformer>> + Send + Sync>;
type ValidateFn = Arc<dyn Fn(&TransformContext) -> Vec<ValidationWarning> + Send + Sync>;

/// A registered transformer: metadata plus factories.
#[derive(Clone, Serialize)]
pub struct TransformerDefinition {
    /// Transformer name as referenced from config.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Declared parameters, in display order.
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing)]
    new_fn: NewFn,
    #[serde(skip_serializing)]
    validate_fn: Option<ValidateFn>,
}

impl std::fmt::Debug for TransformerDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformerDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl TransformerDefinition {
    /// Creates a definition with the given factory.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<Parameter>,
        new_fn: impl Fn(&TransformContext) -> TransformResult<Box<dyn Transformer>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            new_fn: Arc::new(new_fn),
            validate_fn: None,
        }
    }

    /// Attaches a post-resolution validation hook.
    #[must_use]
    pub fn with_validate(
        mut self,
        validate_fn: impl Fn(&TransformContext) -> Vec<ValidationWarning> + Send + Sync + 'static,
    ) -> Self {
        self.validate_fn = Some(Arc::new(validate_fn));
        self
    }

    /// Resolves parameters against a table's columns, validates them, and
    /// builds an instance when the warnings are non-fatal.
    ///
    /// The warnings are always returned so callers can report every problem
    /// in one pass; the instance is `None` iff the batch is fatal.
    ///
    /// # Errors
    ///
    /// Returns an error only for factory failures that are not expressible
    /// as validation warnings (for example an external process that cannot
    /// be spawned).
    pub fn bind(
        &self,
        raw: &RawParams,
        columns: &[Column],
    ) -> TransformResult<(Option<BoundTransformer>, Vec<ValidationWarning>)> {
        let (params, mut warnings) = resolve_parameters(&self.parameters, raw, columns);
        let context = TransformContext { columns: columns.to_vec(), params };

        if let Some(validate) = &self.validate_fn {
            warnings.extend(validate(&context));
        }
        for warning in &mut warnings {
            warning.meta.insert("transformer".into(), self.name.clone().into());
        }
        if is_fatal(&warnings) {
            return Ok((None, warnings));
        }

        let transformer = (self.new_fn)(&context)?;
        let bound = BoundTransformer {
            name: self.name.clone(),
            affected: context.params.affected_columns(),
            skip_on_null: context.params.skip_on_null_columns(),
            transformer,
        };
        Ok((Some(bound), warnings))
    }
}
