//! Overwrite a column with NULL.

use veildump_core::{Row, RowValue, Severity, ValidationWarning};

use crate::definition::{ColumnProperties, Parameter, TransformerDefinition};
use crate::error::TransformResult;
use crate::transformer::Transformer;

struct SetNullTransformer {
    index: usize,
}

impl Transformer for SetNullTransformer {
    fn transform(&mut self, row: &mut Row) -> TransformResult<()> {
        row.set_column(self.index, RowValue::Null)?;
        Ok(())
    }
}

/// The `set_null` transformer definition.
#[must_use]
pub fn definition() -> TransformerDefinition {
    TransformerDefinition::new(
        "set_null",
        "overwrite the column with NULL",
        vec![Parameter::new("column", "column to null out").required().as_column(
            ColumnProperties {
                allowed_types: Vec::new(),
                affected: true,
                skip_original_data: true,
                skip_on_null: false,
            },
        )],
        |ctx| {
            let index = ctx.params.require_column("column")?.ordinal;
            Ok(Box::new(SetNullTransformer { index }))
        },
    )
    .with_validate(|ctx| {
        let mut warnings = Vec::new();
        if let Ok(column) = ctx.params.require_column("column") {
            if column.not_null {
                warnings.push(
                    ValidationWarning::new(Severity::Warning)
                        .with_msg("column has a NOT NULL constraint; restore will reject the data")
                        .with_meta("column", column.name.clone()),
                );
            }
        }
        warnings
    })
}
