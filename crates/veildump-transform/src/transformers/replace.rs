//! Replace a column with a constant value.

use veildump_core::{Row, RowValue};

use crate::definition::{ColumnProperties, Parameter, TransformerDefinition};
use crate::error::{TransformError, TransformResult};
use crate::transformer::Transformer;

use super::value_to_bytes;

struct ReplaceTransformer {
    index: usize,
    value: Vec<u8>,
    keep_null: bool,
}

impl Transformer for ReplaceTransformer {
    fn transform(&mut self, row: &mut Row) -> TransformResult<()> {
        if self.keep_null && row.is_null(self.index)? {
            return Ok(());
        }
        row.set_column(self.index, RowValue::Bytes(self.value.clone()))?;
        Ok(())
    }
}

/// The `replace` transformer definition.
#[must_use]
pub fn definition() -> TransformerDefinition {
    TransformerDefinition::new(
        "replace",
        "replace the column value with a fixed value",
        vec![
            Parameter::new("column", "column to overwrite").required().as_column(
                ColumnProperties {
                    allowed_types: Vec::new(),
                    affected: true,
                    skip_original_data: true,
                    skip_on_null: false,
                },
            ),
            Parameter::new("value", "replacement value").required(),
            Parameter::new("keep_null", "leave NULL cells untouched").with_default(true),
        ],
        |ctx| {
            let index = ctx.params.require_column("column")?.ordinal;
            let value = ctx
                .params
                .get("value")
                .and_then(|v| value_to_bytes(&v.value))
                .ok_or_else(|| TransformError::parameter("value", "must not be null"))?;
            let keep_null = ctx.params.opt_bool("keep_null")?.unwrap_or(true);
            Ok(Box::new(ReplaceTransformer { index, value, keep_null }))
        },
    )
}
