//! Replace a column with a value drawn from a fixed dictionary.

use rand::rngs::StdRng;
use rand::Rng;

use veildump_core::{Row, RowValue, ValidationWarning};

use crate::definition::{ColumnProperties, Parameter, TransformerDefinition};
use crate::error::{TransformError, TransformResult};
use crate::transformer::Transformer;

struct RandomChoiceTransformer {
    index: usize,
    values: Vec<Vec<u8>>,
    rng: StdRng,
}

impl Transformer for RandomChoiceTransformer {
    fn transform(&mut self, row: &mut Row) -> TransformResult<()> {
        let pick = self.rng.gen_range(0..self.values.len());
        row.set_column(self.index, RowValue::Bytes(self.values[pick].clone()))?;
        Ok(())
    }
}

/// The `random_choice` transformer definition.
#[must_use]
pub fn definition() -> TransformerDefinition {
    TransformerDefinition::new(
        "random_choice",
        "replace the column with a random element of a fixed list",
        vec![
            Parameter::new("column", "column to randomize").required().as_column(
                ColumnProperties {
                    allowed_types: Vec::new(),
                    affected: true,
                    skip_original_data: true,
                    skip_on_null: true,
                },
            ),
            Parameter::new("values", "candidate values, at least one").required(),
            Parameter::new("seed", "fix the RNG seed for reproducible output"),
        ],
        |ctx| {
            let index = ctx.params.require_column("column")?.ordinal;
            let values = match ctx.params.get("values").map(|v| &v.value) {
                Some(serde_json::Value::Array(items)) if !items.is_empty() => items
                    .iter()
                    .map(|item| {
                        super::value_to_bytes(item).ok_or_else(|| {
                            TransformError::parameter("values", "entries must not be null")
                        })
                    })
                    .collect::<TransformResult<Vec<_>>>()?,
                Some(other) => {
                    return Err(TransformError::parameter(
                        "values",
                        format!("expected a non-empty array, got {other}"),
                    ))
                }
                None => return Err(TransformError::parameter("values", "missing")),
            };
            let rng = super::build_rng(ctx.params.opt_i64("seed")?);
            Ok(Box::new(RandomChoiceTransformer { index, values, rng }))
        },
    )
    .with_validate(|ctx| {
        let mut warnings = Vec::new();
        match ctx.params.get("values").map(|v| &v.value) {
            Some(serde_json::Value::Array(items)) if items.is_empty() => warnings.push(
                ValidationWarning::error()
                    .with_msg("values must not be empty")
                    .with_meta("parameter", "values"),
            ),
            Some(serde_json::Value::Array(_)) | None => {}
            Some(other) => warnings.push(
                ValidationWarning::error()
                    .with_msg("values must be an array")
                    .with_meta("parameter", "values")
                    .with_meta("value", other.to_string()),
            ),
        }
        warnings
    })
}
