//! Replace a column with a uniform random integer.

use rand::rngs::StdRng;
use rand::Rng;

use veildump_core::{Row, RowValue, ValidationWarning};

use crate::definition::{ColumnProperties, Parameter, TransformerDefinition};
use crate::error::{TransformError, TransformResult};
use crate::transformer::Transformer;

const INT_TYPES: &[&str] = &["int2", "int4", "int8", "numeric"];

struct RandomIntTransformer {
    index: usize,
    min: i64,
    max: i64,
    rng: StdRng,
}

impl Transformer for RandomIntTransformer {
    fn transform(&mut self, row: &mut Row) -> TransformResult<()> {
        let value = self.rng.gen_range(self.min..=self.max);
        row.set_column(self.index, RowValue::from(value.to_string()))?;
        Ok(())
    }
}

/// The `random_int` transformer definition.
#[must_use]
pub fn definition() -> TransformerDefinition {
    TransformerDefinition::new(
        "random_int",
        "replace the column with a uniform random integer in [min, max]",
        vec![
            Parameter::new("column", "column to randomize").required().as_column(
                ColumnProperties {
                    allowed_types: INT_TYPES.iter().map(|s| (*s).to_owned()).collect(),
                    affected: true,
                    skip_original_data: true,
                    skip_on_null: true,
                },
            ),
            Parameter::new("min", "inclusive lower bound").required(),
            Parameter::new("max", "inclusive upper bound").required(),
            Parameter::new("seed", "fix the RNG seed for reproducible output"),
        ],
        |ctx| {
            let index = ctx.params.require_column("column")?.ordinal;
            let min = ctx.params.require_i64("min")?;
            let max = ctx.params.require_i64("max")?;
            if min > max {
                return Err(TransformError::parameter("min", format!("{min} exceeds max {max}")));
            }
            let rng = super::build_rng(ctx.params.opt_i64("seed")?);
            Ok(Box::new(RandomIntTransformer { index, min, max, rng }))
        },
    )
    .with_validate(|ctx| {
        let mut warnings = Vec::new();
        if let (Ok(min), Ok(max)) = (ctx.params.require_i64("min"), ctx.params.require_i64("max"))
        {
            if min > max {
                warnings.push(
                    ValidationWarning::error()
                        .with_msg("min exceeds max")
                        .with_meta("min", min)
                        .with_meta("max", max),
                );
            }
        }
        warnings
    })
}
