//! Replace a column with a uniform random float.

use rand::rngs::StdRng;
use rand::Rng;

use veildump_core::{Row, RowValue, ValidationWarning};

use crate::definition::{ColumnProperties, Parameter, TransformerDefinition};
use crate::error::{TransformError, TransformResult};
use crate::transformer::Transformer;

const FLOAT_TYPES: &[&str] = &["float4", "float8", "numeric"];

struct RandomFloatTransformer {
    index: usize,
    min: f64,
    max: f64,
    decimals: usize,
    rng: StdRng,
}

impl Transformer for RandomFloatTransformer {
    fn transform(&mut self, row: &mut Row) -> TransformResult<()> {
        let value = self.rng.gen_range(self.min..=self.max);
        let decimals = self.decimals;
        row.set_column(self.index, RowValue::from(format!("{value:.decimals$}")))?;
        Ok(())
    }
}

/// The `random_float` transformer definition.
#[must_use]
pub fn definition() -> TransformerDefinition {
    TransformerDefinition::new(
        "random_float",
        "replace the column with a uniform random float in [min, max]",
        vec![
            Parameter::new("column", "column to randomize").required().as_column(
                ColumnProperties {
                    allowed_types: FLOAT_TYPES.iter().map(|s| (*s).to_owned()).collect(),
                    affected: true,
                    skip_original_data: true,
                    skip_on_null: true,
                },
            ),
            Parameter::new("min", "inclusive lower bound").required(),
            Parameter::new("max", "inclusive upper bound").required(),
            Parameter::new("decimals", "fraction digits in the emitted value").with_default(4),
            Parameter::new("seed", "fix the RNG seed for reproducible output"),
        ],
        |ctx| {
            let index = ctx.params.require_column("column")?.ordinal;
            let min = ctx.params.require_f64("min")?;
            let max = ctx.params.require_f64("max")?;
            if !(min <= max) {
                return Err(TransformError::parameter(
                    "min",
                    format!("range [{min}, {max}] is empty or not a number"),
                ));
            }
            let decimals = match ctx.params.opt_i64("decimals")? {
                Some(d) if (0..=17).contains(&d) => d as usize,
                Some(d) => {
                    return Err(TransformError::parameter(
                        "decimals",
                        format!("{d} outside [0, 17]"),
                    ))
                }
                None => 4,
            };
            let rng = super::build_rng(ctx.params.opt_i64("seed")?);
            Ok(Box::new(RandomFloatTransformer { index, min, max, decimals, rng }))
        },
    )
    .with_validate(|ctx| {
        let mut warnings = Vec::new();
        if let (Ok(min), Ok(max)) = (ctx.params.require_f64("min"), ctx.params.require_f64("max"))
        {
            if !(min <= max) {
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
