//! Replace a column with a uniform random date.

use rand::rngs::StdRng;
use rand::Rng;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;

use veildump_core::{Row, RowValue, ValidationWarning};

use crate::definition::{ColumnProperties, Parameter, TransformerDefinition};
use crate::error::{TransformError, TransformResult};
use crate::transformer::Transformer;

const DATE_TYPES: &[&str] = &["date", "timestamp", "timestamptz"];

const DATE_FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");

fn parse_date(parameter: &str, value: &str) -> TransformResult<Date> {
    Date::parse(value, DATE_FORMAT).map_err(|e| {
        TransformError::parameter(parameter, format!("{value:?} is not a YYYY-MM-DD date: {e}"))
    })
}

struct RandomDateTransformer {
    index: usize,
    min_julian: i32,
    max_julian: i32,
    rng: StdRng,
}

impl Transformer for RandomDateTransformer {
    fn transform(&mut self, row: &mut Row) -> TransformResult<()> {
        let julian = self.rng.gen_range(self.min_julian..=self.max_julian);
        let date = Date::from_julian_day(julian)
            .map_err(|e| TransformError::failure("random_date", e.to_string()))?;
        let formatted = date
            .format(DATE_FORMAT)
            .map_err(|e| TransformError::failure("random_date", e.to_string()))?;
        row.set_column(self.index, RowValue::from(formatted))?;
        Ok(())
    }
}

/// The `random_date` transformer definition.
#[must_use]
pub fn definition() -> TransformerDefinition {
    TransformerDefinition::new(
        "random_date",
        "replace the column with a uniform random date in [min, max]",
        vec![
            Parameter::new("column", "column to randomize").required().as_column(
                ColumnProperties {
                    allowed_types: DATE_TYPES.iter().map(|s| (*s).to_owned()).collect(),
                    affected: true,
                    skip_original_data: true,
                    skip_on_null: true,
                },
            ),
            Parameter::new("min", "inclusive lower bound, YYYY-MM-DD").required(),
            Parameter::new("max", "inclusive upper bound, YYYY-MM-DD").required(),
            Parameter::new("seed", "fix the RNG seed for reproducible output"),
        ],
        |ctx| {
            let index = ctx.params.require_column("column")?.ordinal;
            let min = parse_date("min", ctx.params.require_str("min")?)?;
            let max = parse_date("max", ctx.params.require_str("max")?)?;
            if min > max {
                return Err(TransformError::parameter(
                    "min",
                    format!("{min} is after max {max}"),
                ));
            }
            let rng = super::build_rng(ctx.params.opt_i64("seed")?);
            Ok(Box::new(RandomDateTransformer {
                index,
                min_julian: min.to_julian_day(),
                max_julian: max.to_julian_day(),
                rng,
            }))
        },
    )
    .with_validate(|ctx| {
        let mut warnings = Vec::new();
        let min = ctx.params.require_str("min").ok().map(|s| parse_date("min", s));
        let max = ctx.params.require_str("max").ok().map(|s| parse_date("max", s));
        for parsed in [&min, &max] {
            if let Some(Err(e)) = parsed {
                warnings.push(
                    ValidationWarning::error()
                        .with_msg("date bound does not parse")
                        .with_meta("reason", e.to_string()),
                );
            }
        }
        if let (Some(Ok(min)), Some(Ok(max))) = (min, max) {
            if min > max {
                warnings.push(
                    ValidationWarning::error()
                        .with_msg("min is after max")
                        .with_meta("min", min.to_string())
                        .with_meta("max", max.to_string()),
                );
            }
        }
        warnings
    })
}
