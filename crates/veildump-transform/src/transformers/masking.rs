//! Mask a column's characters in place.

use veildump_core::{Row, RowValue, ValidationWarning};

use crate::definition::{ColumnProperties, Parameter, TransformerDefinition};
use crate::error::{TransformError, TransformResult};
use crate::transformer::Transformer;

const TEXT_TYPES: &[&str] = &["text", "varchar", "bpchar", "citext"];

#[derive(Clone, Copy, PartialEq)]
enum MaskKind {
    /// Mask every character.
    Default,
    /// Mask the local part of an address, keep `@domain`.
    Email,
}

impl MaskKind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::Default),
            "email" => Some(Self::Email),
            _ => None,
        }
    }
}

struct MaskingTransformer {
    index: usize,
    kind: MaskKind,
    mask_char: char,
}

impl MaskingTransformer {
    fn mask(&self, text: &str) -> String {
        match self.kind {
            MaskKind::Default => text.chars().map(|_| self.mask_char).collect(),
            MaskKind::Email => match text.rsplit_once('@') {
                Some((local, domain)) => {
                    let mut masked: String = local.chars().map(|_| self.mask_char).collect();
                    masked.push('@');
                    masked.push_str(domain);
                    masked
                }
                None => text.chars().map(|_| self.mask_char).collect(),
            },
        }
    }
}

impl Transformer for MaskingTransformer {
    fn transform(&mut self, row: &mut Row) -> TransformResult<()> {
        let masked = match row.text(self.index) {
            Ok(None) => return Ok(()),
            Ok(Some(text)) => self.mask(text),
            Err(_) => {
                return Err(TransformError::failure(
                    "masking",
                    "column value is not valid utf-8",
                ))
            }
        };
        row.set_column(self.index, RowValue::from(masked))?;
        Ok(())
    }
}

/// The `masking` transformer definition.
#[must_use]
pub fn definition() -> TransformerDefinition {
    TransformerDefinition::new(
        "masking",
        "replace characters with a mask, preserving length",
        vec![
            Parameter::new("column", "column to mask").required().as_column(ColumnProperties {
                allowed_types: TEXT_TYPES.iter().map(|s| (*s).to_owned()).collect(),
                affected: true,
                skip_original_data: false,
                skip_on_null: true,
            }),
            Parameter::new("kind", "masking rule: default or email").with_default("default"),
            Parameter::new("mask_char", "replacement character").with_default("*"),
        ],
        |ctx| {
            let index = ctx.params.require_column("column")?.ordinal;
            let kind_name = ctx.params.require_str("kind")?;
            let kind = MaskKind::parse(kind_name).ok_or_else(|| {
                TransformError::parameter("kind", format!("unknown masking kind {kind_name:?}"))
            })?;
            let mask_str = ctx.params.require_str("mask_char")?;
            let mut chars = mask_str.chars();
            let mask_char = match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => {
                    return Err(TransformError::parameter(
                        "mask_char",
                        "must be exactly one character",
                    ))
                }
            };
            Ok(Box::new(MaskingTransformer { index, kind, mask_char }))
        },
    )
    .with_validate(|ctx| {
        let mut warnings = Vec::new();
        if let Ok(name) = ctx.params.require_str("kind") {
            if MaskKind::parse(name).is_none() {
                warnings.push(
                    ValidationWarning::error()
                        .with_msg("unknown masking kind")
                        .with_meta("parameter", "kind")
                        .with_meta("value", name.to_owned()),
                );
            }
        }
        warnings
    })
}

#[cfg(test)]
mod tests {
    use super::super::testing::{bind, row};
    use super::*;

    #[test]
    fn default_masks_every_char() {
        let def = definition();
        let mut bound = bind(&def, &[("column", "name".into())]);
        let mut r = row(b"1\talice\ta@b.c");
        bound.apply(&mut r).unwrap();
        assert_eq!(r.encode(), b"1\t*****\ta@b.c");
    }

    #[test]
    fn email_keeps_domain() {
        let def = definition();
        let mut bound = bind(&def, &[("column", "email".into()), ("kind", "email".into())]);
        let mut r = row(b"1\talice\talice@example.com");
        bound.apply(&mut r).unwrap();
        assert_eq!(r.encode(), b"1\talice\t*****@example.com");
    }

    #[test]
    fn custom_mask_char() {
        let def = definition();
        let mut bound = bind(&def, &[("column", "name".into()), ("mask_char", "#".into())]);
        let mut r = row(b"1\tbob\tx");
        bound.apply(&mut r).unwrap();
        assert_eq!(r.encode(), b"1\t###\tx");
    }

    #[test]
    fn null_is_skipped() {
        let def = definition();
        let mut bound = bind(&def, &[("column", "name".into())]);
        let mut r = row(b"1\t\\N\tx");
        bound.apply(&mut r).unwrap();
        assert_eq!(r.encode(), b"1\t\\N\tx");
    }
}
