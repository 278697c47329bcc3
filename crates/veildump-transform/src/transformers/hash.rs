//! Replace a column with a digest of its value.

use md5::Md5;
use sha2::{Digest, Sha256, Sha512};

use veildump_core::{Row, RowValue, ValidationWarning};

use crate::definition::{ColumnProperties, Parameter, TransformerDefinition};
use crate::error::{TransformError, TransformResult};
use crate::transformer::Transformer;

const TEXT_TYPES: &[&str] = &["text", "varchar", "bpchar", "citext"];

#[derive(Clone, Copy)]
enum HashFunction {
    Md5,
    Sha256,
    Sha512,
}

impl HashFunction {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "md5" => Some(Self::Md5),
            "sha256" => Some(Self::Sha256),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    fn digest_hex(self, salt: &[u8], value: &[u8]) -> String {
        match self {
            Self::Md5 => {
                let mut hasher = Md5::new();
                hasher.update(salt);
                hasher.update(value);
                hex::encode(hasher.finalize())
            }
            Self::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(salt);
                hasher.update(value);
                hex::encode(hasher.finalize())
            }
            Self::Sha512 => {
                let mut hasher = Sha512::new();
                hasher.update(salt);
                hasher.update(value);
                hex::encode(hasher.finalize())
            }
        }
    }
}

struct HashTransformer {
    index: usize,
    function: HashFunction,
    salt: Vec<u8>,
    max_length: Option<usize>,
}

impl Transformer for HashTransformer {
    fn transform(&mut self, row: &mut Row) -> TransformResult<()> {
        let Some(value) = row.raw(self.index)? else {
            // skip_on_null is declared on the column binding, so a NULL here
            // means the driver-level bypass was disabled deliberately.
            return Ok(());
        };
        let mut digest = self.function.digest_hex(&self.salt, value);
        if let Some(max) = self.max_length {
            digest.truncate(max);
        }
        row.set_column(self.index, RowValue::from(digest))?;
        Ok(())
    }
}

/// The `hash` transformer definition.
#[must_use]
pub fn definition() -> TransformerDefinition {
    TransformerDefinition::new(
        "hash",
        "replace the column with a salted digest of its value",
        vec![
            Parameter::new("column", "column to hash").required().as_column(ColumnProperties {
                allowed_types: TEXT_TYPES.iter().map(|s| (*s).to_owned()).collect(),
                affected: true,
                skip_original_data: false,
                skip_on_null: true,
            }),
            Parameter::new("function", "digest function: md5, sha256, or sha512")
                .with_default("sha256"),
            Parameter::new("salt", "prefix mixed into the digest").with_default(""),
            Parameter::new("max_length", "truncate the hex digest to this length"),
        ],
        |ctx| {
            let index = ctx.params.require_column("column")?.ordinal;
            let function_name = ctx.params.require_str("function")?;
            let function = HashFunction::parse(function_name).ok_or_else(|| {
                TransformError::parameter("function", format!("unknown digest {function_name:?}"))
            })?;
            let salt = ctx.params.require_str("salt")?.as_bytes().to_vec();
            let max_length = match ctx.params.opt_i64("max_length")? {
                Some(len) if len > 0 => Some(len as usize),
                Some(len) => {
                    return Err(TransformError::parameter(
                        "max_length",
                        format!("{len} is not positive"),
                    ))
                }
                None => None,
            };
            Ok(Box::new(HashTransformer { index, function, salt, max_length }))
        },
    )
    .with_validate(|ctx| {
        let mut warnings = Vec::new();
        if let Ok(name) = ctx.params.require_str("function") {
            if HashFunction::parse(name).is_none() {
                warnings.push(
                    ValidationWarning::error()
                        .with_msg("unknown digest function")
                        .with_meta("parameter", "function")
                        .with_meta("value", name.to_owned()),
                );
            }
        }
        warnings
    })
}
