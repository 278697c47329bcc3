//! Built-in transformers.
//!
//! Each module exposes a `definition()` returning the registry entry for
//! one transformer. All built-ins bind their target through a required
//! `column` parameter and declare the column affected, so the catalog can
//! detect conflicting writers before any data moves.

mod hash;
mod masking;
mod random_choice;
mod random_date;
mod random_float;
mod random_int;
mod replace;
mod set_null;

pub use hash::definition as hash_definition;
pub use masking::definition as masking_definition;
pub use random_choice::definition as random_choice_definition;
pub use random_date::definition as random_date_definition;
pub use random_float::definition as random_float_definition;
pub use random_int::definition as random_int_definition;
pub use replace::definition as replace_definition;
pub use set_null::definition as set_null_definition;

use crate::definition::TransformerDefinition;

/// Every built-in definition, in registration order.
#[must_use]
pub fn builtin_definitions() -> Vec<TransformerDefinition> {
    vec![
        replace::definition(),
        set_null::definition(),
        hash::definition(),
        masking::definition(),
        random_int::definition(),
        random_float::definition(),
        random_date::definition(),
        random_choice::definition(),
    ]
}

/// Renders a JSON parameter value as COPY cell bytes.
///
/// Strings are taken verbatim; scalars render in their SQL text form;
/// containers render as compact JSON (useful for json/jsonb columns).
pub(crate) fn value_to_bytes(value: &serde_json::Value) -> Option<Vec<u8>> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone().into_bytes()),
        other => Some(other.to_string().into_bytes()),
    }
}

/// Deterministic or entropy-seeded RNG, shared by the random_* family.
pub(crate) fn build_rng(seed: Option<i64>) -> rand::rngs::StdRng {
    use rand::SeedableRng;
    match seed {
        Some(seed) => rand::rngs::StdRng::seed_from_u64(seed as u64),
        None => rand::rngs::StdRng::from_entropy(),
    }
}
