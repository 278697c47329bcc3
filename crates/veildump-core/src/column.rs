//! Column metadata shared between the catalog, the transformer registry,
//! and the row driver.

use serde::{Deserialize, Serialize};

/// Coarse classification of a column's SQL type.
///
/// Transformer definitions restrict themselves to concrete type names; the
/// category is used for diagnostics and for the generic "any numeric"-style
/// checks some transformers perform at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCategory {
    Numeric,
    Text,
    DateTime,
    Boolean,
    Binary,
    Other,
}

impl TypeCategory {
    /// Classifies a PostgreSQL type name.
    #[must_use]
    pub fn of(type_name: &str) -> Self {
        match type_name {
            "int2" | "int4" | "int8" | "smallint" | "integer" | "bigint" | "numeric"
            | "decimal" | "float4" | "float8" | "real" | "double precision" | "money"
            | "oid" => Self::Numeric,
            "text" | "varchar" | "character varying" | "bpchar" | "character" | "char"
            | "citext" | "name" => Self::Text,
            "date" | "timestamp" | "timestamptz" | "timestamp without time zone"
            | "timestamp with time zone" | "time" | "timetz" | "interval" => Self::DateTime,
            "bool" | "boolean" => Self::Boolean,
            "bytea" => Self::Binary,
            _ => Self::Other,
        }
    }
}

/// One column of a dumped table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Zero-based position within the COPY row.
    pub ordinal: usize,
    /// Type OID as reported by the catalog.
    pub type_oid: u32,
    /// Canonical type name.
    pub type_name: String,
    /// Whether the column carries a NOT NULL constraint.
    pub not_null: bool,
    /// Declared length (`atttypmod`), `-1` for variable-length types.
    pub length: i32,
    /// Coarse type classification.
    pub category: TypeCategory,
}

impl Column {
    /// Creates a column, deriving the category from the type name.
    #[must_use]
    pub fn new(name: impl Into<String>, ordinal: usize, type_oid: u32, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let category = TypeCategory::of(&type_name);
        Self { name: name.into(), ordinal, type_oid, type_name, not_null: false, length: -1, category }
    }

    /// Sets the NOT NULL flag.
    #[must_use]
    pub fn with_not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    /// Sets the declared length.
    #[must_use]
    pub fn with_length(mut self, length: i32) -> Self {
        self.length = length;
        self
    }
}
