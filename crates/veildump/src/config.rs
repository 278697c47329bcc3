//! Configuration model.
//!
//! The config file is YAML or JSON, chosen by extension. Transformer
//! `params` maps deserialize into raw JSON values keyed by the exact
//! string from the file: parameter names are case-sensitive, so the
//! loader must never normalize keys the way generic config layers
//! sometimes do.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use veildump_transform::RawParams;

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub common: CommonConfig,
    pub storage: StorageConfig,
    pub log: LogConfig,
    pub dump: DumpConfig,
    pub subset: SubsetConfig,
    pub validate: ValidateConfig,
    pub restore: RestoreConfig,
    pub custom_transformers: Vec<CustomTransformerConfig>,
}

/// Settings shared by every command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CommonConfig {
    /// Parallel worker count for data phases.
    pub jobs: usize,
    /// Scratch directory for validation runs.
    pub temp_directory: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self { jobs: 4, temp_directory: std::env::temp_dir().display().to_string() }
    }
}

/// Archive storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StorageConfig {
    /// Root directory holding one sub-directory per archive.
    pub directory: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { directory: "./archives".into() }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LogConfig {
    /// Minimum level: debug, info, warn, error.
    pub level: String,
    /// Output format: text or json.
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".into(), format: "text".into() }
    }
}

/// Row-level error policy for the dump driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowErrorPolicy {
    /// Fail the dump on the first bad row.
    Abort,
    /// Log and drop the bad row.
    SkipRow,
    /// Log and stop dumping the table, keeping rows emitted so far.
    SkipTable,
}

/// Dump settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DumpConfig {
    /// Row-error policy.
    pub on_row_error: RowErrorPolicy,
    /// Keep the partial archive when the dump fails.
    pub keep_on_failure: bool,
    /// Per-table transformation entries.
    pub transformation: Vec<TableConfig>,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            on_row_error: RowErrorPolicy::Abort,
            keep_on_failure: false,
            transformation: Vec::new(),
        }
    }
}

/// One table's dump configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TableConfig {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Optional SELECT overriding the dumped row set.
    pub query: Option<String>,
    /// Seed predicate for the subset engine.
    pub subset_condition: Option<String>,
    /// Two transformers may write the same column only when this is set;
    /// chain order then decides the final value.
    pub transformers_ordered: bool,
    /// Apply this entry's transformers to tables inheriting from this one.
    pub apply_for_inherited: bool,
    /// Transformers applied in order.
    pub transformers: Vec<TransformerUse>,
}

/// A transformer reference from config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TransformerUse {
    /// Registry name.
    pub name: String,
    /// Raw parameters, key case preserved.
    #[serde(default)]
    pub params: RawParams,
}

/// Subset engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SubsetConfig {
    /// Bound on the reachability fixed point for cyclic components.
    pub max_iterations: u32,
    /// Drop tables outside every seed's component instead of dumping them
    /// unfiltered.
    pub exclude_unreachable: bool,
}

impl Default for SubsetConfig {
    fn default() -> Self {
        Self { max_iterations: 100, exclude_unreachable: false }
    }
}

/// Validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ValidateConfig {
    /// Dump sample data and print diffs (not just schema warnings).
    pub data: bool,
    /// Row cap per table.
    pub rows_limit: u64,
    /// Restrict validation to these tables (`schema.table` or bare name).
    pub tables: Vec<String>,
    /// Highlight cells whose bytes changed.
    pub diff: bool,
    /// Omit untouched columns from the output.
    pub only_transformed: bool,
    /// Output format: text or json.
    pub format: String,
    /// Text layout: vertical or horizontal.
    pub table_format: String,
    /// Print non-error warnings.
    pub warnings: bool,
    /// Hashes of acknowledged warnings to suppress.
    pub resolved_warnings: Vec<String>,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            data: true,
            rows_limit: 10,
            tables: Vec::new(),
            diff: true,
            only_transformed: false,
            format: "text".into(),
            table_format: "vertical".into(),
            warnings: true,
            resolved_warnings: Vec::new(),
        }
    }
}

/// Restore settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RestoreConfig {
    /// Stop on the first failed entry, or restore everything restorable.
    pub on_error: RestoreErrorPolicy,
    /// Parallel workers within a section.
    pub jobs: usize,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self { on_error: RestoreErrorPolicy::Abort, jobs: 1 }
    }
}

/// Entry-level error policy for restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestoreErrorPolicy {
    /// Stop at the first failure.
    Abort,
    /// Collect failures and keep going.
    Continue,
}

/// One external transformer executable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CustomTransformerConfig {
    /// Executable path, resolved relative to the config file.
    pub executable: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Config {
    /// Loads a config file, dispatching on extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unreadable files, unknown extensions,
    /// and parse failures.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::Config(format!("cannot open {}: {e}", path.display())))?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        match extension {
            "yaml" | "yml" => serde_yaml::from_reader(file)
                .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display()))),
            "json" => serde_json::from_reader(file)
                .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display()))),
            other => Err(Error::Config(format!(
                "unsupported config extension {other:?} (expected yaml, yml, or json)"
            ))),
        }
    }

    /// Finds a table entry by `schema.table` or unique bare `table` name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the name is ambiguous or absent.
    pub fn find_table(&self, reference: &str) -> Result<&TableConfig> {
        let (schema, name) = match reference.split_once('.') {
            Some((schema, name)) => (Some(schema), name),
            None => (None, reference),
        };
        let mut found: Option<&TableConfig> = None;
        for table in &self.dump.transformation {
            let matches = match schema {
                Some(schema) => table.schema == schema && table.name == name,
                None => table.name == name,
            };
            if !matches {
                continue;
            }
            if found.is_some() {
                return Err(Error::Config(format!(
                    "table name {reference:?} is ambiguous; qualify it with a schema"
                )));
            }
            found = Some(table);
        }
        found.ok_or_else(|| {
            Error::Config(format!("table {reference:?} is not present in dump.transformation"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_roundtrip_preserves_param_case() {
        let yaml = r##"
common:
  jobs: 2
dump:
  on-row-error: skip-row
  transformation:
    - schema: public
      name: users
      transformers:
        - name: masking
          params:
            column: email
            maskChar: "#"
"##;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.common.jobs, 2);
        assert_eq!(config.dump.on_row_error, RowErrorPolicy::SkipRow);
        let params = &config.dump.transformation[0].transformers[0].params;
        assert!(params.contains_key("maskChar"));
        assert!(!params.contains_key("maskchar"));
    }

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.validate.rows_limit, 10);
        assert_eq!(config.subset.max_iterations, 100);
        assert_eq!(config.dump.on_row_error, RowErrorPolicy::Abort);
        assert!(!config.dump.keep_on_failure);
    }

    #[test]
    fn find_table_by_qualified_and_bare_name() {
        let mut config = Config::default();
        config.dump.transformation = vec![
            TableConfig { schema: "public".into(), name: "users".into(), ..Default::default() },
            TableConfig { schema: "audit".into(), name: "users".into(), ..Default::default() },
            TableConfig { schema: "public".into(), name: "orders".into(), ..Default::default() },
        ];
        assert_eq!(config.find_table("public.users").unwrap().schema, "public");
        assert_eq!(config.find_table("orders").unwrap().name, "orders");
        assert!(config.find_table("users").is_err());
        assert!(config.find_table("missing").is_err());
    }
}
