//! Shared command context: config, registry, storage, connector.

use std::path::{Path, PathBuf};

use veildump::config::Config;
use veildump::db::postgres::PgConnector;
use veildump::db::Connector;
use veildump::{DirectoryStorage, Error, Result};
use veildump_transform::{
    bootstrap_custom_transformers, CustomTransformerSpec, TransformerRegistry,
};

use crate::Cli;

/// Everything a command needs, built once per invocation.
pub struct CliContext {
    pub config: Config,
    pub registry: TransformerRegistry,
    dsn: Option<String>,
    config_dir: PathBuf,
}

impl CliContext {
    /// Loads config and bootstraps the transformer registry (built-ins
    /// plus configured external executables).
    pub fn load(cli: &Cli) -> Result<Self> {
        let config = Config::load(&cli.config)?;
        let config_dir = cli
            .config
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut registry = TransformerRegistry::with_builtins();
        let specs: Vec<CustomTransformerSpec> = config
            .custom_transformers
            .iter()
            .map(|c| CustomTransformerSpec {
                executable: resolve_executable(&config_dir, &c.executable),
                args: c.args.clone(),
            })
            .collect();
        bootstrap_custom_transformers(&mut registry, &specs)?;

        Ok(Self { config, registry, dsn: cli.dsn.clone(), config_dir })
    }

    /// Storage root holding one directory per archive.
    pub fn storage_root(&self) -> Result<DirectoryStorage> {
        DirectoryStorage::open(&self.config.storage.directory).map_err(Error::from)
    }

    /// Connector for the configured database.
    pub fn connector(&self) -> Result<Box<dyn Connector>> {
        match &self.dsn {
            Some(dsn) => Ok(Box::new(PgConnector::from_dsn(dsn)?)),
            None => Ok(Box::new(PgConnector::from_env())),
        }
    }

    /// Directory the config file lives in; external transformer paths
    /// resolve relative to it.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

fn resolve_executable(config_dir: &Path, executable: &str) -> PathBuf {
    let path = Path::new(executable);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        config_dir.join(path)
    }
}
