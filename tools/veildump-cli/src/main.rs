//! veildump command line interface
//!
//! A CLI for dumping, restoring, and validating masked PostgreSQL
//! archives.

mod commands;
mod context;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::context::CliContext;

/// veildump command line interface
///
/// Logical backups with column-level anonymization for PostgreSQL.
#[derive(Parser, Debug)]
#[command(name = "veildump")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file (YAML or JSON)
    #[arg(short, long, env = "VEILDUMP_CONFIG", default_value = "veildump.yaml", global = true)]
    pub config: PathBuf,

    /// Database connection string; PG* environment variables are used
    /// when omitted
    #[arg(long, env = "VEILDUMP_DSN", global = true)]
    pub dsn: Option<String>,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for transformer listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON
    Json,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a dump using the config
    Dump,

    /// Restore an archive into the target database
    Restore {
        /// Archive id (directory name under the storage root)
        archive_id: String,
    },

    /// Run a validation pass and print original-vs-transformed diffs
    Validate,

    /// List archives under the storage root
    ListDumps,

    /// List registered transformers
    ListTransformers {
        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show one transformer in detail
    ShowTransformer {
        /// Transformer name
        name: String,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete an archive by id
    Delete {
        /// Archive id (directory name under the storage root)
        archive_id: String,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("veildump: {e}");
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> veildump::Result<()> {
    let ctx = CliContext::load(&cli)?;
    logging::init(&ctx.config.log.level, &ctx.config.log.format);

    match cli.command {
        Commands::Dump => commands::dump::run(&ctx),
        Commands::Restore { archive_id } => commands::restore::run(&ctx, &archive_id),
        Commands::Validate => commands::validate::run(&ctx),
        Commands::ListDumps => commands::list_dumps::run(&ctx),
        Commands::ListTransformers { format } => commands::transformers::list(&ctx, format),
        Commands::ShowTransformer { name, format } => {
            commands::transformers::show(&ctx, &name, format)
        }
        Commands::Delete { archive_id } => commands::delete::run(&ctx, &archive_id),
    }
}
