//! Lakecat CLI - inspect and manage Iceberg catalogs.

use anyhow::Result;
use clap::{Parser, Subcommand};
use lakecat_core::config::{CatalogConfig, LogFormat, LoggingConfig};
use lakecat_core::{Catalog, CatalogRegistry, LakecatConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit codes for CLI operations.
///
/// Following Unix conventions:
/// - 0: Success
/// - 1-127: Application errors
/// - 128+N: Signal N received (e.g., 130 = SIGINT)
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitCode {
    /// Successful execution
    Success = 0,
    /// Configuration error (invalid config file, missing required fields)
    ConfigError = 1,
    /// Namespace or table does not exist
    NotFound = 2,
    /// Namespace or table already exists
    AlreadyExists = 3,
    /// Rejected change (non-empty namespace, conflicting properties, stale commit)
    Conflict = 4,
    /// Catalog backend or metadata storage failure
    CatalogError = 5,
    /// General runtime error
    RuntimeError = 10,
    /// Signal interrupt (SIGINT = 2, so 128 + 2 = 130)
    SignalInterrupt = 130,
}

impl ExitCode {
    /// Map an error to an exit code from the catalog error it wraps.
    fn from_error(error: &anyhow::Error) -> Self {
        use lakecat_core::Error;

        let Some(catalog_error) = error.chain().find_map(|e| e.downcast_ref::<Error>()) else {
            return if error.chain().any(|e| e.is::<std::io::Error>()) {
                ExitCode::ConfigError
            } else {
                ExitCode::RuntimeError
            };
        };

        match catalog_error {
            Error::Config(_) | Error::CatalogNotFound(_) | Error::InvalidIdentifier(_) => {
                ExitCode::ConfigError
            }
            Error::NoSuchTable(_) | Error::NoSuchNamespace(_) => ExitCode::NotFound,
            Error::TableAlreadyExists(_) | Error::NamespaceAlreadyExists(_) => {
                ExitCode::AlreadyExists
            }
            Error::NamespaceNotEmpty(_)
            | Error::PropertiesConflict { .. }
            | Error::CommitFailed(_) => ExitCode::Conflict,
            Error::Cancelled => ExitCode::SignalInterrupt,
            Error::Transport { .. } | Error::Storage(_) | Error::Serialization(_) => {
                ExitCode::CatalogError
            }
            Error::Io(_) => ExitCode::RuntimeError,
        }
    }
}

mod commands;

#[derive(Parser)]
#[command(name = "lakecat")]
#[command(about = "Inspect and manage Iceberg catalogs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage namespaces
    Namespace {
        #[command(subcommand)]
        action: commands::namespace::NamespaceAction,
    },

    /// Manage tables
    Table {
        #[command(subcommand)]
        action: commands::table::TableAction,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() {
    let exit_code = run_cli().await;
    std::process::exit(exit_code as i32);
}

/// Main CLI execution logic with proper error handling.
async fn run_cli() -> ExitCode {
    let cli = Cli::parse();

    // Logging settings come from the config file when it parses
    let logging = cli
        .config
        .as_ref()
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|content| toml::from_str::<LakecatConfig>(&content).ok())
        .map(|config| config.logging)
        .unwrap_or_default();
    init_logging(&logging, cli.verbose);

    match execute_command(cli).await {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from_error(&e)
        }
    }
}

fn init_logging(logging: &LoggingConfig, verbose: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new(logging.level.as_str()),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so command output stays pipeable
    match logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
    }
}

/// Execute the CLI command.
async fn execute_command(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;

    if let Commands::Validate = cli.command {
        println!(
            "Configuration is valid ({} catalog '{}')",
            config.catalog.catalog_type, config.catalog.name
        );
        return Ok(());
    }

    let ctx = CancellationToken::new();
    let cancel = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling");
            cancel.cancel();
        }
    });

    let catalog = connect(&config.catalog, &ctx).await?;

    match cli.command {
        Commands::Namespace { action } => commands::namespace::run(catalog, &ctx, action).await,
        Commands::Table { action } => commands::table::run(catalog, &ctx, action).await,
        Commands::Validate => Ok(()),
    }
}

/// Build the configured catalog, giving up when `ctx` is cancelled.
async fn connect(config: &CatalogConfig, ctx: &CancellationToken) -> Result<Arc<dyn Catalog>> {
    let registry = CatalogRegistry::with_defaults();
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(lakecat_core::Error::Cancelled.into()),
        catalog = registry.create(config) => Ok(catalog?),
    }
}

fn load_config(path: &Option<PathBuf>) -> Result<LakecatConfig> {
    let path = path.clone().unwrap_or_else(|| PathBuf::from("lakecat.toml"));
    Ok(LakecatConfig::from_file(&path)?)
}
