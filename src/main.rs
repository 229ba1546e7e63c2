use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use portal_sync::store::EntityFilter;

mod cli;

#[derive(Parser)]
#[command(name = "portal-sync")]
#[command(about = "Reconcile CRM properties and agents with the listing portal")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.portal-sync/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Load properties and agents from a CRM export (JSON) into the local store
    Import {
        /// Export file
        file: PathBuf,
    },

    /// Run one sync and print the summary (Ctrl-C cancels after in-flight entities)
    Run {
        /// Entity types to sync: properties, agents or all
        #[arg(long = "type", default_value = "all")]
        entity_type: EntityFilter,

        /// Only sync these local ids (repeatable)
        #[arg(long = "id")]
        ids: Vec<String>,

        /// Resend unchanged entities and repeat deactivations
        #[arg(long)]
        force: bool,

        /// Entities processed in parallel (overrides [sync] workers)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Serve the HTTP sync trigger
    Serve {
        /// Port to listen on (overrides [server] port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show entity counts and recent sync runs
    Status {
        /// Number of runs to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { force } => {
            cli::init::init_command(config_path, force)?;
        }
        Commands::Import { file } => {
            cli::import::import_command(config_path, &file)?;
        }
        Commands::Run {
            entity_type,
            ids,
            force,
            concurrency,
        } => {
            let settings = cli::run::RunSettings {
                entity_type,
                ids,
                force,
                concurrency,
            };
            cli::run::run_command(config_path, settings).await?;
        }
        Commands::Serve { port } => {
            cli::serve::serve_command(config_path, port).await?;
        }
        Commands::Status { limit } => {
            cli::status::status_command(config_path, limit)?;
        }
    }

    Ok(())
}
