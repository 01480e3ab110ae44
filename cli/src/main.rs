mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lazyweights_core::Config;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "lazyweights")]
#[command(
    author,
    version,
    about = "Start weight downloads early, wait for them later",
    long_about = None
)]
struct Cli {
    /// Config file (default: ~/.config/lazyweights/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start background downloads and return immediately
    Launch {
        /// Target file names (e.g., "weights.bin")
        names: Vec<PathBuf>,

        /// Manifest of `<url> <dest>` or `<dest>` lines
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// Block until files exist
    Wait {
        /// Target file names
        #[arg(required = true)]
        names: Vec<PathBuf>,

        /// Give up after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Launch downloads and wait for all of them
    Fetch {
        /// Target file names
        #[arg(required = true)]
        names: Vec<PathBuf>,
    },

    /// Show whether files are present, downloading or absent
    #[command(alias = "st")]
    Status {
        /// Target file names
        #[arg(required = true)]
        names: Vec<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// View or set configuration
    Config {
        /// Config key (e.g., "source.base_url", "wait.poll_interval_ms")
        key: Option<String>,

        /// Value to set (if omitted, shows current value)
        value: Option<String>,
    },
}

fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::config_path(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = config_path(cli.config.as_deref())?;
    let config = Config::load_from(&config_path)?;

    match cli.command {
        Commands::Launch { names, manifest } => {
            commands::launch::execute(&config, &names, manifest.as_deref()).await?;
        }
        Commands::Wait { names, timeout } => {
            commands::wait::execute(&config, &names, timeout).await?;
        }
        Commands::Fetch { names } => {
            commands::fetch::execute(&config, names).await?;
        }
        Commands::Status { names, json } => {
            commands::status::execute(&config, &names, json).await?;
        }
        Commands::Config { key, value } => {
            commands::config::execute(&config_path, config, key.as_deref(), value.as_deref())
                .await?;
        }
    }

    Ok(())
}
