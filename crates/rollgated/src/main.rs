//! rollgated — the rollgate daemon.
//!
//! Single binary that assembles the release service:
//! - Release store (redb)
//! - Object store (filesystem directory or in-memory)
//! - Release engine with its metadata cache
//! - REST API
//!
//! # Usage
//!
//! ```text
//! rollgated serve --config /etc/rollgate/rollgate.toml --port 8080
//! rollgated default-config > rollgate.toml
//! ```

mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use rollgate_core::RollgateConfig;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,rollgated=debug,rollgate=debug";

#[derive(Parser)]
#[command(name = "rollgated", about = "rollgate release daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Serve release decisions over HTTP.
    Serve {
        /// Path to rollgate.toml. Built-in defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides `server.port`).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for the release store (overrides `server.data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Print the default configuration as TOML.
    DefaultConfig,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Serve {
            config,
            port,
            data_dir,
        } => {
            let mut config = match config {
                Some(path) => RollgateConfig::from_file(&path)?,
                None => RollgateConfig::default(),
            };
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir;
            }
            config.validate()?;
            serve::run(config).await
        }
        Command::DefaultConfig => {
            print!("{}", RollgateConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}
