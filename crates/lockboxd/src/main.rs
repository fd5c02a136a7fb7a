//! lockboxd: encrypted per-user file storage daemon
//!
//! Usage:
//!   lockboxd [--config /etc/lockbox/config.toml] [--log info] [--log-format json|text]

mod daemon;
mod http;
mod metrics;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use lockbox_core::config::LockboxConfig;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "lockboxd", version, about = "Lockbox encrypted file daemon")]
struct Cli {
    /// Path to lockbox config.toml
    #[arg(
        long,
        short = 'c',
        env = "LOCKBOX_CONFIG",
        default_value = "/etc/lockbox/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides daemon.log_level
    #[arg(long, env = "LOCKBOX_LOG")]
    log: Option<String>,

    /// Log format; overrides daemon.log_format
    #[arg(long, env = "LOCKBOX_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Warnings are held until the subscriber exists, or they would be dropped.
    let (config, warnings) = LockboxConfig::read(&cli.config)?;

    let level = cli.log.unwrap_or_else(|| config.daemon.log_level.clone());
    let format = cli.log_format.unwrap_or_else(|| {
        LogFormat::from_str(&config.daemon.log_format, true).unwrap_or(LogFormat::Json)
    });
    init_logging(&level, &format);
    for warning in &warnings {
        warning.emit();
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        config_found = cli.config.exists(),
        "lockboxd starting"
    );

    daemon::run(config).await
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
