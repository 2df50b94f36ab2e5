//! 🚀 eslog-cli: the front door.
//!
//! Loads config, sets up logging, and streams stdin to the library one line per log
//! event. Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use eslog::backends::elasticsearch::is_unreachable;
use eslog::{ConfigurationError, LogLevel};
use tokio::io::BufReader;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 📡 Pipe lines in, get log documents in Elasticsearch out.
#[derive(Parser, Debug)]
#[command(name = "eslog", about = "Ship stdin lines to Elasticsearch as log events")]
struct Args {
    /// TOML config file. Used only if it exists; ESLOG_* env vars always apply.
    #[arg(short, long, default_value = "eslog.toml")]
    config: PathBuf,

    /// Level for every event. Overrides the config file.
    #[arg(short, long)]
    level: Option<LogLevel>,

    /// Logger category for every event. Overrides the config file.
    #[arg(long)]
    category: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(err) = run(args).await {
        error!("💀 error: {}", err);
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
        }

        if is_unreachable(&err) {
            error!(
                "🔧 hint: Elasticsearch never answered. Check search_url and connection_timeout_secs, \
                 and that the cluster is actually up (`docker ps` is a good first stop)."
            );
        } else if let Some(config_err) = err.chain().find_map(|c| c.downcast_ref::<ConfigurationError>()) {
            error!(
                "🔧 hint: the [elasticsearch] options were rejected ({config_err}). \
                 Fix them in the TOML file or the ESLOG_ELASTICSEARCH__* env vars."
            );
        }

        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config_file = args
        .config
        .try_exists()
        .with_context(|| {
            format!(
                "💀 Couldn't check whether the config file exists at '{}'. Permissions, maybe?",
                args.config.display()
            )
        })?
        .then_some(args.config.as_path());

    let mut app_config = eslog::app_config::load_config(config_file)
        .context("💀 Couldn't load the configuration. Check the TOML file and the ESLOG_* env vars.")?;

    if let Some(level) = args.level {
        app_config.cli.level = level;
    }
    if let Some(category) = args.category {
        app_config.cli.category = category;
    }

    eslog::run(app_config, BufReader::new(tokio::io::stdin())).await?;
    Ok(())
}
