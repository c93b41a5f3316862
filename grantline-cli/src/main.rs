use anyhow::{Context, Result};
use clap::Parser;
use grantline_core::config::Config;
use grantline_core::logging::{init_logging_with_config, LogConfig};
use grantline_core::ops::AllowAll;
use grantline_core::Engine;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};

mod commands;
mod render;

use commands::{dispatch, Command};
use render::PrintSink;

#[derive(Parser, Debug)]
#[command(name = "grantline")]
#[command(author, version, about = "Manage users, groups and tracks", long_about = None)]
struct Args {
    /// Directory holding the stored records
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::from_env()?,
    };
    if let Some(dir) = &args.data_dir {
        config.store.data_dir = dir.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging_with_config(LogConfig::try_from(&config.logging)?)?;
    grantline_core::metrics::init_metrics();

    debug!(data_dir = %config.store.data_dir.display(), backend = %config.store.backend, "Configuration loaded");

    let engine = Engine::from_config(config).await?;
    let ops = engine.operations(Arc::new(AllowAll), Arc::new(PrintSink));

    let result = dispatch(&engine, &ops, args.command).await;
    engine.shutdown().await;
    let result = result?;

    info!(result = ?result, "Command finished");
    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
