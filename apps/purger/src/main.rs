//! Purges Log Analytics table data older than its configured retention.

#![forbid(unsafe_code)]

mod purge_runner;
mod purger_config;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use crate::purger_config::{PurgerConfig, parse_log_level};

/// Command line interface of the purger.
#[derive(Debug, Parser)]
#[command(name = "sentinel-purger", version, about)]
struct Cli {
    /// The YAML configuration file.
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = PurgerConfig::load(cli.config.as_path());
    let configured_level = config.as_ref().ok().map(|config| config.log_level.as_str());
    let level = configured_level.and_then(parse_log_level);
    init_tracing(level.unwrap_or(Level::INFO));

    if let (Some(raw_level), None) = (configured_level, level) {
        error!(level = %raw_level, "invalid log level provided, falling back to info");
    }

    let config = match config {
        Ok(config) => config,
        Err(error) => {
            error!(
                config = %cli.config.display(),
                error = %error,
                "failed to load configuration"
            );
            return ExitCode::FAILURE;
        }
    };

    match purge_runner::run(&config, Utc::now()).await {
        Ok(summary) => {
            info!(tables = summary.purged_tables(), "finished purging");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!(error = %error, "failed to purge logs");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: Level) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
