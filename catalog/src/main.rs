use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use quarry_catalog::config;

/// Quarry catalog maintenance.
#[derive(Debug, Parser)]
#[clap(version)]
#[clap(propagate_version = true)]
struct Opts {
    /// Path to the config file.
    #[clap(short = 'f', long)]
    config: Option<PathBuf>,

    /// Mode to run.
    #[clap(long, default_value = "check-config")]
    mode: Mode,

    /// Whether to log in JSON.
    #[clap(long)]
    json_logs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Run the database migrations then exit.
    DbMigrations,

    /// Check the configuration then exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Opts::parse();

    init_logging(opts.json_logs);
    dump_version();

    let config = config::load_config(opts.config.as_deref())?;

    match opts.mode {
        Mode::DbMigrations => {
            quarry_catalog::run_migrations(config).await?;
        }
        Mode::CheckConfig => {
            tracing::info!("Configuration is valid");
        }
    }

    Ok(())
}

fn init_logging(json: bool) {
    let env_filter = EnvFilter::from_default_env();

    let (plain_layer, json_layer) = if json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(plain_layer)
        .with(json_layer)
        .with(ErrorLayer::default())
        .init();
}

fn dump_version() {
    #[cfg(debug_assertions)]
    eprintln!("Quarry Catalog {} (debug)", env!("CARGO_PKG_VERSION"));

    #[cfg(not(debug_assertions))]
    eprintln!("Quarry Catalog {} (release)", env!("CARGO_PKG_VERSION"));
}
