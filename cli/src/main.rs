//! Carrier CLI - inspect and edit persisted ordered carriers.
//!
//! Each invocation opens one carrier from the data directory, runs a single
//! command, and prints one JSON document to stdout. Logs go to stderr.

mod commands;
mod config;
mod error;

use crate::commands::Command;
use crate::config::Config;
use crate::error::Result;
use carrier_engine::{CarrierConfig, FileBackend, OrderedCarrier};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Carrier CLI
#[derive(Parser, Debug)]
#[command(name = "carrier-cli")]
#[command(about = "Inspect and edit persisted ordered carriers")]
#[command(version)]
struct Args {
    /// Directory holding carrier files [env: CARRIER_DATA_DIR]
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Maximum number of entries, 0 for unlimited [env: CARRIER_LIMIT]
    #[arg(short, long)]
    limit: Option<usize>,

    /// Use second instead of millisecond timestamp keys [env: CARRIER_BASED_ON_SECOND]
    #[arg(long)]
    based_on_second: bool,

    /// Carrier name
    name: String,

    #[command(subcommand)]
    command: Command,
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carrier_cli=info,carrier_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match execute(args) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

fn execute(args: Args) -> Result<String> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config =
        Config::from_env()?.with_overrides(args.data_dir, args.limit, args.based_on_second);

    tracing::debug!(
        data_dir = %config.data_dir.display(),
        name = %args.name,
        limit = config.limit,
        "opening carrier"
    );

    let backend = FileBackend::open(&config.data_dir)?;
    let carrier_config = CarrierConfig::new(args.name)
        .with_limit(config.limit)
        .based_on_second(config.based_on_second);
    let mut carrier = OrderedCarrier::open(backend, carrier_config)?;

    let mutation = args.command.is_mutation();
    let output = commands::run(&mut carrier, args.command)?;
    if mutation {
        tracing::info!(
            name = %carrier.name(),
            entries = carrier.len(),
            "carrier updated"
        );
    }
    Ok(output)
}
