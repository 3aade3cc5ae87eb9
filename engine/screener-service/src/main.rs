//! # Screener Binary
//!
//! Command-line interface for recording companies and ranking them by
//! undervaluation.

use anyhow::{Context, Result};
use clap::Parser;
use company_store::CompanyStore;
use screener_service::{initialize_logging, load_config, Cli, CliHandler};
use tracing::info;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Layer configuration: file, environment, then flags
    let mut config = load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    initialize_logging(&config.logging)?;
    info!("Starting screener v{}", env!("CARGO_PKG_VERSION"));

    let store = CompanyStore::open_json(&config.store)
        .with_context(|| format!("Failed to open company store {:?}", config.store.data_file))?;

    // Handle command
    let mut handler = CliHandler::new(store, config);
    let output = handler.handle_command(cli.command)?;
    println!("{output}");

    Ok(())
}
