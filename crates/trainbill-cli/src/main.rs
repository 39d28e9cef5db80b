//! trainbill CLI - Trainline invoice collector
//!
//! Usage:
//!   trainbill fetch --folder DIR          Collect and save invoices
//!   trainbill dump --output FILE          Save the raw booking history
//!   trainbill reconcile --input FILE      Compute invoices from a dump

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Fetch {
            folder,
            login,
            strict_refunds,
            max_pages,
        } => {
            let mut config = commands::load_config(cli.config.as_deref())?;
            commands::apply_overrides(&mut config, folder, login, strict_refunds, max_pages);
            commands::cmd_fetch(&config).await
        }
        Commands::Dump { output, max_pages } => {
            let mut config = commands::load_config(cli.config.as_deref())?;
            commands::apply_overrides(&mut config, None, None, false, max_pages);
            commands::cmd_dump(&config, &output).await
        }
        Commands::Reconcile {
            input,
            json,
            strict_refunds,
        } => commands::cmd_reconcile(&input, json, strict_refunds),
    }
}
