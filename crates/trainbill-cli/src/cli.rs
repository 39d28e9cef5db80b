//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// trainbill - Collect Trainline invoices
#[derive(Parser)]
#[command(name = "trainbill")]
#[command(about = "Collect and reconcile Trainline invoices", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file path
    ///
    /// Defaults to trainbill/config.toml under the user config directory.
    /// TRAINLINE_LOGIN, TRAINLINE_PASSWORD, TRAINBILL_FOLDER and
    /// TRAINLINE_BASE_URL override the file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in, collect the history and save invoices to a folder
    Fetch {
        /// Destination folder (overrides config)
        #[arg(short, long)]
        folder: Option<PathBuf>,

        /// Account email (overrides config)
        #[arg(short, long)]
        login: Option<String>,

        /// Fail on refund proofs without a matching after-sales log
        #[arg(long)]
        strict_refunds: bool,

        /// Maximum number of history pages to fetch
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Sign in, collect the history and write it as JSON
    Dump {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Maximum number of history pages to fetch
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Compute invoices from a history dump, offline
    Reconcile {
        /// Dump written by `trainbill dump`
        #[arg(short, long)]
        input: PathBuf,

        /// Print invoices as JSON
        #[arg(long)]
        json: bool,

        /// Fail on refund proofs without a matching after-sales log
        #[arg(long)]
        strict_refunds: bool,
    },
}
