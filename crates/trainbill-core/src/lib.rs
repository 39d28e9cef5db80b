//! trainbill Core Library
//!
//! Collects Trainline invoices:
//! - HTTP client for sign-in and the paged pnrs history
//! - Pagination cursor and page accumulation
//! - Proof to pnr link resolution with `pnr_id` fallback
//! - Amount reconciliation against after-sales logs
//! - Aggregation into one invoice per (document, settlement system)
//! - Local folder persistence with a `bills.json` manifest

pub mod aggregate;
pub mod client;
pub mod config;
pub mod error;
pub mod konnector;
pub mod linking;
pub mod models;
pub mod pagination;
pub mod persist;
pub mod reconcile;

/// Test utilities including mock Trainline server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregate::{aggregate_invoices, file_name};
pub use client::{Credentials, Session, TrainlineClient};
pub use config::Config;
pub use error::{Error, Result};
pub use konnector::{build_invoices, fetch_dataset, run, RunOptions, RunSummary};
pub use models::{AfterSalesLog, Dataset, Invoice, LineItem, Page, Pnr, Proof, ProofKind};
pub use pagination::{collect_history, next_cursor, PageSource, PaginationOptions};
pub use persist::{FolderSink, InvoiceSink, SaveOptions, SaveSummary};
pub use reconcile::{build_line_items, ReconcileOptions};
