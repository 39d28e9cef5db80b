//! Run driver: sign in, collect history, reconcile, save

use tracing::info;

use crate::aggregate::aggregate_invoices;
use crate::client::{Credentials, TrainlineClient};
use crate::error::Result;
use crate::models::{Dataset, Invoice};
use crate::pagination::{collect_history, PaginationOptions};
use crate::persist::{InvoiceSink, SaveOptions, SaveSummary};
use crate::reconcile::{build_line_items, ReconcileOptions};

/// Options for a full run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub pagination: PaginationOptions,
    pub reconcile: ReconcileOptions,
    pub save: SaveOptions,
}

/// What a run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages: usize,
    pub proofs: usize,
    pub invoices: usize,
    pub saved: SaveSummary,
}

/// Reconcile a frozen dataset into the final invoice list
pub fn build_invoices(dataset: &Dataset, options: &ReconcileOptions) -> Result<Vec<Invoice>> {
    let items = build_line_items(dataset, options)?;
    Ok(aggregate_invoices(&items))
}

/// Sign in and collect the whole history
pub async fn fetch_dataset(
    client: &TrainlineClient,
    credentials: &Credentials,
    options: &PaginationOptions,
) -> Result<Dataset> {
    let session = client.sign_in(credentials).await?;
    collect_history(&session, options).await
}

/// Full run: nothing reaches the sink unless sign-in, every page fetch and
/// reconciliation succeeded
pub async fn run<S>(
    client: &TrainlineClient,
    credentials: &Credentials,
    sink: &S,
    options: &RunOptions,
) -> Result<RunSummary>
where
    S: InvoiceSink + ?Sized,
{
    let dataset = fetch_dataset(client, credentials, &options.pagination).await?;
    let invoices = build_invoices(&dataset, &options.reconcile)?;
    info!("Built {} invoices", invoices.len());

    let saved = sink.save(&invoices, &options.save).await?;

    Ok(RunSummary {
        pages: dataset.pages,
        proofs: dataset.proofs.len(),
        invoices: invoices.len(),
        saved,
    })
}
