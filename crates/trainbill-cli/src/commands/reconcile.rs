//! Offline reconciliation of a history dump

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use trainbill_core::{build_invoices, Dataset, Invoice, ReconcileOptions};

use super::truncate;

/// Read a dump written by `trainbill dump` and build its invoices
pub fn load_invoices(input: &Path, strict_refunds: bool) -> Result<Vec<Invoice>> {
    let contents = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let dataset: Dataset = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a trainbill dump", input.display()))?;

    let options = ReconcileOptions { strict_refunds };
    build_invoices(&dataset, &options).context("Reconciliation failed")
}

pub fn cmd_reconcile(input: &Path, json: bool, strict_refunds: bool) -> Result<()> {
    let invoices = load_invoices(input, strict_refunds)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&invoices)?);
        return Ok(());
    }

    if invoices.is_empty() {
        println!("No invoices in {}", input.display());
        return Ok(());
    }

    println!();
    println!("🧾 Trainline Invoices");
    println!("   ─────────────────────────────────────────────────────────────");

    let mut total = 0.0;
    for invoice in &invoices {
        let marker = if invoice.is_refund == Some(true) {
            "↩"
        } else {
            " "
        };
        println!(
            "   {} {} │ {:>9.2} │ {:22} │ {}",
            marker,
            invoice.date.format("%Y-%m-%d"),
            invoice.amount,
            invoice.file_name,
            truncate(&invoice.file_url, 40)
        );
        total += invoice.amount;
    }

    println!("   ─────────────────────────────────────────────────────────────");
    println!("   {} invoices, total {:.2}", invoices.len(), total);
    println!();

    Ok(())
}
