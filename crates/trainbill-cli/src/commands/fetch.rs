//! Online commands (fetch, dump)

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use trainbill_core::{fetch_dataset, run, Config, Error, FolderSink, TrainlineClient};

/// Hint printed when the remote rejects the credentials
fn auth_hint(e: &Error) {
    if matches!(e, Error::AuthenticationFailed) {
        println!("   ❌ Trainline rejected the login or password");
        println!("      Check TRAINLINE_LOGIN / TRAINLINE_PASSWORD or config.toml");
    }
}

pub async fn cmd_fetch(config: &Config) -> Result<()> {
    let credentials = config.credentials()?;
    let folder = config.folder()?;

    println!("🚆 Collecting Trainline invoices for {}...", credentials.login);

    let client = TrainlineClient::new(&config.base_url);
    let sink = FolderSink::new(folder, client.http_client().clone());

    let summary = match run(&client, &credentials, &sink, &config.run_options()).await {
        Ok(summary) => summary,
        Err(e) => {
            auth_hint(&e);
            return Err(e).context("Invoice collection failed");
        }
    };

    println!(
        "   Read {} pages, {} proofs → {} invoices",
        summary.pages, summary.proofs, summary.invoices
    );
    println!(
        "   📥 Downloaded: {}  Already present: {}  New in bills.json: {}",
        summary.saved.downloaded, summary.saved.existing, summary.saved.recorded
    );
    if summary.saved.timed_out {
        println!("   ⚠️  Save deadline reached, run again to fetch the rest");
    }
    println!("✅ Invoices saved to {}", folder.display());

    Ok(())
}

pub async fn cmd_dump(config: &Config, output: &Path) -> Result<()> {
    let credentials = config.credentials()?;

    println!("🚆 Reading Trainline history for {}...", credentials.login);

    let client = TrainlineClient::new(&config.base_url);
    let options = config.run_options();
    let dataset = match fetch_dataset(&client, &credentials, &options.pagination).await {
        Ok(dataset) => dataset,
        Err(e) => {
            auth_hint(&e);
            return Err(e).context("Failed to read history");
        }
    };

    let json = serde_json::to_string_pretty(&dataset)?;
    fs::write(output, json).with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "✅ Wrote {} pages ({} pnrs, {} proofs, {} after-sales logs) to {}",
        dataset.pages,
        dataset.pnrs.len(),
        dataset.proofs.len(),
        dataset.after_sales_logs.len(),
        output.display()
    );
    println!();
    println!("Reconcile it offline with: trainbill reconcile --input {}", output.display());

    Ok(())
}
