//! Invoice persistence
//!
//! - `InvoiceSink` trait: where a run hands its final invoice list
//! - `FolderSink`: downloads each invoice PDF into a local folder and keeps a
//!   `bills.json` manifest next to the files
//!
//! A PDF whose file name already exists in the folder is not downloaded
//! again. Manifest entries are identified by vendor, file URL, date and
//! amount.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{Invoice, VENDOR};

/// Manifest file kept in the destination folder
pub const MANIFEST_FILE: &str = "bills.json";

/// Options for a save
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Vendor whose manifest entries are considered for deduplication
    pub identifiers: String,
    /// Overall deadline for the save
    pub timeout: Duration,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            identifiers: VENDOR.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Outcome of a save
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveSummary {
    /// Files downloaded
    pub downloaded: usize,
    /// Files already present
    pub existing: usize,
    /// Entries appended to the manifest
    pub recorded: usize,
    /// The deadline hit before every invoice was handled
    pub timed_out: bool,
}

/// Destination for the final invoice list
#[async_trait]
pub trait InvoiceSink: Send + Sync {
    async fn save(&self, invoices: &[Invoice], options: &SaveOptions) -> Result<SaveSummary>;
}

/// Local folder destination
pub struct FolderSink {
    folder: PathBuf,
    http_client: Client,
}

impl FolderSink {
    pub fn new(folder: impl Into<PathBuf>, http_client: Client) -> Self {
        Self {
            folder: folder.into(),
            http_client,
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Append invoices not already listed in the manifest
    async fn record(&self, invoices: &[&Invoice], identifiers: &str) -> Result<usize> {
        let folder = self.folder.clone();
        let invoices: Vec<Invoice> = invoices.iter().map(|invoice| (*invoice).clone()).collect();
        let identifiers = identifiers.to_string();

        tokio::task::spawn_blocking(move || merge_manifest(&folder, &invoices, &identifiers))
            .await
            .map_err(|e| Error::Persist(format!("Manifest update task failed: {}", e)))?
    }
}

/// Merge invoices into `folder/bills.json`, rewriting it atomically
fn merge_manifest(folder: &Path, invoices: &[Invoice], identifiers: &str) -> Result<usize> {
    let path = folder.join(MANIFEST_FILE);
    let mut manifest: Vec<Invoice> = if path.exists() {
        serde_json::from_str(&fs::read_to_string(&path)?)?
    } else {
        Vec::new()
    };

    let before = manifest.len();
    for invoice in invoices {
        let known = manifest
            .iter()
            .filter(|entry| entry.vendor == identifiers)
            .any(|entry| same_bill(entry, invoice));
        if !known {
            manifest.push(invoice.clone());
        }
    }
    let recorded = manifest.len() - before;
    if recorded == 0 {
        return Ok(0);
    }

    let mut tmp = tempfile::NamedTempFile::new_in(folder)?;
    tmp.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())?;
    tmp.persist(&path)
        .map_err(|e| Error::Persist(format!("Failed to write {}: {}", path.display(), e)))?;

    Ok(recorded)
}

fn same_bill(a: &Invoice, b: &Invoice) -> bool {
    a.vendor == b.vendor && a.file_url == b.file_url && a.date == b.date && a.amount == b.amount
}

#[async_trait]
impl InvoiceSink for FolderSink {
    async fn save(&self, invoices: &[Invoice], options: &SaveOptions) -> Result<SaveSummary> {
        tokio::fs::create_dir_all(&self.folder).await.map_err(|e| {
            Error::Persist(format!(
                "Failed to create folder {}: {}",
                self.folder.display(),
                e
            ))
        })?;

        let deadline = Instant::now() + options.timeout;
        let mut summary = SaveSummary::default();
        let mut handled = Vec::with_capacity(invoices.len());

        for invoice in invoices {
            let path = self.folder.join(&invoice.file_name);
            if tokio::fs::try_exists(&path).await? {
                debug!("{} already exists, not downloading", path.display());
                summary.existing += 1;
                handled.push(invoice);
                continue;
            }

            let bytes = match tokio::time::timeout_at(deadline, self.download(&invoice.file_url)).await
            {
                Ok(bytes) => bytes?,
                Err(_) => {
                    warn!(
                        "Save deadline reached after {} of {} invoices",
                        handled.len(),
                        invoices.len()
                    );
                    summary.timed_out = true;
                    break;
                }
            };
            tokio::fs::write(&path, bytes).await?;
            debug!("Saved {}", path.display());
            summary.downloaded += 1;
            handled.push(invoice);
        }

        summary.recorded = self.record(&handled, &options.identifiers).await?;

        info!(
            "Saved invoices to {}: {} downloaded, {} already present, {} new manifest entries",
            self.folder.display(),
            summary.downloaded,
            summary.existing,
            summary.recorded
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DOCUMENT_TYPE;
    use crate::test_utils::MockTrainlineServer;
    use chrono::NaiveDate;

    fn invoice(url: String, file_name: &str, amount: f64) -> Invoice {
        Invoice {
            amount,
            file_url: url,
            date: NaiveDate::from_ymd_opt(2023, 1, 15).unwrap(),
            document_type: DOCUMENT_TYPE.into(),
            vendor: VENDOR.into(),
            file_name: file_name.into(),
            is_refund: None,
        }
    }

    #[tokio::test]
    async fn test_save_downloads_and_records() {
        let server = MockTrainlineServer::start(vec![]).await;
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("trainline");
        let sink = FolderSink::new(&folder, Client::new());

        let invoices = vec![invoice(server.file_url("a"), "2023_01_Trainline.pdf", 50.0)];
        let summary = sink.save(&invoices, &SaveOptions::default()).await.unwrap();

        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.recorded, 1);
        assert!(!summary.timed_out);

        let pdf = fs::read_to_string(folder.join("2023_01_Trainline.pdf")).unwrap();
        assert!(pdf.starts_with("%PDF"));

        let manifest: Vec<Invoice> =
            serde_json::from_str(&fs::read_to_string(folder.join(MANIFEST_FILE)).unwrap()).unwrap();
        assert_eq!(manifest, invoices);
    }

    #[tokio::test]
    async fn test_save_twice_is_idempotent() {
        let server = MockTrainlineServer::start(vec![]).await;
        let dir = tempfile::tempdir().unwrap();
        let sink = FolderSink::new(dir.path(), Client::new());

        let invoices = vec![invoice(server.file_url("a"), "2023_01_Trainline.pdf", 50.0)];
        sink.save(&invoices, &SaveOptions::default()).await.unwrap();
        let second = sink.save(&invoices, &SaveOptions::default()).await.unwrap();

        assert_eq!(second.downloaded, 0);
        assert_eq!(second.existing, 1);
        assert_eq!(second.recorded, 0);
    }

    #[tokio::test]
    async fn test_existing_manifest_merged() {
        let server = MockTrainlineServer::start(vec![]).await;
        let dir = tempfile::tempdir().unwrap();
        let mut other = invoice("https://example.test/other.pdf".into(), "other.pdf", 9.0);
        other.vendor = "Other".into();
        let known = invoice(server.file_url("a"), "2023_01_Trainline.pdf", 50.0);
        fs::write(
            dir.path().join(MANIFEST_FILE),
            serde_json::to_string(&vec![other.clone(), known.clone()]).unwrap(),
        )
        .unwrap();
        let sink = FolderSink::new(dir.path(), Client::new());

        let fresh = invoice(server.file_url("b"), "2023_02_Trainline.pdf", 20.0);
        let summary = sink
            .save(&[known.clone(), fresh.clone()], &SaveOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.recorded, 1);
        let manifest: Vec<Invoice> =
            serde_json::from_str(&fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap()).unwrap();
        assert_eq!(manifest, vec![other, known, fresh]);
    }

    #[tokio::test]
    async fn test_same_month_file_name_kept_once() {
        let server = MockTrainlineServer::start(vec![]).await;
        let dir = tempfile::tempdir().unwrap();
        let sink = FolderSink::new(dir.path(), Client::new());

        let invoices = vec![
            invoice(server.file_url("a"), "2023_01_Trainline.pdf", 50.0),
            invoice(server.file_url("b"), "2023_01_Trainline.pdf", 20.0),
        ];
        let summary = sink.save(&invoices, &SaveOptions::default()).await.unwrap();

        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.existing, 1);
        assert_eq!(summary.recorded, 2);
        let pdf = fs::read_to_string(dir.path().join("2023_01_Trainline.pdf")).unwrap();
        assert!(pdf.ends_with(" a"));
    }

    #[tokio::test]
    async fn test_download_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FolderSink::new(dir.path(), Client::new());
        let server = MockTrainlineServer::start(vec![]).await;

        let invoices = vec![invoice(
            format!("{}missing/file.pdf", server.url()),
            "2023_01_Trainline.pdf",
            50.0,
        )];
        let result = sink.save(&invoices, &SaveOptions::default()).await;
        assert!(matches!(result, Err(Error::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_zero_timeout_saves_nothing() {
        let server = MockTrainlineServer::start(vec![]).await;
        let dir = tempfile::tempdir().unwrap();
        let sink = FolderSink::new(dir.path(), Client::new());

        let invoices = vec![invoice(server.file_url("a"), "2023_01_Trainline.pdf", 50.0)];
        let options = SaveOptions {
            timeout: Duration::ZERO,
            ..Default::default()
        };
        let summary = sink.save(&invoices, &options).await.unwrap();

        assert!(summary.timed_out);
        assert_eq!(summary.downloaded, 0);
        assert!(!dir.path().join(MANIFEST_FILE).exists());
    }
}
