//! Domain models for trainbill
//!
//! The record types mirror the `api/v5_1/pnrs` payload:
//! - `pnrs`: bookings (`Pnr`)
//! - `proofs`: downloadable invoices and credit notes (`Proof`)
//! - `after_sales_logs`: refunds, exchanges and penalties (`AfterSalesLog`)
//! - `folders`: carried along untouched
//!
//! `LineItem` and `Invoice` are derived by the reconciliation pipeline.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Settlement system assumed when a pnr does not carry one
pub const DEFAULT_SYSTEM: &str = "sncf";

/// Vendor name written on every invoice, also used as the persistence identifier
pub const VENDOR: &str = "Trainline";

/// Document type written on every invoice
pub const DOCUMENT_TYPE: &str = "transport";

/// Treat an explicit JSON `null` the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Read a table record by record, skipping the ones that do not parse
///
/// `null` or missing tables read as empty.
fn lenient_records<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|value| {
            let id = match value.get("id") {
                Some(Value::String(id)) => id.clone(),
                Some(other) => other.to_string(),
                None => "<no id>".to_string(),
            };
            match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed record {}: {}", id, e);
                    None
                }
            }
        })
        .collect())
}

/// A booking (passenger name record)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pnr {
    pub id: String,
    pub sort_date: DateTime<FixedOffset>,
    /// Settlement system (rail operator); absent on some accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub after_sales_log_ids: Vec<String>,
    /// Back-links to proofs. Kept as raw JSON because some accounts omit it
    /// or send something that is not a list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_ids: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cents: i64,
}

impl Pnr {
    /// The proof back-links, if present and shaped as a list
    pub fn proof_links(&self) -> Option<&[Value]> {
        match &self.proof_ids {
            Some(Value::Array(ids)) => Some(ids),
            _ => None,
        }
    }

    /// Whether this pnr back-links to the given proof
    ///
    /// `None` when the back-links cannot be evaluated.
    pub fn links_to(&self, proof_id: &str) -> Option<bool> {
        self.proof_links()
            .map(|ids| ids.iter().any(|id| id.as_str() == Some(proof_id)))
    }

    /// Settlement system with the default applied
    pub fn system_or_default(&self) -> &str {
        self.system.as_deref().unwrap_or(DEFAULT_SYSTEM)
    }
}

/// Kind of document a proof represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofKind {
    Purchase,
    Refund,
}

impl ProofKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Refund => "refund",
        }
    }
}

impl std::fmt::Display for ProofKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A billable document (invoice or credit note)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proof {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    #[serde(rename = "type")]
    pub kind: ProofKind,
    /// Weak link to a single pnr, used when pnrs lack back-links
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnr_id: Option<String>,
}

impl Proof {
    /// Download URL, if the proof can be filed at all
    pub fn billable_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.is_empty())
    }
}

/// A refund, exchange or penalty applied to one or more pnrs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AfterSalesLog {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub added_cents: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub refunded_cents: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub penalty_cents: i64,
    pub date: DateTime<FixedOffset>,
}

impl AfterSalesLog {
    /// Money coming back to the customer, net of extra charges
    pub fn net_refund_cents(&self) -> i64 {
        self.refunded_cents - self.added_cents
    }
}

/// Travel folder, accumulated but never reconciled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

/// One page of the pnrs endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default, deserialize_with = "lenient_records")]
    pub pnrs: Vec<Pnr>,
    #[serde(default, deserialize_with = "lenient_records")]
    pub proofs: Vec<Proof>,
    #[serde(default, deserialize_with = "lenient_records")]
    pub after_sales_logs: Vec<AfterSalesLog>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub folders: Vec<Folder>,
}

impl Page {
    /// An empty or absent proof list means there is no older history
    pub fn has_proofs(&self) -> bool {
        !self.proofs.is_empty()
    }
}

/// Every record gathered across pages, in fetch order
///
/// Duplicates from overlapping pages are kept; reconciliation absorbs them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub pnrs: Vec<Pnr>,
    #[serde(default)]
    pub proofs: Vec<Proof>,
    #[serde(default)]
    pub after_sales_logs: Vec<AfterSalesLog>,
    #[serde(default)]
    pub folders: Vec<Folder>,
    /// Number of pages absorbed
    #[serde(default)]
    pub pages: usize,
}

/// Amount owed for one (proof, system) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub url: String,
    pub system: String,
    pub amount_cents: i64,
    /// Proof creation date, time of day dropped
    pub date: NaiveDate,
    pub is_refund: bool,
}

/// A file-ready bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Amount in currency units
    pub amount: f64,
    #[serde(rename = "fileurl")]
    pub file_url: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub document_type: String,
    pub vendor: String,
    #[serde(rename = "filename")]
    pub file_name: String,
    #[serde(rename = "isRefund", default, skip_serializing_if = "Option::is_none")]
    pub is_refund: Option<bool>,
}
