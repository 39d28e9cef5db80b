//! Amount reconciliation
//!
//! Turns every billable proof into one line item per settlement system.
//!
//! For a purchase proof the amount nets the pnr prices against their
//! after-sales logs:
//!
//! ```text
//! sum(pnr.cents) + sum(log.refunded - log.added) + sum(log.penalty)
//! ```
//!
//! A refund proof is priced by the single after-sales log emitted at the same
//! instant as the proof: `log.refunded - log.added`.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::linking::{group_by_system, resolve_links, SystemGroup};
use crate::models::{AfterSalesLog, Dataset, LineItem, Proof, ProofKind};

/// Reconciliation behaviour switches
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Abort on a refund proof without a matching after-sales log instead of
    /// skipping it
    pub strict_refunds: bool,
}

/// After-sales logs referenced by the pnrs of a group
///
/// Ids referenced by several pnrs are counted once; unknown ids are skipped.
fn referenced_logs<'a>(group: &SystemGroup<'_>, logs: &'a [AfterSalesLog]) -> Vec<&'a AfterSalesLog> {
    let mut seen = HashSet::new();
    group
        .pnrs
        .iter()
        .flat_map(|pnr| pnr.after_sales_log_ids.iter())
        .filter(|id| seen.insert(id.as_str()))
        .filter_map(|id| {
            let log = logs.iter().find(|log| &log.id == id);
            if log.is_none() {
                debug!("After-sales log {} not found, ignoring", id);
            }
            log
        })
        .collect()
}

/// Compute the line item for one (proof, system) unit
pub fn reconcile_group(
    proof: &Proof,
    url: &str,
    group: &SystemGroup<'_>,
    logs: &[AfterSalesLog],
) -> Result<LineItem> {
    let adjustments = referenced_logs(group, logs);

    let (amount_cents, is_refund) = match proof.kind {
        ProofKind::Purchase => {
            let paid: i64 = group.pnrs.iter().map(|pnr| pnr.cents).sum();
            let refunded: i64 = adjustments.iter().map(|log| log.net_refund_cents()).sum();
            let penalties: i64 = adjustments.iter().map(|log| log.penalty_cents).sum();
            (paid + refunded + penalties, false)
        }
        ProofKind::Refund => {
            let mut matches = adjustments
                .iter()
                .filter(|log| log.date == proof.created_at);
            let log = matches.next().ok_or_else(|| Error::UnresolvedRefundAmount {
                proof_id: proof.id.clone(),
                created_at: proof.created_at.to_rfc3339(),
            })?;
            if matches.next().is_some() {
                warn!(
                    "Several after-sales logs match refund proof {}, using {}",
                    proof.id, log.id
                );
            }
            (log.net_refund_cents(), true)
        }
    };

    Ok(LineItem {
        url: url.to_string(),
        system: group.system.to_string(),
        amount_cents,
        date: proof.created_at.date_naive(),
        is_refund,
    })
}

/// Reconcile every billable proof of the dataset
///
/// Proofs without a URL are skipped, and each proof id is handled once even
/// when overlapping pages repeated it.
pub fn build_line_items(dataset: &Dataset, options: &ReconcileOptions) -> Result<Vec<LineItem>> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut items = Vec::new();
    let mut skipped = 0usize;

    for proof in &dataset.proofs {
        let Some(url) = proof.billable_url() else {
            debug!("Proof {} has no URL, skipping", proof.id);
            continue;
        };
        if !seen.insert(proof.id.as_str()) {
            continue;
        }

        let links = resolve_links(proof, &dataset.pnrs);
        for group in group_by_system(&links.pnrs) {
            match reconcile_group(proof, url, &group, &dataset.after_sales_logs) {
                Ok(item) => items.push(item),
                Err(e @ Error::UnresolvedRefundAmount { .. }) if !options.strict_refunds => {
                    warn!("Skipping {} line of proof {}: {}", group.system, proof.id, e);
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    info!(
        "Reconciled {} proofs into {} line items ({} skipped)",
        seen.len(),
        items.len(),
        skipped
    );
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{log_json, page_json, pnr_json, proof_json};
    use chrono::NaiveDate;
    use serde_json::json;

    fn dataset(value: serde_json::Value) -> Dataset {
        let mut dataset = Dataset::default();
        dataset.absorb(serde_json::from_value(value).unwrap());
        dataset
    }

    fn pnr(id: &str, cents: i64, proof_ids: &[&str], logs: &[&str]) -> serde_json::Value {
        let mut value = pnr_json(id, "2023-01-10T10:00:00+01:00", cents);
        value["proof_ids"] = json!(proof_ids);
        value["after_sales_log_ids"] = json!(logs);
        value
    }

    #[test]
    fn test_purchase_without_adjustments_is_conserved() {
        let data = dataset(page_json(
            vec![pnr("a", 3000, &["proof-1"], &[]), pnr("b", 2000, &["proof-1"], &[])],
            vec![proof_json("proof-1", "2023-01-10T10:00:00+01:00", "purchase")],
            vec![],
        ));

        let items = build_line_items(&data, &ReconcileOptions::default()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].amount_cents, 5000);
        assert!(!items[0].is_refund);
    }

    #[test]
    fn test_purchase_refund_netting() {
        let data = dataset(page_json(
            vec![pnr("a", 10000, &["proof-1"], &["log-1"])],
            vec![proof_json("proof-1", "2023-01-10T10:00:00+01:00", "purchase")],
            vec![log_json("log-1", 500, 3000, 200, "2023-01-12T10:00:00+01:00")],
        ));

        let items = build_line_items(&data, &ReconcileOptions::default()).unwrap();
        assert_eq!(items[0].amount_cents, 12700);
    }

    #[test]
    fn test_shared_log_counted_once_and_unknown_ignored() {
        let data = dataset(page_json(
            vec![
                pnr("a", 1000, &["proof-1"], &["log-1", "missing"]),
                pnr("b", 1000, &["proof-1"], &["log-1"]),
            ],
            vec![proof_json("proof-1", "2023-01-10T10:00:00+01:00", "purchase")],
            vec![log_json("log-1", 0, 500, 0, "2023-01-12T10:00:00+01:00")],
        ));

        let items = build_line_items(&data, &ReconcileOptions::default()).unwrap();
        assert_eq!(items[0].amount_cents, 2500);
    }

    #[test]
    fn test_refund_matches_log_by_instant() {
        let data = dataset(page_json(
            vec![pnr("a", 10000, &["proof-1", "proof-2"], &["log-1", "log-2"])],
            vec![
                proof_json("proof-1", "2023-01-10T10:00:00+01:00", "purchase"),
                // Same instant as log-2, written with another offset
                proof_json("proof-2", "2023-02-03T17:45:12+01:00", "refund"),
            ],
            vec![
                log_json("log-1", 0, 1000, 0, "2023-01-20T10:00:00+01:00"),
                log_json("log-2", 300, 4300, 0, "2023-02-03T16:45:12+00:00"),
            ],
        ));

        let items = build_line_items(&data, &ReconcileOptions::default()).unwrap();
        assert_eq!(items.len(), 2);
        let refund = &items[1];
        assert!(refund.is_refund);
        assert_eq!(refund.amount_cents, 4000);
        assert_eq!(refund.date, NaiveDate::from_ymd_opt(2023, 2, 3).unwrap());
    }

    #[test]
    fn test_refund_with_several_matching_logs_uses_first_reference() {
        let data = dataset(page_json(
            vec![pnr("a", 10000, &["proof-1"], &["log-2", "log-1"])],
            vec![proof_json("proof-1", "2023-02-03T17:45:12+01:00", "refund")],
            vec![
                log_json("log-1", 0, 1000, 0, "2023-02-03T17:45:12+01:00"),
                log_json("log-2", 0, 2500, 0, "2023-02-03T17:45:12+01:00"),
            ],
        ));

        let items = build_line_items(&data, &ReconcileOptions::default()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].amount_cents, 2500);
        assert!(items[0].is_refund);
    }

    #[test]
    fn test_unresolved_refund_skipped_by_default() {
        let data = dataset(page_json(
            vec![pnr("a", 10000, &["proof-1"], &["log-1"])],
            vec![proof_json("proof-1", "2023-02-03T17:45:12+01:00", "refund")],
            vec![log_json("log-1", 0, 1000, 0, "2023-02-03T17:45:13+01:00")],
        ));

        let items = build_line_items(&data, &ReconcileOptions::default()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_unresolved_refund_strict() {
        let data = dataset(page_json(
            vec![pnr("a", 10000, &["proof-1"], &[])],
            vec![proof_json("proof-1", "2023-02-03T17:45:12+01:00", "refund")],
            vec![],
        ));

        let result = build_line_items(
            &data,
            &ReconcileOptions {
                strict_refunds: true,
            },
        );
        assert!(matches!(
            result,
            Err(Error::UnresolvedRefundAmount { ref proof_id, .. }) if proof_id == "proof-1"
        ));
    }

    #[test]
    fn test_one_line_per_system() {
        let mut db_pnr = pnr("b", 2500, &["proof-1"], &[]);
        db_pnr["system"] = json!("db");
        let data = dataset(page_json(
            vec![pnr("a", 4000, &["proof-1"], &[]), db_pnr],
            vec![proof_json("proof-1", "2023-01-10T10:00:00+01:00", "purchase")],
            vec![],
        ));

        let items = build_line_items(&data, &ReconcileOptions::default()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!((items[0].system.as_str(), items[0].amount_cents), ("sncf", 4000));
        assert_eq!((items[1].system.as_str(), items[1].amount_cents), ("db", 2500));
    }

    #[test]
    fn test_duplicate_and_urlless_proofs() {
        let mut no_url = proof_json("proof-2", "2023-01-10T10:00:00+01:00", "purchase");
        no_url.as_object_mut().unwrap().remove("url");
        let data = dataset(page_json(
            vec![pnr("a", 1000, &["proof-1", "proof-2"], &[])],
            vec![
                proof_json("proof-1", "2023-01-10T10:00:00+01:00", "purchase"),
                proof_json("proof-1", "2023-01-10T10:00:00+01:00", "purchase"),
                no_url,
            ],
            vec![],
        ));

        let items = build_line_items(&data, &ReconcileOptions::default()).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_line_date_drops_time_of_day() {
        let data = dataset(page_json(
            vec![pnr("a", 1000, &["proof-1"], &[])],
            vec![proof_json("proof-1", "2023-01-31T23:59:59+01:00", "purchase")],
            vec![],
        ));

        let items = build_line_items(&data, &ReconcileOptions::default()).unwrap();
        assert_eq!(items[0].date, NaiveDate::from_ymd_opt(2023, 1, 31).unwrap());
    }
}
