//! Line item aggregation into invoices

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::{Invoice, LineItem, DOCUMENT_TYPE, VENDOR};

/// File name for an invoice document: `YYYY_MM_Trainline.pdf`
pub fn file_name(date: NaiveDate) -> String {
    format!("{}_{}.pdf", date.format("%Y_%m"), VENDOR)
}

/// Merge line items sharing (url, system) into one invoice each
///
/// Amounts are summed; date and refund flag come from the first line item of
/// each group. The result is sorted most recent first, ties kept in first-seen
/// order.
pub fn aggregate_invoices(items: &[LineItem]) -> Vec<Invoice> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut groups: Vec<(&LineItem, i64)> = Vec::new();

    for item in items {
        let key = (item.url.as_str(), item.system.as_str());
        match index.get(&key).copied() {
            Some(i) => groups[i].1 += item.amount_cents,
            None => {
                index.insert(key, groups.len());
                groups.push((item, item.amount_cents));
            }
        }
    }

    let mut invoices: Vec<Invoice> = groups
        .into_iter()
        .map(|(first, total_cents)| Invoice {
            amount: total_cents as f64 / 100.0,
            file_url: first.url.clone(),
            date: first.date,
            document_type: DOCUMENT_TYPE.to_string(),
            vendor: VENDOR.to_string(),
            file_name: file_name(first.date),
            is_refund: first.is_refund.then_some(true),
        })
        .collect();

    invoices.sort_by(|a, b| b.date.cmp(&a.date));
    invoices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(url: &str, system: &str, cents: i64, date: &str, is_refund: bool) -> LineItem {
        LineItem {
            url: url.into(),
            system: system.into(),
            amount_cents: cents,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            is_refund,
        }
    }

    #[test]
    fn test_file_name() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 15).unwrap();
        assert_eq!(file_name(date), "2023_01_Trainline.pdf");
    }

    #[test]
    fn test_same_url_and_system_merged() {
        let items = vec![
            item("u1", "sncf", 1250, "2023-01-15", false),
            item("u1", "sncf", 750, "2023-01-15", false),
            item("u1", "db", 300, "2023-01-15", false),
        ];
        let invoices = aggregate_invoices(&items);
        assert_eq!(invoices.len(), 2);
        assert_eq!(invoices[0].amount, 20.0);
        assert_eq!(invoices[1].amount, 3.0);
        assert!(invoices.iter().all(|i| i.vendor == "Trainline"));
        assert!(invoices.iter().all(|i| i.document_type == "transport"));
    }

    #[test]
    fn test_sorted_most_recent_first() {
        let items = vec![
            item("jan", "sncf", 100, "2023-01-01", false),
            item("mar", "sncf", 100, "2023-03-01", false),
            item("feb", "sncf", 100, "2023-02-01", false),
        ];
        let invoices = aggregate_invoices(&items);
        let urls: Vec<_> = invoices.iter().map(|i| i.file_url.as_str()).collect();
        assert_eq!(urls, vec!["mar", "feb", "jan"]);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let items = vec![
            item("a", "sncf", 100, "2023-01-01", false),
            item("b", "sncf", 100, "2023-01-01", false),
        ];
        let invoices = aggregate_invoices(&items);
        assert_eq!(invoices[0].file_url, "a");
        assert_eq!(invoices[1].file_url, "b");
    }

    #[test]
    fn test_refund_flag_from_first_item() {
        let items = vec![
            item("r", "sncf", -4000, "2023-02-03", true),
            item("r", "sncf", 500, "2023-02-03", false),
            item("p", "sncf", 500, "2023-02-01", false),
            item("p", "sncf", -100, "2023-02-01", true),
        ];
        let invoices = aggregate_invoices(&items);
        assert_eq!(invoices[0].is_refund, Some(true));
        assert_eq!(invoices[0].amount, -35.0);
        assert_eq!(invoices[1].is_refund, None);
    }

    #[test]
    fn test_empty() {
        assert!(aggregate_invoices(&[]).is_empty());
    }
}
