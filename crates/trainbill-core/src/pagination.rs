//! History pagination
//!
//! The pnrs endpoint returns the most recent bookings first. Older history is
//! requested with `?date=YYYY-MM-DD`, where the date is the first day of the
//! month before the oldest booking seen so far. The one-month overlap absorbs
//! boundary skew in the remote date filter; duplicates it produces are handled
//! during reconciliation.

use async_trait::async_trait;
use chrono::{Datelike, Months, NaiveDate};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::{Dataset, Page, Pnr};

/// Source of pnrs pages (the authenticated HTTP session in production)
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the page older than `cursor`, or the most recent page for `None`
    async fn fetch_page(&self, cursor: Option<NaiveDate>) -> Result<Page>;
}

/// Limits for the pagination loop
#[derive(Debug, Clone)]
pub struct PaginationOptions {
    /// Hard cap on fetched pages
    pub max_pages: usize,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self { max_pages: 100 }
    }
}

impl Dataset {
    /// Append every table of `page` to the dataset
    pub fn absorb(&mut self, page: Page) {
        self.pnrs.extend(page.pnrs);
        self.proofs.extend(page.proofs);
        self.after_sales_logs.extend(page.after_sales_logs);
        self.folders.extend(page.folders);
        self.pages += 1;
    }
}

/// First day of the month before the oldest pnr
///
/// Returns `None` for an empty slice, in which case pagination must stop.
pub fn next_cursor(pnrs: &[Pnr]) -> Option<NaiveDate> {
    let oldest = pnrs.iter().map(|pnr| pnr.sort_date.date_naive()).min()?;
    oldest.with_day(1)?.checked_sub_months(Months::new(1))
}

/// Fetch pages until one comes back without proofs
pub async fn collect_history<S>(source: &S, options: &PaginationOptions) -> Result<Dataset>
where
    S: PageSource + ?Sized,
{
    let mut dataset = Dataset::default();
    let mut cursor: Option<NaiveDate> = None;

    loop {
        if dataset.pages >= options.max_pages {
            warn!(
                "Stopping pagination after {} pages (max_pages reached)",
                dataset.pages
            );
            break;
        }

        let page = source.fetch_page(cursor).await?;
        if !page.has_proofs() {
            debug!("Page at cursor {:?} has no proofs, history complete", cursor);
            break;
        }

        debug!(
            "Page {}: {} pnrs, {} proofs, {} after-sales logs",
            dataset.pages + 1,
            page.pnrs.len(),
            page.proofs.len(),
            page.after_sales_logs.len()
        );
        dataset.absorb(page);

        let Some(next) = next_cursor(&dataset.pnrs) else {
            warn!("No pnrs to compute the next page from, stopping pagination");
            break;
        };
        if cursor.is_some_and(|previous| next >= previous) {
            warn!(
                "Cursor did not move past {}, stopping pagination",
                next.format("%Y-%m-%d")
            );
            break;
        }
        cursor = Some(next);
    }

    info!(
        "Collected {} pages: {} pnrs, {} proofs, {} after-sales logs",
        dataset.pages,
        dataset.pnrs.len(),
        dataset.proofs.len(),
        dataset.after_sales_logs.len()
    );
    Ok(dataset)
}
