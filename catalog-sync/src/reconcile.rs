use std::sync::Arc;
use std::time::Instant;

use ahash::AHashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::CatalogError;
use crate::feed::{FeedClient, FeedError};
use crate::mapper::{map_items, MapError};
use crate::metrics_consts::{
    SYNC_DUPLICATES_IN_PAGE, SYNC_ITEMS_RECEIVED, SYNC_PASS_TIME, SYNC_ROWS_CREATED,
    SYNC_ROWS_UPDATED, SYNC_TOMBSTONES_SKIPPED,
};
use crate::store::ProductStore;
use crate::types::{Product, ProductUpsert};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("feed unavailable: {0}")]
    Upstream(#[from] FeedError),
    #[error("feed page rejected: {0}")]
    Map(#[from] MapError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// What one sync pass did. Mostly for logging and tests.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SyncOutcome {
    pub received: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped_tombstones: usize,
    pub rows_written: u64,
}

/// Merges feed pages into the catalog store. Constructed once at startup
/// and driven by whatever schedules the passes.
pub struct Reconciler {
    feed: Arc<dyn FeedClient>,
    store: Arc<ProductStore>,
}

impl Reconciler {
    pub fn new(feed: Arc<dyn FeedClient>, store: Arc<ProductStore>) -> Self {
        Self { feed, store }
    }

    /// One full sync pass: fetch a feed page, normalize it, and merge it
    /// into the store. A failure at any step aborts the pass; flushed
    /// chunks from a prior step stay committed.
    pub async fn sync_once(&self) -> Result<SyncOutcome, SyncError> {
        let pass_start = Instant::now();

        let page = self.feed.fetch_page().await?;
        let outcome = if page.items.is_empty() {
            debug!("Feed page was empty, nothing to reconcile");
            SyncOutcome::default()
        } else {
            let records = map_items(&page.items)?;
            self.upsert_from_feed(records).await?
        };

        metrics::histogram!(SYNC_PASS_TIME).record(pass_start.elapsed().as_secs_f64());
        info!(
            received = outcome.received,
            created = outcome.created,
            updated = outcome.updated,
            skipped_tombstones = outcome.skipped_tombstones,
            "Sync pass complete"
        );
        Ok(outcome)
    }

    /// Classify a batch of upsert records against current store state and
    /// commit the minimal write set in one bulk call.
    pub async fn upsert_from_feed(
        &self,
        records: Vec<ProductUpsert>,
    ) -> Result<SyncOutcome, SyncError> {
        if records.is_empty() {
            return Ok(SyncOutcome::default());
        }

        let received = records.len();
        metrics::counter!(SYNC_ITEMS_RECEIVED).increment(received as u64);

        let deduped = dedupe_last_wins(records);
        if deduped.len() < received {
            metrics::counter!(SYNC_DUPLICATES_IN_PAGE)
                .increment((received - deduped.len()) as u64);
        }

        let external_ids: Vec<String> =
            deduped.iter().map(|r| r.external_id.clone()).collect();
        let existing = self.store.find_by_external_ids(&external_ids).await?;
        let existing_by_external_id: AHashMap<&str, &Product> = existing
            .iter()
            .map(|p| (p.external_id.as_str(), p))
            .collect();

        let mut outcome = SyncOutcome {
            received,
            ..Default::default()
        };
        let mut write_set: Vec<ProductUpsert> = Vec::with_capacity(deduped.len());

        for record in deduped {
            match existing_by_external_id.get(record.external_id.as_str()) {
                // Tombstones are frozen; the feed cannot revive them.
                Some(product) if product.deleted => {
                    debug!(
                        external_id = %record.external_id,
                        "Skipping tombstoned product"
                    );
                    outcome.skipped_tombstones += 1;
                }
                Some(_) => {
                    outcome.updated += 1;
                    write_set.push(record);
                }
                None => {
                    outcome.created += 1;
                    write_set.push(record);
                }
            }
        }

        if !write_set.is_empty() {
            outcome.rows_written = self.store.bulk_upsert(&write_set).await?;
        }

        metrics::counter!(SYNC_ROWS_CREATED).increment(outcome.created as u64);
        metrics::counter!(SYNC_ROWS_UPDATED).increment(outcome.updated as u64);
        metrics::counter!(SYNC_TOMBSTONES_SKIPPED)
            .increment(outcome.skipped_tombstones as u64);
        Ok(outcome)
    }
}

// Duplicate external ids within one page collapse to the last occurrence;
// later feed entries carry newer state. First-seen order is preserved so
// the write set stays deterministic.
fn dedupe_last_wins(records: Vec<ProductUpsert>) -> Vec<ProductUpsert> {
    let mut position: AHashMap<String, usize> = AHashMap::with_capacity(records.len());
    let mut deduped: Vec<ProductUpsert> = Vec::with_capacity(records.len());

    for record in records {
        match position.get(&record.external_id) {
            Some(&idx) => deduped[idx] = record,
            None => {
                position.insert(record.external_id.clone(), deduped.len());
                deduped.push(record);
            }
        }
    }

    deduped
}
