pub const SYNC_PASSES_STARTED: &str = "catalog_sync_passes_started";
pub const SYNC_PASSES_FAILED: &str = "catalog_sync_passes_failed";
pub const SYNC_PASS_TIME: &str = "catalog_sync_pass_time_seconds";
pub const SYNC_ITEMS_RECEIVED: &str = "catalog_sync_items_received";
pub const SYNC_DUPLICATES_IN_PAGE: &str = "catalog_sync_duplicates_in_page";
pub const SYNC_ROWS_CREATED: &str = "catalog_sync_rows_created";
pub const SYNC_ROWS_UPDATED: &str = "catalog_sync_rows_updated";
pub const SYNC_TOMBSTONES_SKIPPED: &str = "catalog_sync_tombstones_skipped";

pub const BULK_UPSERT_BATCH_ATTEMPT: &str = "catalog_bulk_upsert_batch_attempt";
pub const BULK_UPSERT_ROWS_AFFECTED: &str = "catalog_bulk_upsert_rows_affected";
pub const SOFT_DELETES_ISSUED: &str = "catalog_soft_deletes_issued";
