use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::warn;
use uuid::Uuid;

use crate::error::CatalogError;
use crate::metrics_consts::{
    BULK_UPSERT_BATCH_ATTEMPT, BULK_UPSERT_ROWS_AFFECTED, SOFT_DELETES_ISSUED,
};
use crate::types::{CategoryAveragePrice, DateRange, Product, ProductFilters, ProductUpsert};

pub const DEFAULT_PAGE_LIMIT: u32 = 5;
pub const MAX_PAGE_LIMIT: u32 = 5;

/// Rows per UNNEST round trip. Bounds statement size; chunks are not
/// mutually atomic.
pub const UPSERT_CHUNK_SIZE: usize = 100;

const BULK_UPSERT_MAX_ATTEMPTS: u64 = 3;
const BULK_UPSERT_RETRY_DELAY_MS: u64 = 50;

const PRODUCT_COLUMNS: &str = "id, external_id, sku, name, brand, model, category, color, \
     price, currency, stock, content_created_at, content_updated_at, \
     created_at, updated_at, deleted, deleted_at";

/// Postgres-backed repository over the `products` table.
pub struct ProductStore {
    pool: PgPool,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CountScope {
    All,
    ActiveOnly,
    DeletedOnly,
}

// Column-vector write batch, shaped for a single UNNEST statement the way
// the Postgres wire protocol likes it.
#[derive(Debug, Default)]
struct ProductsBatch {
    ids: Vec<Uuid>,
    external_ids: Vec<String>,
    skus: Vec<Option<String>>,
    names: Vec<String>,
    brands: Vec<Option<String>>,
    models: Vec<Option<String>>,
    categories: Vec<Option<String>>,
    colors: Vec<Option<String>>,
    prices: Vec<Option<Decimal>>,
    currencies: Vec<Option<String>>,
    stocks: Vec<Option<i32>>,
    content_created_ats: Vec<Option<DateTime<Utc>>>,
    content_updated_ats: Vec<Option<DateTime<Utc>>>,
}

impl ProductsBatch {
    fn append(&mut self, record: &ProductUpsert) {
        // Fresh id per tuple; on external_id conflict the stored row keeps
        // its original id, so only genuinely new rows consume these.
        self.ids.push(Uuid::now_v7());
        self.external_ids.push(record.external_id.clone());
        self.skus.push(record.sku.clone());
        self.names.push(record.name.clone());
        self.brands.push(record.brand.clone());
        self.models.push(record.model.clone());
        self.categories.push(record.category.clone());
        self.colors.push(record.color.clone());
        self.prices.push(record.price);
        self.currencies.push(record.currency.clone());
        self.stocks.push(record.stock);
        self.content_created_ats.push(record.content_created_at);
        self.content_updated_ats.push(record.content_updated_at);
    }
}

impl ProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Filtered, paginated listing of active products. Ordering is by `id`
    /// (UUID v7, time-ordered), which keeps paging stable across calls while
    /// the data is unchanged.
    ///
    /// The total and the page rows are two round trips, so a sync committing
    /// between them can make them disagree by a row. Each statement still
    /// only sees committed rows, and paging stays deterministic while the
    /// data is unchanged, which is all callers rely on.
    pub async fn find_page(
        &self,
        filters: &ProductFilters,
    ) -> Result<(Vec<Product>, i64), CatalogError> {
        let page = filters.page.unwrap_or(1);
        let limit = filters.limit.unwrap_or(DEFAULT_PAGE_LIMIT);

        if page < 1 {
            return Err(CatalogError::InvalidArgument(
                "page number must be greater than 0".to_string(),
            ));
        }
        if limit < 1 || limit > MAX_PAGE_LIMIT {
            return Err(CatalogError::InvalidArgument(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT count(*) FROM products");
        Self::push_listing_filters(&mut count_qb, filters);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        // widen before multiplying; (page-1)*limit can exceed u32
        let offset = (i64::from(page) - 1) * i64::from(limit);
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM products", PRODUCT_COLUMNS));
        Self::push_listing_filters(&mut qb, filters);
        qb.push(" ORDER BY id LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(offset);

        let items = qb.build_query_as::<Product>().fetch_all(&self.pool).await?;

        Ok((items, total))
    }

    fn push_listing_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, filters: &'a ProductFilters) {
        qb.push(" WHERE deleted = false");
        if let Some(name) = &filters.name {
            qb.push(" AND name ILIKE ").push_bind(format!("%{}%", name));
        }
        if let Some(category) = &filters.category {
            qb.push(" AND category ILIKE ")
                .push_bind(format!("%{}%", category));
        }
    }

    /// Batch lookup by feed id, tombstones included so the reconciler can
    /// see them. An empty input returns empty without touching the pool.
    pub async fn find_by_external_ids(
        &self,
        external_ids: &[String],
    ) -> Result<Vec<Product>, CatalogError> {
        if external_ids.is_empty() {
            return Ok(vec![]);
        }

        let rows = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE external_id = ANY($1)",
            PRODUCT_COLUMNS
        ))
        .bind(external_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Tombstone a product. Re-deleting an already-deleted row succeeds and
    /// refreshes `deleted_at`; rows are never physically removed.
    pub async fn soft_delete(&self, id: Uuid) -> Result<u64, CatalogError> {
        let result = sqlx::query(
            "UPDATE products SET deleted = true, deleted_at = now(), updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(id));
        }

        metrics::counter!(SOFT_DELETES_ISSUED).increment(1);
        Ok(result.rows_affected())
    }

    /// Insert-or-update a batch of upsert records in chunks of
    /// [`UPSERT_CHUNK_SIZE`]. The conflict target is the unique
    /// `external_id`, so concurrent syncs racing on the same feed id cannot
    /// produce duplicate rows, and the `deleted = false` guard keeps
    /// tombstones frozen even if a pass classified a row before it was
    /// deleted. Returns total rows affected.
    ///
    /// Callers must pass at most one record per `external_id`; Postgres
    /// rejects updating the same row twice within one ON CONFLICT statement.
    pub async fn bulk_upsert(&self, records: &[ProductUpsert]) -> Result<u64, CatalogError> {
        let mut total_affected = 0u64;

        for chunk in records.chunks(UPSERT_CHUNK_SIZE) {
            let mut batch = ProductsBatch::default();
            for record in chunk {
                batch.append(record);
            }
            total_affected += self.write_products_batch(&batch).await?;
        }

        metrics::counter!(BULK_UPSERT_ROWS_AFFECTED).increment(total_affected);
        Ok(total_affected)
    }

    async fn write_products_batch(&self, batch: &ProductsBatch) -> Result<u64, CatalogError> {
        let mut tries = 1;

        loop {
            let result = sqlx::query(
                r#"
                INSERT INTO products (
                    id, external_id, sku, name, brand, model, category, color,
                    price, currency, stock, content_created_at, content_updated_at
                )
                (SELECT * FROM UNNEST(
                    $1::uuid[],
                    $2::text[],
                    $3::text[],
                    $4::text[],
                    $5::text[],
                    $6::text[],
                    $7::text[],
                    $8::text[],
                    $9::numeric[],
                    $10::text[],
                    $11::int[],
                    $12::timestamptz[],
                    $13::timestamptz[]))
                ON CONFLICT (external_id) DO UPDATE SET
                    sku = EXCLUDED.sku,
                    name = EXCLUDED.name,
                    brand = EXCLUDED.brand,
                    model = EXCLUDED.model,
                    category = EXCLUDED.category,
                    color = EXCLUDED.color,
                    price = EXCLUDED.price,
                    currency = EXCLUDED.currency,
                    stock = EXCLUDED.stock,
                    content_created_at = EXCLUDED.content_created_at,
                    content_updated_at = EXCLUDED.content_updated_at,
                    updated_at = now()
                WHERE products.deleted = false"#,
            )
            .bind(&batch.ids)
            .bind(&batch.external_ids)
            .bind(&batch.skus)
            .bind(&batch.names)
            .bind(&batch.brands)
            .bind(&batch.models)
            .bind(&batch.categories)
            .bind(&batch.colors)
            .bind(&batch.prices)
            .bind(&batch.currencies)
            .bind(&batch.stocks)
            .bind(&batch.content_created_ats)
            .bind(&batch.content_updated_ats)
            .execute(&self.pool)
            .await;

            match result {
                Ok(pgq_result) => {
                    metrics::counter!(BULK_UPSERT_BATCH_ATTEMPT, &[("result", "success")])
                        .increment(1);
                    return Ok(pgq_result.rows_affected());
                }
                Err(e) => {
                    if tries == BULK_UPSERT_MAX_ATTEMPTS {
                        metrics::counter!(BULK_UPSERT_BATCH_ATTEMPT, &[("result", "failed")])
                            .increment(1);
                        if e.as_database_error()
                            .is_some_and(|db_err| db_err.is_unique_violation())
                        {
                            return Err(CatalogError::Conflict(e.to_string()));
                        }
                        return Err(CatalogError::Database(e));
                    }

                    warn!("Products batch write attempt {} failed: {:?}", tries, e);
                    metrics::counter!(BULK_UPSERT_BATCH_ATTEMPT, &[("result", "retry")])
                        .increment(1);
                    let jitter = rand::random::<u64>() % 50;
                    let delay = tries * BULK_UPSERT_RETRY_DELAY_MS + jitter;
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    tries += 1;
                }
            }
        }
    }

    pub async fn count_products(
        &self,
        scope: CountScope,
        range: Option<&DateRange>,
    ) -> Result<i64, CatalogError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT count(*) FROM products WHERE 1 = 1");
        match scope {
            CountScope::All => {}
            CountScope::ActiveOnly => {
                qb.push(" AND deleted = false");
            }
            CountScope::DeletedOnly => {
                qb.push(" AND deleted = true");
            }
        }
        if let Some(range) = range {
            qb.push(" AND content_created_at BETWEEN ")
                .push_bind(range.start)
                .push(" AND ")
                .push_bind(range.end);
        }

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Average price over active rows, `None` when nothing matches.
    pub async fn average_price(
        &self,
        range: Option<&DateRange>,
    ) -> Result<Option<Decimal>, CatalogError> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT AVG(price) FROM products WHERE deleted = false");
        if let Some(range) = range {
            qb.push(" AND content_created_at BETWEEN ")
                .push_bind(range.start)
                .push(" AND ")
                .push_bind(range.end);
        }

        let avg: Option<Decimal> = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(avg)
    }

    /// Per-category average price over active rows. Categories with no
    /// active rows are simply absent; a NULL category is not a category.
    pub async fn average_price_by_category(
        &self,
    ) -> Result<Vec<CategoryAveragePrice>, CatalogError> {
        let rows = sqlx::query_as::<_, CategoryAveragePrice>(
            r#"
            SELECT category, AVG(price) AS avg_price
            FROM products
            WHERE deleted = false AND category IS NOT NULL
            GROUP BY category
            ORDER BY category"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
