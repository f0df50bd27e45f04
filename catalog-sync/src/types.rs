use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row of the `products` table. `external_id` is the natural key from the
/// external feed and never changes after creation; `deleted = true` rows are
/// tombstones that are kept for uniqueness and history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub external_id: String,
    pub sku: Option<String>,
    pub name: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub stock: Option<i32>,
    pub content_created_at: Option<DateTime<Utc>>,
    pub content_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Normalized feed item, ready to reconcile against the store. Business
/// fields overwrite the stored row wholesale on update, nulls included.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductUpsert {
    pub external_id: String,
    pub sku: Option<String>,
    pub name: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub stock: Option<i32>,
    pub content_created_at: Option<DateTime<Utc>>,
    pub content_updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilters {
    pub name: Option<String>,
    pub category: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Response envelope for paginated product listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedProducts {
    pub data: Vec<Product>,
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl PagedProducts {
    pub fn new(data: Vec<Product>, page: u32, page_size: u32, total: i64) -> Self {
        let total_pages = if total <= 0 {
            0
        } else {
            (total + page_size as i64 - 1) / page_size as i64
        };
        Self {
            data,
            page,
            page_size,
            total,
            total_pages,
        }
    }
}

/// Inclusive range over `content_created_at`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAveragePrice {
    pub category: String,
    pub avg_price: Option<Decimal>,
}
