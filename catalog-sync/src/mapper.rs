use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::feed::FeedItem;
use crate::types::ProductUpsert;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("feed item has no source id")]
    MissingExternalId,
}

/// Normalize one feed item into an upsert record. Absent business fields
/// become NULL. `name` is the one exception and falls back to an empty
/// string, since the column is NOT NULL.
pub fn map_item(item: &FeedItem) -> Result<ProductUpsert, MapError> {
    let external_id = item
        .sys
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or(MapError::MissingExternalId)?;

    Ok(ProductUpsert {
        external_id: external_id.to_string(),
        sku: item.fields.sku.clone(),
        name: item.fields.name.clone().unwrap_or_default(),
        brand: item.fields.brand.clone(),
        model: item.fields.model.clone(),
        category: item.fields.category.clone(),
        color: item.fields.color.clone(),
        price: item.fields.price,
        currency: item.fields.currency.clone(),
        stock: item.fields.stock,
        content_created_at: parse_feed_timestamp(item.sys.created_at.as_deref()),
        content_updated_at: parse_feed_timestamp(item.sys.updated_at.as_deref()),
    })
}

/// Map a whole page. Only a missing external id aborts the batch; it points
/// at a corrupt feed rather than a normal variation.
pub fn map_items(items: &[FeedItem]) -> Result<Vec<ProductUpsert>, MapError> {
    items.iter().map(map_item).collect()
}

// Absent or unparsable feed timestamps downgrade to NULL, never to "now".
fn parse_feed_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
}
