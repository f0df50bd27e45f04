use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::CatalogError;
use crate::store::{CountScope, ProductStore};
use crate::types::{CategoryAveragePrice, DateRange};

/// Derived catalog metrics, computed from the store on demand. Percentages
/// and averages are rounded to 4 decimal digits here, at the presentation
/// boundary, not inside the queries.
pub struct ReportsService {
    store: Arc<ProductStore>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReport {
    pub active_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_price: Option<Decimal>,
}

impl ReportsService {
    pub fn new(store: Arc<ProductStore>) -> Self {
        Self { store }
    }

    /// Share of tombstoned rows over all rows, 0 for an empty catalog.
    pub async fn deleted_percentage(&self) -> Result<f64, CatalogError> {
        let deleted = self
            .store
            .count_products(CountScope::DeletedOnly, None)
            .await?;
        let total = self.store.count_products(CountScope::All, None).await?;

        if total == 0 {
            return Ok(0.0);
        }
        Ok(round4(deleted as f64 / total as f64 * 100.0))
    }

    /// Share of active rows among all rows whose `content_created_at` falls
    /// in the range, tombstones included in the denominator. When
    /// `with_price` is set, also the average price of the active rows in
    /// range; `None` (not zero) when nothing matches.
    pub async fn active_percentage(
        &self,
        range: &DateRange,
        with_price: bool,
    ) -> Result<ActivityReport, CatalogError> {
        let active = self
            .store
            .count_products(CountScope::ActiveOnly, Some(range))
            .await?;
        let total = self
            .store
            .count_products(CountScope::All, Some(range))
            .await?;

        let active_percentage = if total == 0 {
            0.0
        } else {
            round4(active as f64 / total as f64 * 100.0)
        };

        let avg_price = if with_price {
            self.store
                .average_price(Some(range))
                .await?
                .map(|avg| avg.round_dp(4))
        } else {
            None
        };

        Ok(ActivityReport {
            active_percentage,
            avg_price,
        })
    }

    pub async fn avg_price_by_category(
        &self,
    ) -> Result<Vec<CategoryAveragePrice>, CatalogError> {
        let rows = self.store.average_price_by_category().await?;
        Ok(rows
            .into_iter()
            .map(|row| CategoryAveragePrice {
                avg_price: row.avg_price.map(|avg| avg.round_dp(4)),
                ..row
            })
            .collect())
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
