use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::error::CatalogError;
use crate::reports::ReportsService;
use crate::store::{ProductStore, DEFAULT_PAGE_LIMIT};
use crate::types::{DateRange, PagedProducts, ProductFilters};

/// Thin HTTP surface over the catalog core. Handlers only translate between
/// transport and the store/reports types; all invariants live below.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ProductStore>,
    pub reports: Arc<ReportsService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route("/_liveness", get(index))
        .route("/products", get(list_products))
        .route("/products/:id", delete(delete_product))
        .route("/reports/deleted-percentage", get(deleted_percentage))
        .route("/reports/active-percentage", get(active_percentage))
        .route("/reports/avg-price-by-category", get(avg_price_by_category))
        .with_state(state)
}

pub async fn index() -> &'static str {
    "catalog sync service"
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        match self {
            CatalogError::InvalidArgument(message) => {
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            CatalogError::NotFound(_) => {
                (StatusCode::NOT_FOUND, "Product not found").into_response()
            }
            CatalogError::Conflict(message) => (StatusCode::CONFLICT, message).into_response(),
            CatalogError::Database(e) => {
                error!("Database error: {e}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

async fn list_products(
    State(state): State<AppState>,
    Query(filters): Query<ProductFilters>,
) -> Result<Json<PagedProducts>, CatalogError> {
    let page = filters.page.unwrap_or(1);
    let limit = filters.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let (items, total) = state.store.find_page(&filters).await?;
    Ok(Json(PagedProducts::new(items, page, limit, total)))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, CatalogError> {
    state.store.soft_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn deleted_percentage(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, CatalogError> {
    let percentage = state.reports.deleted_percentage().await?;
    Ok(Json(serde_json::json!({ "deletedPercentage": percentage })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivePercentageParams {
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    #[serde(default)]
    with_price: bool,
}

async fn active_percentage(
    State(state): State<AppState>,
    Query(params): Query<ActivePercentageParams>,
) -> Result<impl IntoResponse, CatalogError> {
    let range = DateRange {
        start: params.start_date,
        end: params.end_date,
    };
    let report = state
        .reports
        .active_percentage(&range, params.with_price)
        .await?;
    Ok(Json(report))
}

async fn avg_price_by_category(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, CatalogError> {
    let rows = state.reports.avg_price_by_category().await?;
    Ok(Json(rows))
}
