use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::Config;
use crate::feed::HttpFeedClient;
use crate::reconcile::Reconciler;
use crate::reports::ReportsService;
use crate::store::ProductStore;

/// Everything the service needs, constructed once at process start and
/// passed explicitly from there.
pub struct AppContext {
    pub pool: PgPool,
    pub store: Arc<ProductStore>,
    pub reports: Arc<ReportsService>,
    pub reconciler: Arc<Reconciler>,
}

impl AppContext {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let options = PgPoolOptions::new().max_connections(config.max_pg_connections);
        let pool = options.connect(&config.database_url).await?;

        let store = Arc::new(ProductStore::new(pool.clone()));
        let feed = Arc::new(HttpFeedClient::new(config)?);
        let reconciler = Arc::new(Reconciler::new(feed, store.clone()));
        let reports = Arc::new(ReportsService::new(store.clone()));

        Ok(Self {
            pool,
            store,
            reports,
            reconciler,
        })
    }
}
