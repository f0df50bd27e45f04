use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;

/// One page of the external product feed. Contentful-style envelope; only
/// `items` is consumed here, the pagination metadata belongs to whatever
/// walks the full feed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub items: Vec<FeedItem>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub skip: u64,
    #[serde(default)]
    pub limit: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedItem {
    #[serde(default)]
    pub sys: FeedItemSys,
    #[serde(default)]
    pub fields: FeedItemFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItemSys {
    // Required by the mapper, but modelled as optional so one corrupt item
    // surfaces as a mapping error instead of failing the page deserialize.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedItemFields {
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub stock: Option<i32>,
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("feed returned status {0}")]
    Status(reqwest::StatusCode),
}

#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch_page(&self) -> Result<FeedPage, FeedError>;
}

pub struct HttpFeedClient {
    client: reqwest::Client,
    entries_url: String,
}

impl HttpFeedClient {
    pub fn new(config: &Config) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.feed_timeout_secs))
            .build()?;
        let entries_url = format!("{}/entries", config.feed_base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            entries_url,
        })
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch_page(&self) -> Result<FeedPage, FeedError> {
        let response = self.client.get(&self.entries_url).send().await?;
        if !response.status().is_success() {
            return Err(FeedError::Status(response.status()));
        }
        Ok(response.json().await?)
    }
}
