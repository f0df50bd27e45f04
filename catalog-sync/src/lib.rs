pub mod api;
pub mod app_context;
pub mod config;
pub mod error;
pub mod feed;
pub mod mapper;
pub mod metrics_consts;
pub mod reconcile;
pub mod reports;
pub mod store;
pub mod types;
