use std::{future::ready, sync::Arc, time::Duration};

use axum::{routing::get, Router};
use catalog_sync::{
    api::{self, AppState},
    app_context::AppContext,
    config::Config,
    metrics_consts::{SYNC_PASSES_FAILED, SYNC_PASSES_STARTED},
    reconcile::Reconciler,
};
use envconfig::Envconfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

// The sync trigger. A failed pass is logged and retried on the next tick;
// it never takes the scheduler down with it.
async fn sync_loop(reconciler: Arc<Reconciler>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;
        metrics::counter!(SYNC_PASSES_STARTED).increment(1);

        if let Err(e) = reconciler.sync_once().await {
            metrics::counter!(SYNC_PASSES_FAILED).increment(1);
            error!("Sync pass failed: {e}");
        }
    }
}

async fn listen(app: Router, bind: String) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    setup_tracing();

    let config = Config::init_from_env().expect("failed to load configuration from env");
    let context = AppContext::new(&config)
        .await
        .expect("failed to create app context");

    let recorder_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");

    let app = api::router(AppState {
        store: context.store.clone(),
        reports: context.reports.clone(),
    })
    .route("/metrics", get(move || ready(recorder_handle.render())));

    let sync_handle = tokio::spawn(sync_loop(
        context.reconciler.clone(),
        config.sync_interval_secs,
    ));

    let bind = format!("{}:{}", config.host, config.port);
    info!("Listening on {bind}, syncing every {}s", config.sync_interval_secs);
    let server_handle = tokio::spawn(listen(app, bind));

    tokio::select! {
        res = sync_handle => {
            error!("sync loop exited");
            if let Err(e) = res {
                error!("sync loop failed with: {e}")
            }
        }
        res = server_handle => {
            error!("http server exited");
            match res {
                Ok(Err(e)) => error!("server failed with: {e}"),
                Err(e) => error!("server task failed with: {e}"),
                Ok(Ok(())) => {}
            }
        }
    }

    info!("exiting");
}
