use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use thiserror::Error;
use tracing::info;
use transfer_watch_domain::config::{ApiConfig, ConfigError};
use transfer_watch_domain::services::telemetry::{init_telemetry, TelemetryConfig, TelemetryError};
use transfer_watch_ingest::{ChainRpcClient, IngestPipeline, RpcError};
use transfer_watch_storage::InMemoryTransferStore;

use crate::{
    handlers::{health_handler, metrics_handler, transaction_handler, webhook_handler},
    state::AppState,
};

/// Upper bound on an accepted webhook body. Activity batches can carry many
/// transactions, so this is well above actix's 256 KiB default.
pub const MAX_WEBHOOK_BODY: usize = 4 * 1024 * 1024;

pub async fn run() -> Result<(), BootstrapError> {
    let config = ApiConfig::load_from_env()?;

    let telemetry_config = TelemetryConfig::from_env("API");
    let telemetry = init_telemetry(&telemetry_config)?;

    // Fails on a malformed endpoint; nothing is fetched at startup.
    let rpc = ChainRpcClient::new(config.rpc_url())?;

    let pipeline = IngestPipeline::new(config.ingest(), InMemoryTransferStore::new());
    let state = AppState::new(
        Arc::new(pipeline),
        telemetry,
        Arc::new(rpc),
        config.signature_header(),
    );

    info!(
        bind = config.api_bind_address(),
        monitored = config.ingest().monitored_address(),
        asset = config.ingest().monitored_asset(),
        rpc = %state.rpc().endpoint(),
        "starting webhook api"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Logger::default())
            .configure(routes)
    })
    .bind(config.api_bind_address())?
    .run()
    .await?;

    Ok(())
}

/// Route table shared by the server and the handler tests.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_WEBHOOK_BODY))
        .route("/webhook", web::post().to(webhook_handler))
        .route("/transaction/{hash}", web::get().to(transaction_handler))
        .route("/health", web::get().to(health_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("rpc client error: {0}")]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
