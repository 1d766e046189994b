use std::sync::Arc;

use transfer_watch_domain::services::telemetry::TelemetryGuard;
use transfer_watch_ingest::{ChainRpcClient, IngestPipeline};
use transfer_watch_storage::InMemoryTransferStore;

pub type Pipeline = IngestPipeline<InMemoryTransferStore>;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    telemetry: TelemetryGuard,
    rpc: Arc<ChainRpcClient>,
    signature_header: String,
}

impl AppState {
    pub fn new(
        pipeline: Arc<Pipeline>,
        telemetry: TelemetryGuard,
        rpc: Arc<ChainRpcClient>,
        signature_header: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            telemetry,
            rpc,
            signature_header: signature_header.into(),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        self.pipeline.as_ref()
    }

    pub fn telemetry(&self) -> &TelemetryGuard {
        &self.telemetry
    }

    pub fn rpc(&self) -> &ChainRpcClient {
        self.rpc.as_ref()
    }

    /// Lowercase header name carrying the hex HMAC of the body.
    pub fn signature_header(&self) -> &str {
        &self.signature_header
    }
}
