//! Webhook ingestion: payload decoding, transfer extraction and the
//! orchestrator that ties signature checks, parsing, extraction and storage
//! together for each delivery.

pub mod extract;
pub mod payload;
pub mod pipeline;
pub mod rpc;

pub use extract::{extract_from_transaction, extract_legacy, MonitorTarget, ProcessingError};
pub use payload::{
    decode_body, parse_payload, ActivityItem, AddressActivity, DecodedPayload, LegacyEvent,
    PayloadKind, ValidationError, ADDRESS_ACTIVITY_TYPE,
};
pub use pipeline::{
    IngestError, IngestObserver, IngestPipeline, IngestReport, ItemOutcome, TracingObserver,
};
pub use rpc::{ChainRpcClient, RpcError};
