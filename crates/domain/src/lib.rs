//! Domain-level building blocks shared by the ingest pipeline, the storage
//! adapter and the HTTP surface: configuration, the transfer model, webhook
//! signature checks and the storage port.

pub mod config;
pub mod model;
pub mod services;
pub mod signature;
pub mod storage;

pub use model::*;
pub use signature::{verify_signature, AuthenticationError, SignatureVerifier};
pub use storage::*;
