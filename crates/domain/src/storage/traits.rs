use async_trait::async_trait;
use thiserror::Error;

use crate::model::{TransactionHash, TransferRecord};

/// Common result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn from_source(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Hash-keyed transfer index. `upsert_transfer` replaces any record stored
/// under the same hash wholesale; a reader never observes a half-written
/// record.
#[async_trait]
pub trait TransferStore: Send + Sync {
    async fn upsert_transfer(&self, record: TransferRecord) -> StorageResult<()>;
    async fn find_transfer(&self, hash: &TransactionHash)
        -> StorageResult<Option<TransferRecord>>;
}
