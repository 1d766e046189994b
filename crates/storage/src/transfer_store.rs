use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use transfer_watch_domain::storage::{StorageError, StorageResult, TransferStore};
use transfer_watch_domain::{TransactionHash, TransferRecord};

/// Shared hash-keyed transfer index used by the API process. Cloning yields
/// another handle onto the same map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransferStore {
    records: Arc<RwLock<HashMap<TransactionHash, TransferRecord>>>,
}

impl InMemoryTransferStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> StorageResult<usize> {
        let guard = self.records.read().map_err(StorageError::from_source)?;
        Ok(guard.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl TransferStore for InMemoryTransferStore {
    async fn upsert_transfer(&self, record: TransferRecord) -> StorageResult<()> {
        let mut guard = self.records.write().map_err(StorageError::from_source)?;
        guard.insert(record.transaction_hash.clone(), record);
        Ok(())
    }

    async fn find_transfer(
        &self,
        hash: &TransactionHash,
    ) -> StorageResult<Option<TransferRecord>> {
        let guard = self.records.read().map_err(StorageError::from_source)?;
        Ok(guard.get(hash).cloned())
    }
}
