//! In-memory storage adapter that satisfies the domain `TransferStore` port.
//! State lives for the process lifetime only; there is no eviction and no
//! persistence.

mod transfer_store;

pub use transfer_store::InMemoryTransferStore;
