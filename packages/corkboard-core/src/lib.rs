pub mod config;
pub mod diff;
pub mod fingerprint;
pub mod ordering;
pub mod snapshot;
pub mod storage;
pub mod transfer;
pub mod types;

pub use config::StoreConfig;
pub use snapshot::BoardSnapshot;
pub use storage::sqlite::SqliteStorage;
pub use storage::{BoardStorage, ErrorKind, OwnedEntity, OwnershipVerifier, StoreError, StoreResult};
