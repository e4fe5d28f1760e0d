#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::datastore::RecordChange;
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the durable copy of the tables.
///
/// The datastore stays authoritative while the process runs; a store only
/// receives committed rows and hands them back on startup.
pub trait GameStore: Send + Sync {
    /// Upsert the given rows.
    fn persist(&self, changes: Vec<RecordChange>) -> BoxFuture<'static, StorageResult<()>>;
    /// Load every persisted row.
    fn load_all(&self) -> BoxFuture<'static, StorageResult<Vec<RecordChange>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
