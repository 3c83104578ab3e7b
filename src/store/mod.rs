use async_trait::async_trait;
use thiserror::Error;

use crate::models::AttendanceRecord;

/// Failure writing to the attendance store. Distinguishes the backend
/// refusing the statement from the store's worker machinery going away, so
/// failure scenarios stay distinguishable in tests.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying database rejected or failed the statement.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The store's worker thread is gone or unreachable.
    #[error("storage worker unavailable: {0}")]
    Worker(String),
}

/// Durable persistence for attendance records.
///
/// `Ok(true)` means the record was written, `Ok(false)` means the store
/// declined it (e.g. the subject is already registered for that activity
/// today). The recorder treats `Ok(false)` and `Err(_)` identically as a
/// failed write.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn insert(&self, record: &AttendanceRecord) -> Result<bool, StorageError>;
}
