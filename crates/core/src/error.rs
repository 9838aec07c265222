//! Error types for the Threadwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each bounded context
//! owns its error type: storage errors live here, assembly errors in
//! `threadwise-context`, configuration errors in `threadwise-config`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}
