//! Error types for key/value transactions.

/// Errors that can occur while accessing the key/value store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Key is absent after all shadowing rules were applied.
    #[error("Key {} not found in table {table}", hex::encode(.key))]
    NotFound { table: String, key: Vec<u8> },

    /// Another write transaction committed after this one began.
    #[error("Write conflict: store moved from version {expected} to {actual}")]
    Conflict { expected: u64, actual: u64 },

    /// Failure reported by the underlying storage engine.
    #[error("Storage backend error: {0}")]
    Backend(String),
}
