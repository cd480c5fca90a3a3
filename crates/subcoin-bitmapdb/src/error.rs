//! Error types for the bitmap chunk store.

/// Errors that can occur while reading or writing bitmap chunks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying transaction or cursor failure.
    #[error(transparent)]
    Store(#[from] subcoin_kv::Error),

    /// Bitmap serialization or deserialization failure.
    #[error("Bitmap encoding error: {0}")]
    Encoding(#[from] std::io::Error),
}
