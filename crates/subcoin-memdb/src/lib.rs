//! In-memory write batches layered over a read transaction.
//!
//! An [`OverlayBatch`] accumulates puts, deletes and table clears without
//! touching the transaction it reads from. Reads through the batch see its own
//! pending changes on top of the base state. Named snapshots freeze a copy of
//! the pending changes so that they can be flushed to a write transaction
//! later, independently of what happens to the batch afterwards.

mod cursor;
mod error;
mod overlay;

pub use self::cursor::OverlayCursor;
pub use self::error::Error;
pub use self::overlay::OverlayBatch;

/// Result type for overlay batch operations.
pub type Result<T> = std::result::Result<T, Error>;
