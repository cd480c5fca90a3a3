//! Ordered key/value transaction interface for Subcoin storage.
//!
//! The storage layer talks to the underlying database exclusively through the
//! [`Tx`], [`RwTx`] and [`Cursor`] traits defined here:
//!
//! - **Tables**: named, independently ordered keyspaces (column families / buckets).
//! - **Cursors**: forward scans in ascending key order, released when dropped.
//! - **Write transactions**: buffered puts, deletes and table clears.
//!
//! [`MemDb`] is an in-memory implementation used as the staging area of overlay
//! batches and as the store backing tests.

mod error;
mod mem;

pub use error::Error;
pub use mem::{MemCursor, MemDb, MemRoTx, MemRwTx};

/// Result type for key/value operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A key and its value, as yielded by a [`Cursor`].
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Forward cursor over a single table.
///
/// `Ok(None)` signals the end of the table. A cursor is released when it is
/// dropped, so early returns never leak it.
pub trait Cursor {
    /// Position at the smallest key of the table.
    fn first(&mut self) -> Result<Option<KeyValue>>;

    /// Position at the smallest key that is greater than or equal to `key`.
    fn seek(&mut self, key: &[u8]) -> Result<Option<KeyValue>>;

    /// Advance to the next key.
    ///
    /// On a cursor that has not been positioned yet this behaves like [`Cursor::first`].
    fn next(&mut self) -> Result<Option<KeyValue>>;
}

/// Read access to an ordered key/value store.
pub trait Tx {
    type Cursor<'a>: Cursor
    where
        Self: 'a;

    /// Open a cursor on `table`. A missing table yields an empty cursor.
    fn cursor(&self, table: &str) -> Result<Self::Cursor<'_>>;

    /// Read the value stored under `key`, `None` if absent.
    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Names of all tables holding at least one entry, in ascending order.
    fn list_tables(&self) -> Result<Vec<String>>;

    /// Read the value stored under `key`, failing with [`Error::NotFound`] if absent.
    fn get_one(&self, table: &str, key: &[u8]) -> Result<Vec<u8>> {
        self.get(table, key)?.ok_or_else(|| Error::NotFound {
            table: table.to_string(),
            key: key.to_vec(),
        })
    }

    /// Check whether `key` is present in `table`.
    fn has(&self, table: &str, key: &[u8]) -> Result<bool> {
        Ok(self.get(table, key)?.is_some())
    }
}

/// Write access to an ordered key/value store.
pub trait RwTx: Tx {
    /// Insert or overwrite `key` with `value`.
    fn put(&mut self, table: &str, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&mut self, table: &str, key: &[u8]) -> Result<()>;

    /// Remove every entry of `table`.
    fn clear_table(&mut self, table: &str) -> Result<()>;
}
