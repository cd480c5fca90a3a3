//! In-memory ordered key/value store.
//!
//! Committed state is an immutable, reference-counted table map. Read
//! transactions pin the map that was current when they began; write
//! transactions mutate a private copy and publish it atomically on commit.

use crate::{Cursor, Error, KeyValue, Result, RwTx, Tx};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

type Table = BTreeMap<Vec<u8>, Vec<u8>>;
type Tables = BTreeMap<String, Table>;

#[derive(Default)]
struct Committed {
    version: u64,
    tables: Arc<Tables>,
}

#[derive(Default)]
struct Shared {
    committed: RwLock<Committed>,
    /// Number of cursors currently alive across all transactions.
    open_cursors: AtomicUsize,
}

/// In-memory ordered key/value database.
///
/// Cloning the handle shares the underlying state.
#[derive(Clone, Default)]
pub struct MemDb {
    shared: Arc<Shared>,
}

impl MemDb {
    /// Create an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a read-only transaction over the currently committed state.
    pub fn begin_ro(&self) -> MemRoTx {
        let committed = self.shared.committed.read();
        MemRoTx {
            tables: committed.tables.clone(),
            shared: self.shared.clone(),
        }
    }

    /// Begin a write transaction on a private copy of the committed state.
    pub fn begin_rw(&self) -> MemRwTx {
        let committed = self.shared.committed.read();
        MemRwTx {
            tables: (*committed.tables).clone(),
            version: committed.version,
            shared: self.shared.clone(),
        }
    }

    /// Number of cursors that have been opened and not yet dropped.
    pub fn open_cursors(&self) -> usize {
        self.shared.open_cursors.load(Ordering::SeqCst)
    }

    /// Number of write transactions committed so far.
    pub fn version(&self) -> u64 {
        self.shared.committed.read().version
    }
}

/// Read-only transaction pinned to one committed version.
pub struct MemRoTx {
    tables: Arc<Tables>,
    shared: Arc<Shared>,
}

impl Tx for MemRoTx {
    type Cursor<'a>
        = MemCursor<'a>
    where
        Self: 'a;

    fn cursor(&self, table: &str) -> Result<Self::Cursor<'_>> {
        Ok(MemCursor::new(self.tables.get(table), &self.shared))
    }

    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(lookup(&self.tables, table, key))
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        Ok(non_empty_tables(&self.tables))
    }
}

/// Write transaction.
///
/// Changes are invisible to other transactions until [`MemRwTx::commit`].
/// Dropping the transaction discards them.
pub struct MemRwTx {
    tables: Tables,
    version: u64,
    shared: Arc<Shared>,
}

impl MemRwTx {
    /// Publish all changes made in this transaction.
    ///
    /// Fails with [`Error::Conflict`] if another write transaction committed
    /// after this one began; nothing is published in that case.
    pub fn commit(self) -> Result<()> {
        let mut committed = self.shared.committed.write();
        if committed.version != self.version {
            return Err(Error::Conflict {
                expected: self.version,
                actual: committed.version,
            });
        }
        committed.version += 1;
        committed.tables = Arc::new(self.tables);

        tracing::trace!("Committed in-memory write transaction, version {}", committed.version);

        Ok(())
    }

    /// Discard all changes made in this transaction.
    pub fn rollback(self) {
        tracing::trace!("Rolled back in-memory write transaction at version {}", self.version);
    }
}

impl Tx for MemRwTx {
    type Cursor<'a>
        = MemCursor<'a>
    where
        Self: 'a;

    fn cursor(&self, table: &str) -> Result<Self::Cursor<'_>> {
        Ok(MemCursor::new(self.tables.get(table), &self.shared))
    }

    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(lookup(&self.tables, table, key))
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        Ok(non_empty_tables(&self.tables))
    }
}

impl RwTx for MemRwTx {
    fn put(&mut self, table: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, table: &str, key: &[u8]) -> Result<()> {
        if let Some(entries) = self.tables.get_mut(table) {
            entries.remove(key);
        }
        Ok(())
    }

    fn clear_table(&mut self, table: &str) -> Result<()> {
        self.tables.remove(table);
        Ok(())
    }
}

fn lookup(tables: &Tables, table: &str, key: &[u8]) -> Option<Vec<u8>> {
    tables
        .get(table)
        .and_then(|entries| entries.get(key))
        .cloned()
}

fn non_empty_tables(tables: &Tables) -> Vec<String> {
    tables
        .iter()
        .filter(|(_, entries)| !entries.is_empty())
        .map(|(name, _)| name.clone())
        .collect()
}

enum Position {
    Unpositioned,
    At(Vec<u8>),
    Exhausted,
}

/// Registers a live cursor for the lifetime of the value.
struct CursorLease<'a>(&'a AtomicUsize);

impl<'a> CursorLease<'a> {
    fn acquire(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CursorLease<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Cursor over one table of a [`MemRoTx`] or [`MemRwTx`].
pub struct MemCursor<'a> {
    table: Option<&'a Table>,
    position: Position,
    _lease: CursorLease<'a>,
}

impl<'a> MemCursor<'a> {
    fn new(table: Option<&'a Table>, shared: &'a Shared) -> Self {
        Self {
            table,
            position: Position::Unpositioned,
            _lease: CursorLease::acquire(&shared.open_cursors),
        }
    }

    fn settle(&mut self, entry: Option<(&'a Vec<u8>, &'a Vec<u8>)>) -> Option<KeyValue> {
        match entry {
            Some((key, value)) => {
                self.position = Position::At(key.clone());
                Some((key.clone(), value.clone()))
            }
            None => {
                self.position = Position::Exhausted;
                None
            }
        }
    }
}

impl Cursor for MemCursor<'_> {
    fn first(&mut self) -> Result<Option<KeyValue>> {
        let entry = self.table.and_then(|table| table.iter().next());
        Ok(self.settle(entry))
    }

    fn seek(&mut self, key: &[u8]) -> Result<Option<KeyValue>> {
        let entry = self.table.and_then(|table| {
            table
                .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
                .next()
        });
        Ok(self.settle(entry))
    }

    fn next(&mut self) -> Result<Option<KeyValue>> {
        match self.position {
            Position::Unpositioned => self.first(),
            Position::Exhausted => Ok(None),
            Position::At(ref current) => {
                let entry = self.table.and_then(|table| {
                    table
                        .range::<[u8], _>((Bound::Excluded(current.as_slice()), Bound::Unbounded))
                        .next()
                });
                Ok(self.settle(entry))
            }
        }
    }
}
