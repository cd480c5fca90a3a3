use crate::cursor::OverlayCursor;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use subcoin_kv::{Cursor, MemDb, MemRwTx, RwTx, Tx};

/// Pending writes over a base read transaction.
///
/// For a given table and key the batch resolves, in order of precedence:
///
/// 1. a delete recorded in the batch (absent),
/// 2. a clear of the whole table (absent, unless the key was written after the clear),
/// 3. a value written in the batch,
/// 4. the base transaction.
///
/// The base transaction is only ever read.
pub struct OverlayBatch<'a, T> {
    base: &'a T,
    staging: MemRwTx,
    deleted: BTreeMap<String, BTreeSet<Vec<u8>>>,
    cleared: BTreeSet<String>,
    snapshots: Mutex<HashMap<u64, Arc<OverlayBatch<'a, T>>>>,
}

impl<'a, T: Tx> OverlayBatch<'a, T> {
    /// Creates an empty batch reading from `base`.
    pub fn new(base: &'a T) -> Self {
        Self {
            base,
            staging: MemDb::new().begin_rw(),
            deleted: BTreeMap::new(),
            cleared: BTreeSet::new(),
            snapshots: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `table` has been cleared in this batch.
    pub fn is_table_cleared(&self, table: &str) -> bool {
        self.cleared.contains(table)
    }

    /// Whether a delete of `key` is recorded in this batch.
    pub fn is_entry_deleted(&self, table: &str, key: &[u8]) -> bool {
        self.deleted
            .get(table)
            .is_some_and(|keys| keys.contains(key))
    }

    /// Ids of the snapshots that have not been flushed yet, in ascending order.
    pub fn snapshot_ids(&self) -> Vec<u64> {
        let mut ids = self.snapshots.lock().keys().copied().collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    /// Freezes a copy of the pending changes under `id`.
    ///
    /// Later changes to the batch are not visible in the snapshot.
    pub fn snapshot(&self, id: u64) -> Result<()> {
        if self.snapshots.lock().contains_key(&id) {
            return Err(Error::DuplicateSnapshot(id));
        }

        let copy = self.duplicate()?;

        match self.snapshots.lock().entry(id) {
            Entry::Occupied(_) => return Err(Error::DuplicateSnapshot(id)),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(copy));
            }
        }

        tracing::debug!("Created overlay snapshot {id}");

        Ok(())
    }

    /// Applies snapshot `id` to `target` and forgets it.
    ///
    /// If applying fails the snapshot is kept, so the flush can be retried
    /// against a fresh target.
    pub fn snapshot_flush<W: RwTx>(&self, id: u64, target: &mut W) -> Result<()> {
        let snapshot = self
            .snapshots
            .lock()
            .get(&id)
            .cloned()
            .ok_or(Error::UnknownSnapshot(id))?;

        snapshot
            .apply(target)
            .map_err(|source| Error::Flush { id, source })?;

        self.snapshots.lock().remove(&id);

        tracing::debug!("Flushed overlay snapshot {id}");

        Ok(())
    }

    /// Applies the pending changes of the batch itself to `target`.
    ///
    /// Table clears go first, then deletes, then writes.
    pub fn flush<W: RwTx>(&self, target: &mut W) -> Result<()> {
        self.apply(target)?;
        Ok(())
    }

    fn apply<W: RwTx>(&self, target: &mut W) -> subcoin_kv::Result<()> {
        for table in &self.cleared {
            target.clear_table(table)?;
        }

        let mut deletes = 0usize;
        for (table, keys) in &self.deleted {
            for key in keys {
                target.delete(table, key)?;
                deletes += 1;
            }
        }

        let mut writes = 0usize;
        for table in self.staging.list_tables()? {
            let mut cursor = self.staging.cursor(&table)?;
            let mut entry = cursor.first()?;
            while let Some((key, value)) = entry {
                target.put(&table, &key, &value)?;
                writes += 1;
                entry = cursor.next()?;
            }
        }

        tracing::trace!(
            "Applied overlay batch: {} cleared tables, {deletes} deletes, {writes} writes",
            self.cleared.len()
        );

        Ok(())
    }

    /// Deep copy of the pending changes over the same base, without snapshots.
    fn duplicate(&self) -> subcoin_kv::Result<Self> {
        let mut staging = MemDb::new().begin_rw();
        for table in self.staging.list_tables()? {
            let mut cursor = self.staging.cursor(&table)?;
            let mut entry = cursor.first()?;
            while let Some((key, value)) = entry {
                staging.put(&table, &key, &value)?;
                entry = cursor.next()?;
            }
        }

        Ok(Self {
            base: self.base,
            staging,
            deleted: self.deleted.clone(),
            cleared: self.cleared.clone(),
            snapshots: Mutex::new(HashMap::new()),
        })
    }
}

impl<'a, T: Tx> Tx for OverlayBatch<'a, T> {
    type Cursor<'c>
        = OverlayCursor<'c, T::Cursor<'c>>
    where
        Self: 'c;

    fn cursor(&self, table: &str) -> subcoin_kv::Result<Self::Cursor<'_>> {
        let base = if self.cleared.contains(table) {
            None
        } else {
            Some(self.base.cursor(table)?)
        };
        let staged = self.staging.cursor(table)?;
        Ok(OverlayCursor::new(base, staged, self.deleted.get(table)))
    }

    fn get(&self, table: &str, key: &[u8]) -> subcoin_kv::Result<Option<Vec<u8>>> {
        if self.is_entry_deleted(table, key) {
            return Ok(None);
        }
        if let Some(value) = self.staging.get(table, key)? {
            return Ok(Some(value));
        }
        if self.cleared.contains(table) {
            return Ok(None);
        }
        self.base.get(table, key)
    }

    fn list_tables(&self) -> subcoin_kv::Result<Vec<String>> {
        let staged = self.staging.list_tables()?;
        let mut tables = self
            .base
            .list_tables()?
            .into_iter()
            .filter(|table| !self.cleared.contains(table))
            .collect::<BTreeSet<_>>();
        tables.extend(staged);
        Ok(tables.into_iter().collect())
    }
}

impl<'a, T: Tx> RwTx for OverlayBatch<'a, T> {
    fn put(&mut self, table: &str, key: &[u8], value: &[u8]) -> subcoin_kv::Result<()> {
        if let Some(keys) = self.deleted.get_mut(table) {
            keys.remove(key);
            if keys.is_empty() {
                self.deleted.remove(table);
            }
        }
        self.staging.put(table, key, value)
    }

    fn delete(&mut self, table: &str, key: &[u8]) -> subcoin_kv::Result<()> {
        self.deleted
            .entry(table.to_string())
            .or_default()
            .insert(key.to_vec());
        self.staging.delete(table, key)
    }

    fn clear_table(&mut self, table: &str) -> subcoin_kv::Result<()> {
        self.cleared.insert(table.to_string());
        self.deleted.remove(table);
        self.staging.clear_table(table)
    }
}
