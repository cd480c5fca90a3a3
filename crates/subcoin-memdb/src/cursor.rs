use std::cmp::Ordering;
use std::collections::BTreeSet;
use subcoin_kv::{Cursor, KeyValue, MemCursor, Result};

/// Ordered view of one table through an [`OverlayBatch`](crate::OverlayBatch).
///
/// Merges the base cursor with the staged entries: staged values shadow base
/// values under the same key, deleted keys are skipped and a cleared table
/// contributes no base entries at all.
pub struct OverlayCursor<'c, C> {
    /// `None` when the table has been cleared in the batch.
    base: Option<C>,
    staged: MemCursor<'c>,
    deleted: Option<&'c BTreeSet<Vec<u8>>>,
    base_head: Option<KeyValue>,
    staged_head: Option<KeyValue>,
    positioned: bool,
}

impl<'c, C: Cursor> OverlayCursor<'c, C> {
    pub(crate) fn new(
        base: Option<C>,
        staged: MemCursor<'c>,
        deleted: Option<&'c BTreeSet<Vec<u8>>>,
    ) -> Self {
        Self {
            base,
            staged,
            deleted,
            base_head: None,
            staged_head: None,
            positioned: false,
        }
    }

    /// Advances the base cursor past deleted keys.
    fn skip_deleted(&mut self, mut entry: Option<KeyValue>) -> Result<Option<KeyValue>> {
        let (Some(base), Some(deleted)) = (self.base.as_mut(), self.deleted) else {
            return Ok(entry);
        };
        while let Some((key, _)) = &entry {
            if !deleted.contains(key) {
                break;
            }
            entry = base.next()?;
        }
        Ok(entry)
    }

    fn current(&self) -> Option<KeyValue> {
        match (&self.base_head, &self.staged_head) {
            (None, None) => None,
            (Some(base), None) => Some(base.clone()),
            (None, Some(staged)) => Some(staged.clone()),
            (Some(base), Some(staged)) => match base.0.cmp(&staged.0) {
                Ordering::Less => Some(base.clone()),
                Ordering::Equal | Ordering::Greater => Some(staged.clone()),
            },
        }
    }
}

impl<C: Cursor> Cursor for OverlayCursor<'_, C> {
    fn first(&mut self) -> Result<Option<KeyValue>> {
        let base = match self.base.as_mut() {
            Some(base) => base.first()?,
            None => None,
        };
        self.base_head = self.skip_deleted(base)?;
        self.staged_head = self.staged.first()?;
        self.positioned = true;
        Ok(self.current())
    }

    fn seek(&mut self, key: &[u8]) -> Result<Option<KeyValue>> {
        let base = match self.base.as_mut() {
            Some(base) => base.seek(key)?,
            None => None,
        };
        self.base_head = self.skip_deleted(base)?;
        self.staged_head = self.staged.seek(key)?;
        self.positioned = true;
        Ok(self.current())
    }

    fn next(&mut self) -> Result<Option<KeyValue>> {
        if !self.positioned {
            return self.first();
        }
        let Some((key, _)) = self.current() else {
            return Ok(None);
        };

        if self.base_head.as_ref().is_some_and(|(head, _)| *head == key) {
            let base = match self.base.as_mut() {
                Some(base) => base.next()?,
                None => None,
            };
            self.base_head = self.skip_deleted(base)?;
        }
        if self.staged_head.as_ref().is_some_and(|(head, _)| *head == key) {
            self.staged_head = self.staged.next()?;
        }

        Ok(self.current())
    }
}
