//! Splitting integer sets into page-bounded chunks and storing them as a key series.
//!
//! A series under `prefix` is a run of rows keyed `prefix ++ BE(upper)`, where
//! `upper` is the largest value of the chunk, or [`Element::MAX`] for the last
//! chunk. Values are the native roaring serialization of each chunk.

use crate::int_set::{Element, IntSet};
use crate::options::ChunkOptions;
use crate::pool::BitmapPool;
use crate::walk::walk;
use crate::Result;
use subcoin_kv::{Cursor, RwTx, Tx};

/// Builds the key of the chunk of `prefix` whose upper bound is `upper`.
pub fn chunk_key<E: Element>(prefix: &[u8], upper: E) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + E::WIDTH);
    key.extend_from_slice(prefix);
    upper.write_be(&mut key);
    key
}

/// Reads and writes chunked series of `B` sets.
pub struct ChunkStore<B: IntSet> {
    size_limit: u64,
    pool: BitmapPool<B>,
}

impl<B: IntSet> Default for ChunkStore<B> {
    fn default() -> Self {
        Self::new(&ChunkOptions::default())
    }
}

impl<B: IntSet> ChunkStore<B> {
    pub fn new(options: &ChunkOptions) -> Self {
        Self::with_limit(options.chunk_limit())
    }

    /// Creates a store whose chunks serialize to at most `size_limit` bytes.
    pub fn with_limit(size_limit: u64) -> Self {
        Self {
            size_limit: size_limit.max(1),
            pool: BitmapPool::new(),
        }
    }

    pub fn size_limit(&self) -> u64 {
        self.size_limit
    }

    pub fn pool(&self) -> &BitmapPool<B> {
        &self.pool
    }

    /// Removes and returns the longest prefix of `set` (in value order) whose
    /// serialization fits in the size limit.
    ///
    /// Returns `None` for an empty set. If the minimum alone exceeds the limit
    /// it is returned as a one-element chunk, so repeated calls always drain
    /// the set.
    pub fn cut_left(&self, set: &mut B) -> Option<B> {
        let (min, max) = (set.min()?, set.max()?);

        if set.serialized_size() <= self.size_limit {
            let chunk = set.clone();
            set.clear();
            return Some(chunk);
        }

        let from = min.to_u64();
        let span = max.to_u64() - from;

        // Smallest offset whose inclusive prefix no longer fits; `span` if none.
        let mut lo: u64 = 0;
        let mut hi = span;
        let mut probe = self.pool.acquire();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            probe.clear();
            probe.extend_prefix(set, B::Element::from_u64(from + mid));
            if probe.serialized_size() > self.size_limit {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        self.pool.release(probe);

        // `lo <= span`, so `end` never passes `max`. A minimum that alone
        // exceeds the limit is still cut on its own.
        let end = B::Element::from_u64(from + lo.saturating_sub(1));
        let mut chunk = B::default();
        chunk.extend_prefix(set, end);
        set.remove_range(min..=end);

        Some(chunk)
    }

    /// Drains `set` chunk by chunk, passing each chunk and whether it is the last.
    ///
    /// Stops at the first error returned by `visit`.
    pub fn walk_chunks<E, F>(&self, set: &mut B, mut visit: F) -> std::result::Result<(), E>
    where
        F: FnMut(B, bool) -> std::result::Result<(), E>,
    {
        while let Some(chunk) = self.cut_left(set) {
            visit(chunk, set.is_empty())?;
        }
        Ok(())
    }

    /// Like [`ChunkStore::walk_chunks`] but also passes the storage key of each chunk.
    pub fn walk_chunk_with_keys<E, F>(
        &self,
        prefix: &[u8],
        set: &mut B,
        mut visit: F,
    ) -> std::result::Result<(), E>
    where
        F: FnMut(Vec<u8>, B) -> std::result::Result<(), E>,
    {
        self.walk_chunks(set, |chunk, is_last| {
            // `cut_left` never yields an empty chunk.
            let upper = match chunk.max() {
                Some(max) if !is_last => max,
                _ => B::Element::MAX,
            };
            visit(chunk_key(prefix, upper), chunk)
        })
    }

    /// Writes `set` as a chunk series under `prefix`.
    ///
    /// Existing rows of the series are overwritten only where keys coincide;
    /// use [`ChunkStore::truncate_range`] to drop stale rows first.
    pub fn put<T: RwTx>(&self, tx: &mut T, table: &str, prefix: &[u8], set: &B) -> Result<()> {
        let mut remaining = set.clone();
        let mut chunks = 0usize;

        self.walk_chunk_with_keys(prefix, &mut remaining, |key, chunk| {
            let mut value = Vec::with_capacity(chunk.serialized_size() as usize);
            chunk.serialize_into(&mut value)?;
            tx.put(table, &key, &value)?;
            chunks += 1;
            Ok::<_, crate::Error>(())
        })?;

        tracing::trace!(
            "Wrote {chunks} chunks ({} values) under prefix {} in {table}",
            set.len(),
            hex::encode(prefix),
        );

        Ok(())
    }

    /// Reads the union of all chunks of `prefix` that may hold values in `from..=to`.
    ///
    /// The result can contain values outside the range that share a chunk with
    /// values inside it.
    pub fn get<T: Tx>(
        &self,
        tx: &T,
        table: &str,
        prefix: &[u8],
        from: B::Element,
        to: B::Element,
    ) -> Result<B> {
        let key_len = prefix.len() + <B::Element as Element>::WIDTH;
        let mut result = B::default();

        let mut cursor = tx.cursor(table)?;
        let mut entry = cursor.seek(&chunk_key(prefix, from))?;
        while let Some((key, value)) = entry {
            if !key.starts_with(prefix) {
                break;
            }
            // Longer prefixes sharing our leading bytes belong to another series.
            if key.len() == key_len {
                result.union_with(&B::deserialize_from(&value)?);
                match B::Element::read_be(&key[prefix.len()..]) {
                    Some(upper) if upper >= to => break,
                    _ => {}
                }
            }
            entry = cursor.next()?;
        }

        Ok(result)
    }

    /// Reads the whole series under `prefix`.
    pub fn get_all<T: Tx>(&self, tx: &T, table: &str, prefix: &[u8]) -> Result<B> {
        self.get(tx, table, prefix, B::Element::from_u64(0), B::Element::MAX)
    }

    /// Removes every value greater than or equal to `to` from the series under `prefix`.
    ///
    /// Rows from the first chunk that may hold `to` onwards are deleted before
    /// the surviving values of those chunks are written back.
    ///
    /// When nothing survives in those chunks, for example when `to` falls in
    /// the gap below a chunk's minimum, no sentinel row is written and the
    /// series ends on the previous chunk's own key. Reads are unaffected, and
    /// the next [`ChunkStore::put`] of the series writes the sentinel again.
    pub fn truncate_range<T: RwTx>(
        &self,
        tx: &mut T,
        table: &str,
        prefix: &[u8],
        to: B::Element,
    ) -> Result<()> {
        let mut remainder = self.get(&*tx, table, prefix, to, B::Element::MAX)?;
        remainder.remove_range(to..=B::Element::MAX);

        let key_len = prefix.len() + <B::Element as Element>::WIDTH;
        let mut stale = Vec::new();
        {
            let mut cursor = tx.cursor(table)?;
            walk(&mut cursor, &chunk_key(prefix, to), prefix.len() * 8, |key, _| {
                if key.len() == key_len {
                    stale.push(key.to_vec());
                }
                Ok(true)
            })?;
        }

        for key in &stale {
            tx.delete(table, key)?;
        }
        self.put(tx, table, prefix, &remainder)?;

        tracing::debug!(
            "Truncated {} at {to:?} in {table}: {} stale chunks, {} values kept from them",
            hex::encode(prefix),
            stale.len(),
            remainder.len(),
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roaring::{RoaringBitmap, RoaringTreemap};

    fn bitmap(values: &[u32]) -> RoaringBitmap {
        values.iter().copied().collect()
    }

    #[test]
    fn test_chunk_key_layout() {
        assert_eq!(chunk_key(b"ab", 0x0102_0304u32), b"ab\x01\x02\x03\x04".to_vec());
        assert_eq!(chunk_key(b"", u64::MAX), vec![0xff; 8]);
    }

    #[test]
    fn test_cut_left_empty_set() {
        let store = ChunkStore::<RoaringBitmap>::with_limit(100);
        assert!(store.cut_left(&mut RoaringBitmap::new()).is_none());
    }

    #[test]
    fn test_cut_left_whole_set_fits() {
        let store = ChunkStore::<RoaringBitmap>::with_limit(1024);
        let mut set = bitmap(&[1, 2, 3]);
        assert_eq!(store.cut_left(&mut set), Some(bitmap(&[1, 2, 3])));
        assert!(set.is_empty());
    }

    #[test]
    fn test_cut_left_splits_at_container_boundary() {
        let head = bitmap(&[10, 20, 30]);
        let store = ChunkStore::<RoaringBitmap>::with_limit(IntSet::serialized_size(&head));

        let mut set = bitmap(&[10, 20, 30, 1_000_000]);
        assert_eq!(store.cut_left(&mut set), Some(head));
        assert_eq!(set, bitmap(&[1_000_000]));
        // The probe bitmap went back to the pool.
        assert_eq!(store.pool().idle(), 1);
    }

    #[test]
    fn test_cut_left_always_makes_progress() {
        let store = ChunkStore::<RoaringTreemap>::with_limit(1);
        let mut set: RoaringTreemap = [5u64, 6, 7].into_iter().collect();

        let first = store.cut_left(&mut set).unwrap();
        assert_eq!(first.iter().collect::<Vec<_>>(), vec![5]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_cut_left_oversized_max_element() {
        let store = ChunkStore::<RoaringBitmap>::with_limit(4);

        let mut set = bitmap(&[u32::MAX]);
        assert_eq!(store.cut_left(&mut set), Some(bitmap(&[u32::MAX])));
        assert!(set.is_empty());

        let mut set = bitmap(&[7, u32::MAX]);
        assert_eq!(store.cut_left(&mut set), Some(bitmap(&[7])));
        assert_eq!(store.cut_left(&mut set), Some(bitmap(&[u32::MAX])));
        assert!(store.cut_left(&mut set).is_none());

        let store = ChunkStore::<RoaringTreemap>::with_limit(4);
        let mut set: RoaringTreemap = [u64::MAX].into_iter().collect();
        let chunk = store.cut_left(&mut set).unwrap();
        assert_eq!(chunk.iter().collect::<Vec<_>>(), vec![u64::MAX]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_walk_chunk_with_keys_keeps_max_element() {
        let store = ChunkStore::<RoaringBitmap>::with_limit(4);
        let mut set = bitmap(&[7, u32::MAX]);

        let mut written = Vec::new();
        store
            .walk_chunk_with_keys(b"p", &mut set, |key, chunk| {
                written.push((key, chunk));
                Ok::<_, ()>(())
            })
            .unwrap();

        assert_eq!(
            written,
            vec![
                (chunk_key(b"p", 7u32), bitmap(&[7])),
                (chunk_key(b"p", u32::MAX), bitmap(&[u32::MAX])),
            ]
        );
    }

    #[test]
    fn test_walk_chunks_flags_last_chunk() {
        let store = ChunkStore::<RoaringBitmap>::with_limit(64);
        let mut set: RoaringBitmap = (0..2000u32).map(|v| v * 7).collect();
        let expected = set.clone();

        let mut flags = Vec::new();
        let mut merged = RoaringBitmap::new();
        store
            .walk_chunks(&mut set, |chunk, is_last| {
                assert!(IntSet::serialized_size(&chunk) <= 64);
                merged |= &chunk;
                flags.push(is_last);
                Ok::<_, ()>(())
            })
            .unwrap();

        assert!(set.is_empty());
        assert_eq!(merged, expected);
        assert!(flags.len() > 1);
        assert_eq!(flags.iter().filter(|last| **last).count(), 1);
        assert_eq!(flags.last(), Some(&true));
    }

    #[test]
    fn test_walk_chunks_stops_on_visitor_error() {
        let store = ChunkStore::<RoaringBitmap>::with_limit(64);
        let mut set: RoaringBitmap = (0..2000u32).collect();

        let mut visited = 0;
        let result = store.walk_chunks(&mut set, |_, _| {
            visited += 1;
            Err("stop")
        });
        assert_eq!(result, Err("stop"));
        assert_eq!(visited, 1);
        assert!(!set.is_empty());
    }

    #[test]
    fn test_walk_chunk_with_keys_uses_sentinel_for_last() {
        let store = ChunkStore::<RoaringBitmap>::with_limit(64);
        let mut set: RoaringBitmap = (0..500u32).collect();

        let mut keys = Vec::new();
        store
            .walk_chunk_with_keys(b"p", &mut set, |key, chunk| {
                keys.push((key, chunk.max().unwrap()));
                Ok::<_, ()>(())
            })
            .unwrap();

        let (last_key, _) = keys.pop().unwrap();
        assert_eq!(last_key, chunk_key(b"p", u32::MAX));
        for (key, max) in keys {
            assert_eq!(key, chunk_key(b"p", max));
        }
    }
}
