//! Reusable scratch bitmaps.

use crate::IntSet;
use parking_lot::Mutex;

/// A pool of bitmap instances that can be reused across operations.
///
/// [`BitmapPool::acquire`] always hands out an empty instance. Releasing moves
/// the instance into the pool; instances beyond the pool capacity are dropped.
pub struct BitmapPool<B> {
    free: Mutex<Vec<B>>,
    capacity: usize,
}

impl<B: IntSet> BitmapPool<B> {
    /// Maximum number of idle instances retained by [`BitmapPool::new`].
    pub const DEFAULT_CAPACITY: usize = 16;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Take an empty bitmap from the pool, allocating one if none is idle.
    pub fn acquire(&self) -> B {
        let mut bitmap = self.free.lock().pop().unwrap_or_default();
        bitmap.clear();
        bitmap
    }

    /// Hand a bitmap back to the pool.
    pub fn release(&self, bitmap: B) {
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(bitmap);
        }
    }

    /// Number of instances currently waiting in the pool.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

impl<B: IntSet> Default for BitmapPool<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roaring::RoaringBitmap;

    #[test]
    fn test_acquired_bitmap_is_always_empty() {
        let pool = BitmapPool::<RoaringBitmap>::new();
        let mut bitmap = pool.acquire();
        bitmap.insert_range(0..1000);
        pool.release(bitmap);
        assert_eq!(pool.idle(), 1);

        let reused = pool.acquire();
        assert!(reused.is_empty());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_pool_capacity_is_bounded() {
        let pool = BitmapPool::<RoaringBitmap>::with_capacity(2);
        for _ in 0..5 {
            pool.release(RoaringBitmap::new());
        }
        assert_eq!(pool.idle(), 2);
    }
}
