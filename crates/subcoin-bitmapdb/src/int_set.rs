//! Integer set abstraction over the roaring bitmap family.
//!
//! The chunk store is written once against [`IntSet`]; the 32-bit variant is
//! backed by [`RoaringBitmap`] and the 64-bit variant by [`RoaringTreemap`].

use roaring::{RoaringBitmap, RoaringTreemap};
use std::fmt::Debug;
use std::io;
use std::ops::RangeInclusive;

/// Element type of an [`IntSet`], encoded big-endian in chunk keys.
pub trait Element: Copy + Ord + Debug + Send + Sync + 'static {
    /// Number of bytes of the big-endian encoding.
    const WIDTH: usize;

    /// All bits set. Used as the upper bound of the last chunk in a series.
    const MAX: Self;

    fn to_u64(self) -> u64;

    /// Convert back from `u64`, saturating at [`Element::MAX`].
    fn from_u64(value: u64) -> Self;

    fn write_be(self, out: &mut Vec<u8>);

    /// Decode from exactly [`Element::WIDTH`] big-endian bytes.
    fn read_be(bytes: &[u8]) -> Option<Self>;
}

macro_rules! impl_element {
    ($ty:ty) => {
        impl Element for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            const MAX: Self = <$ty>::MAX;

            fn to_u64(self) -> u64 {
                u64::from(self)
            }

            fn from_u64(value: u64) -> Self {
                <$ty>::try_from(value).unwrap_or(<$ty>::MAX)
            }

            fn write_be(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_be_bytes());
            }

            fn read_be(bytes: &[u8]) -> Option<Self> {
                bytes.try_into().ok().map(<$ty>::from_be_bytes)
            }
        }
    };
}

impl_element!(u32);
impl_element!(u64);

/// Ordered, duplicate-free set of unsigned integers with a compact binary encoding.
pub trait IntSet: Clone + Default + Debug + Send {
    type Element: Element;

    /// Cardinality.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool;

    fn min(&self) -> Option<Self::Element>;

    fn max(&self) -> Option<Self::Element>;

    fn contains(&self, value: Self::Element) -> bool;

    fn clear(&mut self);

    /// Remove all values in `range`, returning how many were removed.
    fn remove_range(&mut self, range: RangeInclusive<Self::Element>) -> u64;

    /// In-place union.
    fn union_with(&mut self, other: &Self);

    /// Inserts every value of `other` that is less than or equal to `end`.
    ///
    /// Only the values up to `end` are visited.
    fn extend_prefix(&mut self, other: &Self, end: Self::Element);

    /// Number of values less than or equal to `value`.
    fn rank(&self, value: Self::Element) -> u64;

    /// The `n`-th smallest value (0-based).
    fn select(&self, n: u64) -> Option<Self::Element>;

    /// Exact size in bytes of [`IntSet::serialize_into`] output.
    fn serialized_size(&self) -> u64;

    fn serialize_into(&self, out: &mut Vec<u8>) -> io::Result<()>;

    fn deserialize_from(bytes: &[u8]) -> io::Result<Self>;
}

impl IntSet for RoaringBitmap {
    type Element = u32;

    fn len(&self) -> u64 {
        RoaringBitmap::len(self)
    }

    fn is_empty(&self) -> bool {
        RoaringBitmap::is_empty(self)
    }

    fn min(&self) -> Option<u32> {
        RoaringBitmap::min(self)
    }

    fn max(&self) -> Option<u32> {
        RoaringBitmap::max(self)
    }

    fn contains(&self, value: u32) -> bool {
        RoaringBitmap::contains(self, value)
    }

    fn clear(&mut self) {
        RoaringBitmap::clear(self)
    }

    fn remove_range(&mut self, range: RangeInclusive<u32>) -> u64 {
        RoaringBitmap::remove_range(self, range)
    }

    fn union_with(&mut self, other: &Self) {
        *self |= other;
    }

    fn extend_prefix(&mut self, other: &Self, end: u32) {
        self.extend(other.iter().take_while(|value| *value <= end));
    }

    fn rank(&self, value: u32) -> u64 {
        RoaringBitmap::rank(self, value)
    }

    fn select(&self, n: u64) -> Option<u32> {
        u32::try_from(n)
            .ok()
            .and_then(|n| RoaringBitmap::select(self, n))
    }

    fn serialized_size(&self) -> u64 {
        RoaringBitmap::serialized_size(self) as u64
    }

    fn serialize_into(&self, out: &mut Vec<u8>) -> io::Result<()> {
        RoaringBitmap::serialize_into(self, out)
    }

    fn deserialize_from(bytes: &[u8]) -> io::Result<Self> {
        RoaringBitmap::deserialize_from(bytes)
    }
}

impl IntSet for RoaringTreemap {
    type Element = u64;

    fn len(&self) -> u64 {
        RoaringTreemap::len(self)
    }

    fn is_empty(&self) -> bool {
        RoaringTreemap::is_empty(self)
    }

    fn min(&self) -> Option<u64> {
        RoaringTreemap::min(self)
    }

    fn max(&self) -> Option<u64> {
        RoaringTreemap::max(self)
    }

    fn contains(&self, value: u64) -> bool {
        RoaringTreemap::contains(self, value)
    }

    fn clear(&mut self) {
        RoaringTreemap::clear(self)
    }

    fn remove_range(&mut self, range: RangeInclusive<u64>) -> u64 {
        RoaringTreemap::remove_range(self, range)
    }

    fn union_with(&mut self, other: &Self) {
        *self |= other;
    }

    fn extend_prefix(&mut self, other: &Self, end: u64) {
        self.extend(other.iter().take_while(|value| *value <= end));
    }

    fn rank(&self, value: u64) -> u64 {
        RoaringTreemap::rank(self, value)
    }

    fn select(&self, n: u64) -> Option<u64> {
        RoaringTreemap::select(self, n)
    }

    fn serialized_size(&self) -> u64 {
        RoaringTreemap::serialized_size(self) as u64
    }

    fn serialize_into(&self, out: &mut Vec<u8>) -> io::Result<()> {
        RoaringTreemap::serialize_into(self, out)
    }

    fn deserialize_from(bytes: &[u8]) -> io::Result<Self> {
        RoaringTreemap::deserialize_from(bytes)
    }
}

/// Returns the smallest value in `set` that is greater than or equal to `n`.
pub fn seek_in_bitmap<B: IntSet>(set: &B, n: B::Element) -> Option<B::Element> {
    if set.is_empty() {
        return None;
    }
    let n = n.to_u64();
    if n == 0 {
        return set.min();
    }
    let below = set.rank(B::Element::from_u64(n - 1));
    if below >= set.len() {
        return None;
    }
    set.select(below)
}
