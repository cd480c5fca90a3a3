//! Chunked roaring bitmap storage.
//!
//! Large integer sets (for example the block numbers at which an account
//! changed) are split into chunks that each serialize to less than half a
//! page, and stored as a series of rows under a common key prefix:
//!
//! ```text
//! prefix ++ BE(max of chunk 0)  ->  chunk 0
//! prefix ++ BE(max of chunk 1)  ->  chunk 1
//! ...
//! prefix ++ BE(Element::MAX)    ->  last chunk
//! ```
//!
//! Keys sort in value order, so a range read seeks to the first chunk that can
//! hold the lower bound and stops after the first chunk covering the upper one.
//! The same code serves 32-bit ([`roaring::RoaringBitmap`]) and 64-bit
//! ([`roaring::RoaringTreemap`]) sets through the [`IntSet`] trait.

mod chunks;
mod error;
mod int_set;
mod options;
mod pool;
mod walk;

pub use self::chunks::{ChunkStore, chunk_key};
pub use self::error::Error;
pub use self::int_set::{Element, IntSet, seek_in_bitmap};
pub use self::options::{
    ChunkOptions, ChunkOptionsBuilder, DEFAULT_CHUNK_LIMIT, DEFAULT_KEY_OVERHEAD, DEFAULT_PAGE_SIZE,
};
pub use self::pool::BitmapPool;
pub use self::walk::{bytes_mask, walk};

/// Result type for chunk store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Chunk store over 32-bit sets.
pub type ChunkStore32 = ChunkStore<roaring::RoaringBitmap>;

/// Chunk store over 64-bit sets.
pub type ChunkStore64 = ChunkStore<roaring::RoaringTreemap>;
