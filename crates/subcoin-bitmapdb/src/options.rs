//! Chunk sizing configuration.

/// Page size of the underlying store.
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

/// Per-chunk key and row header overhead reserved inside a page.
pub const DEFAULT_KEY_OVERHEAD: u64 = 98;

/// Default serialized size limit of a chunk.
///
/// Half a page minus the key overhead, so that two chunks fit in one page and
/// no chunk spills into overflow pages.
pub const DEFAULT_CHUNK_LIMIT: u64 = DEFAULT_PAGE_SIZE / 2 - DEFAULT_KEY_OVERHEAD;

/// Configuration options for the bitmap chunk store.
#[derive(Clone, Debug)]
pub struct ChunkOptions {
    /// Page size of the underlying store in bytes (default: 4096)
    pub page_size: u64,

    /// Bytes reserved per chunk for the key and row header (default: 98)
    pub key_overhead: u64,

    /// Explicit chunk size limit, overriding the page-derived one
    pub size_limit: Option<u64>,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            key_overhead: DEFAULT_KEY_OVERHEAD,
            size_limit: None,
        }
    }
}

impl ChunkOptions {
    /// Create new chunk options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for configuring chunk options
    pub fn builder() -> ChunkOptionsBuilder {
        ChunkOptionsBuilder::default()
    }

    /// Maximum serialized size of a single chunk in bytes.
    pub fn chunk_limit(&self) -> u64 {
        self.size_limit
            .unwrap_or_else(|| (self.page_size / 2).saturating_sub(self.key_overhead))
            .max(1)
    }
}

/// Builder pattern for ChunkOptions
#[derive(Default)]
pub struct ChunkOptionsBuilder {
    options: ChunkOptions,
}

impl ChunkOptionsBuilder {
    /// Set the page size of the underlying store
    pub fn page_size(mut self, page_size: u64) -> Self {
        self.options.page_size = page_size;
        self
    }

    /// Set the per-chunk key overhead
    pub fn key_overhead(mut self, key_overhead: u64) -> Self {
        self.options.key_overhead = key_overhead;
        self
    }

    /// Set an explicit chunk size limit
    pub fn size_limit(mut self, size_limit: u64) -> Self {
        self.options.size_limit = Some(size_limit);
        self
    }

    /// Build the final ChunkOptions
    pub fn build(self) -> ChunkOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_options_defaults() {
        let options = ChunkOptions::default();

        assert_eq!(options.page_size, 4096);
        assert_eq!(options.key_overhead, 98);
        assert_eq!(options.chunk_limit(), 1950);
        assert_eq!(options.chunk_limit(), DEFAULT_CHUNK_LIMIT);
    }

    #[test]
    fn test_chunk_options_builder() {
        let options = ChunkOptions::builder().page_size(16384).key_overhead(192).build();
        assert_eq!(options.chunk_limit(), 8000);

        let options = ChunkOptions::builder().page_size(16384).size_limit(500).build();
        assert_eq!(options.chunk_limit(), 500);
    }

    #[test]
    fn test_chunk_limit_never_zero() {
        let options = ChunkOptions::builder().page_size(64).key_overhead(1000).build();
        assert_eq!(options.chunk_limit(), 1);
    }
}
