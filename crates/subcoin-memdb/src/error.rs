/// Errors that can occur while managing overlay batches and their snapshots.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Snapshot {0} already exists")]
    DuplicateSnapshot(u64),

    #[error("Snapshot {0} does not exist")]
    UnknownSnapshot(u64),

    #[error(transparent)]
    Store(#[from] subcoin_kv::Error),

    /// Applying a snapshot to the target failed; the snapshot is kept for a retry.
    #[error("Failed to flush snapshot {id}: {source}")]
    Flush {
        id: u64,
        #[source]
        source: subcoin_kv::Error,
    },
}
