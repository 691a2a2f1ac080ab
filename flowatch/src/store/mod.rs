use flowatch_core::snapshot::Snapshot;
use mockall::automock;
use thiserror::Error;

pub mod disk;
pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Corrupted snapshot store: {0}")]
    Corrupted(String),
    #[error("Unexpected error: {0:#}")]
    Unexpected(#[from] anyhow::Error),
}

/// Durable home of the last committed snapshot. `commit` is the cycle's
/// single commit point: it either fully replaces the previous snapshot or
/// leaves it untouched, so a crash at any moment leaves the store with
/// exactly one valid snapshot (or none, before the first commit).
#[automock]
pub trait SnapshotStore {
    /// The last committed snapshot, or `None` on first run.
    fn load(&self) -> Result<Option<Snapshot>, StoreError>;
    fn commit(&mut self, snapshot: &Snapshot) -> Result<(), StoreError>;
}
