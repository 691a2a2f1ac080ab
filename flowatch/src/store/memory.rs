use flowatch_core::snapshot::Snapshot;

use super::{SnapshotStore, StoreError};

/// Non-durable store for tests and ephemeral runs.
pub struct MemoryStore {
    snapshot: Option<Snapshot>,
}

impl MemoryStore {
    pub fn new(snapshot: Option<Snapshot>) -> Self {
        Self { snapshot }
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.snapshot.clone())
    }

    fn commit(&mut self, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.snapshot = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::build_snapshot;

    #[test]
    fn test_commit_then_load() {
        // Given
        let mut store = MemoryStore::new(None);
        assert!(store.load().unwrap().is_none());

        // When
        let snapshot = build_snapshot(1, &[("1", Some("1"), "a.txt", None)]);
        store.commit(&snapshot).unwrap();

        // Then
        assert_eq!(store.load().unwrap(), Some(snapshot));
    }
}
