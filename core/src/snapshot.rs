use std::collections::BTreeMap;

use anyhow::{bail, Result};

use crate::entry::Entry;
use crate::types::EntryId;

/// Complete observed state of the watched tree at one poll cycle. Built
/// once from a full remote enumeration, then read-only: the poll loop
/// never patches a snapshot in place.
///
/// An empty snapshot is a legitimate state (empty folder) and is not the
/// same thing as "no snapshot committed yet": that distinction is carried
/// by `Option<Snapshot>` at the store boundary.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Snapshot {
    cycle: u64,
    entries: BTreeMap<EntryId, Entry>,
}

impl Snapshot {
    pub fn new(cycle: u64, entries: Vec<Entry>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for entry in entries {
            let id = entry.id().clone();
            if map.insert(id.clone(), entry).is_some() {
                bail!(format!("Entry {} listed twice in one snapshot", id))
            }
        }

        Ok(Self {
            cycle,
            entries: map,
        })
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &EntryId) -> Option<&Entry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.entries.contains_key(id)
    }

    /// Entries in ascending id order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntryId> {
        self.entries.keys()
    }
}
