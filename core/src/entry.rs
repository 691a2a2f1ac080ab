use anyhow::{bail, Result};

use crate::client::RemoteEntry;
use crate::types::{EntryId, EntryKind, EntryName, Revision};

/// One file or folder observed in the watched tree. `id` is the remote
/// store's stable identifier and stays valid across renames and moves;
/// everything else is the last observed value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    id: EntryId,
    name: EntryName,
    revision: Option<Revision>,
    parent_id: Option<EntryId>,
    kind: EntryKind,
}

impl Entry {
    pub fn new(
        id: EntryId,
        name: EntryName,
        revision: Option<Revision>,
        parent_id: Option<EntryId>,
        kind: EntryKind,
    ) -> Result<Self> {
        if let Some(parent_id) = &parent_id {
            if parent_id == &id {
                bail!(format!("Entry {} parent_id cannot reference itself", id))
            }
        }

        Ok(Self {
            id,
            name,
            revision,
            parent_id,
            kind,
        })
    }

    /// `parent_id` is supplied by the caller: the remote listing is made
    /// folder by folder, so the containing folder is known from context.
    /// `None` means a direct child of the watched root.
    pub fn from_remote(value: &RemoteEntry, parent_id: Option<EntryId>) -> Result<Self> {
        Self::new(
            value.id.clone(),
            EntryName(value.name.clone()),
            value.version.clone(),
            parent_id,
            EntryKind::from_mime(&value.mime_type),
        )
    }

    pub fn id(&self) -> &EntryId {
        &self.id
    }

    pub fn name(&self) -> &EntryName {
        &self.name
    }

    pub fn revision(&self) -> Option<&Revision> {
        self.revision.as_ref()
    }

    pub fn parent_id(&self) -> Option<&EntryId> {
        self.parent_id.as_ref()
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }
}
