use flowatch_core::{entry::Entry, types::EntryId};

/// One observed difference between two consecutive snapshots. Events carry
/// the full entries involved so sinks never have to re-query the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Added(Entry),
    /// The id and the entry as it was last observed before it disappeared.
    Removed(EntryId, Entry),
    Modified {
        id: EntryId,
        old: Entry,
        new: Entry,
    },
}

impl ChangeEvent {
    pub fn entry_id(&self) -> &EntryId {
        match self {
            ChangeEvent::Added(entry) => entry.id(),
            ChangeEvent::Removed(id, _) => id,
            ChangeEvent::Modified { id, .. } => id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChangeEvent::Added(_) => "added",
            ChangeEvent::Removed(_, _) => "removed",
            ChangeEvent::Modified { .. } => "modified",
        }
    }

    /// One-line human description, used by the log sink and delivery
    /// failure reports.
    pub fn describe(&self) -> String {
        match self {
            ChangeEvent::Added(entry) => format!(
                "added {} '{}' ({})",
                entry.kind(),
                entry.name(),
                entry.id()
            ),
            ChangeEvent::Removed(id, last_known) => format!(
                "removed {} '{}' ({})",
                last_known.kind(),
                last_known.name(),
                id
            ),
            ChangeEvent::Modified { id, old, new } => {
                if old.name() != new.name() {
                    format!("modified '{}' -> '{}' ({})", old.name(), new.name(), id)
                } else {
                    format!("modified {} '{}' ({})", new.kind(), new.name(), id)
                }
            }
        }
    }
}
