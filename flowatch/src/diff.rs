use flowatch_core::{entry::Entry, snapshot::Snapshot};

use crate::event::ChangeEvent;

/// Compare the last committed snapshot with a freshly fetched one and
/// produce the minimal ordered event sequence: removals first, then
/// additions, then modifications, each class in ascending id order. The
/// ordering is a contract: sinks and tests rely on it being independent
/// of the remote enumeration order.
///
/// A missing `previous` means first run: everything in `current` is
/// reported as added, so pre-existing remote content is not silently
/// skipped.
pub fn diff(previous: Option<&Snapshot>, current: &Snapshot) -> Vec<ChangeEvent> {
    let previous = match previous {
        Some(previous) => previous,
        None => {
            return current
                .entries()
                .cloned()
                .map(ChangeEvent::Added)
                .collect()
        }
    };

    let mut events = vec![];

    for entry in previous.entries() {
        if !current.contains(entry.id()) {
            events.push(ChangeEvent::Removed(entry.id().clone(), entry.clone()));
        }
    }

    for entry in current.entries() {
        if !previous.contains(entry.id()) {
            events.push(ChangeEvent::Added(entry.clone()));
        }
    }

    for entry in current.entries() {
        if let Some(known) = previous.get(entry.id()) {
            if changed(known, entry) {
                events.push(ChangeEvent::Modified {
                    id: entry.id().clone(),
                    old: known.clone(),
                    new: entry.clone(),
                });
            }
        }
    }

    events
}

/// Revision is authoritative: any difference (including one side missing
/// a revision) is a modification. Equal or absent revisions fall back to
/// name and parent comparison, which covers remote stores with
/// unreliable version markers and makes a move an ordinary modification.
fn changed(known: &Entry, current: &Entry) -> bool {
    if known.revision() != current.revision() {
        return true;
    }

    known.name() != current.name() || known.parent_id() != current.parent_id()
}
