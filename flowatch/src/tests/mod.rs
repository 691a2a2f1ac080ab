use std::fs;
use std::path::PathBuf;

use flowatch_core::client::{EntryPage, RemoteEntry};
use flowatch_core::entry::Entry;
use flowatch_core::snapshot::Snapshot;
use flowatch_core::types::{EntryId, EntryKind, EntryName, PageToken, Revision};
use testdir::testdir;
use uuid::Uuid;

pub fn tmpdir() -> PathBuf {
    let path = testdir!().join(PathBuf::from(Uuid::new_v4().to_string()));
    fs::create_dir_all(&path).unwrap();
    path
}

pub fn entry_kind(name: &str) -> EntryKind {
    if name.ends_with(".txt") {
        EntryKind::File
    } else {
        EntryKind::Folder
    }
}

/// (id, revision, name, parent_id)
pub fn build_entry(raw: (&str, Option<&str>, &str, Option<&str>)) -> Entry {
    let (raw_id, raw_revision, raw_name, raw_parent_id) = raw;
    Entry::new(
        EntryId(raw_id.to_string()),
        EntryName(raw_name.to_string()),
        raw_revision.map(|raw_revision| Revision(raw_revision.to_string())),
        raw_parent_id.map(|raw_parent_id| EntryId(raw_parent_id.to_string())),
        entry_kind(raw_name),
    )
    .unwrap()
}

pub fn build_snapshot(cycle: u64, raw_entries: &[(&str, Option<&str>, &str, Option<&str>)]) -> Snapshot {
    Snapshot::new(
        cycle,
        raw_entries
            .iter()
            .map(|raw_entry| build_entry(*raw_entry))
            .collect(),
    )
    .unwrap()
}

/// (id, name, is_folder, version)
pub fn build_remote_entry(raw: (&str, &str, bool, Option<&str>)) -> RemoteEntry {
    let (raw_id, raw_name, is_folder, raw_version) = raw;
    let mime_type = if is_folder {
        flowatch_core::FOLDER_MIME_TYPE.to_string()
    } else {
        "application/octet-stream".to_string()
    };
    RemoteEntry {
        id: EntryId(raw_id.to_string()),
        name: raw_name.to_string(),
        mime_type,
        version: raw_version.map(|raw_version| Revision(raw_version.to_string())),
    }
}

pub fn build_page(
    raw_entries: &[(&str, &str, bool, Option<&str>)],
    next_page: Option<&str>,
) -> EntryPage {
    EntryPage {
        entries: raw_entries
            .iter()
            .map(|raw_entry| build_remote_entry(*raw_entry))
            .collect(),
        next_page: next_page.map(|token| PageToken(token.to_string())),
    }
}
