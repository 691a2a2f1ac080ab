use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use rusqlite::{params, Connection};
use tempfile::NamedTempFile;

use flowatch_core::entry::Entry;
use flowatch_core::snapshot::Snapshot;
use flowatch_core::types::{EntryId, EntryKind, EntryName, Revision};

use super::{SnapshotStore, StoreError};

/// SQLite-backed snapshot store. A commit never mutates the previous
/// database: the new snapshot is written into a fresh temporary file in
/// the same directory, then renamed over the old one. The rename is the
/// commit point.
pub struct DiskStore {
    db_path: PathBuf,
}

impl DiskStore {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    fn read_snapshot(&self, connection: &Connection) -> Result<Snapshot, StoreError> {
        let cycle: i64 = connection
            .query_row("SELECT cycle FROM snapshot", [], |row| row.get(0))
            .context("Read cycle counter")?;

        let mut entries = vec![];
        let mut statement = connection
            .prepare("SELECT id, name, revision, parent_id, kind FROM entry")
            .context("Prepare entry query")?;
        let raw_entries = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .context("Read entries")?;

        for raw_entry in raw_entries {
            let (raw_id, raw_name, raw_revision, raw_parent_id, raw_kind) =
                raw_entry.context("Read entry row")?;
            let kind = EntryKind::from_str(&raw_kind)
                .map_err(|error| StoreError::Corrupted(error.to_string()))?;
            entries.push(
                Entry::new(
                    EntryId(raw_id),
                    EntryName(raw_name),
                    raw_revision.map(Revision),
                    raw_parent_id.map(EntryId),
                    kind,
                )
                .map_err(|error| StoreError::Corrupted(format!("{:#}", error)))?,
            );
        }

        Snapshot::new(cycle as u64, entries)
            .map_err(|error| StoreError::Corrupted(format!("{:#}", error)))
    }

    fn write_snapshot(connection: &Connection, snapshot: &Snapshot) -> Result<(), StoreError> {
        connection
            .execute(
                "CREATE TABLE entry (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                revision TEXT,
                parent_id TEXT,
                kind TEXT NOT NULL
            );",
                [],
            )
            .context("Create entry table")?;
        connection
            .execute("CREATE TABLE snapshot (cycle INTEGER NOT NULL);", [])
            .context("Create snapshot table")?;

        connection
            .execute(
                "INSERT INTO snapshot (cycle) VALUES (?1)",
                params![snapshot.cycle() as i64],
            )
            .context("Write cycle counter")?;

        for entry in snapshot.entries() {
            connection
                .execute(
                    "INSERT INTO entry (id, name, revision, parent_id, kind) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        entry.id().0,
                        entry.name().0,
                        entry.revision().map(|revision| revision.0.clone()),
                        entry.parent_id().map(|parent_id| parent_id.0.clone()),
                        entry.kind().to_string(),
                    ],
                )
                .context(format!("Write entry {}", entry.id()))?;
        }

        Ok(())
    }
}

impl SnapshotStore for DiskStore {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        if !self.db_path.exists() {
            return Ok(None);
        }

        let connection = Connection::open(&self.db_path).context(format!(
            "Open snapshot database {}",
            self.db_path.display()
        ))?;
        Ok(Some(self.read_snapshot(&connection)?))
    }

    fn commit(&mut self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let parent = self.db_path.parent().context(format!(
            "Determine parent folder of {}",
            self.db_path.display()
        ))?;
        fs::create_dir_all(parent).context(format!("Create folder {}", parent.display()))?;

        // Same directory as the target so the final rename stays on one
        // filesystem and therefore atomic.
        let temp_file =
            NamedTempFile::new_in(parent).context("Create temporary snapshot database")?;
        {
            let connection = Connection::open(temp_file.path()).context(format!(
                "Open temporary snapshot database {}",
                temp_file.path().display()
            ))?;
            Self::write_snapshot(&connection, snapshot)?;
        }

        temp_file
            .persist(&self.db_path)
            .context(format!("Replace snapshot database {}", self.db_path.display()))?;

        Ok(())
    }
}
