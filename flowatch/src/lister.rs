use std::collections::VecDeque;

use flowatch_core::client::{FetchError, RemoteFolderClient};
use flowatch_core::entry::Entry;
use flowatch_core::snapshot::Snapshot;
use flowatch_core::types::{EntryId, EntryKind, FolderId};

/// Produces one complete snapshot of the watched tree. The remote API
/// lists direct children of one folder at a time, so the lister walks
/// folders breadth first and drains every page before moving on.
///
/// A failure on any page fails the whole fetch: a truncated enumeration
/// must never surface, because the diff engine would read missing entries
/// as a mass deletion.
pub struct RemoteLister {
    client: Box<dyn RemoteFolderClient>,
    root: FolderId,
}

impl RemoteLister {
    pub fn new(client: Box<dyn RemoteFolderClient>, root: FolderId) -> Self {
        Self { client, root }
    }

    pub fn snapshot(&self, cycle: u64) -> Result<Snapshot, FetchError> {
        let mut entries: Vec<Entry> = vec![];
        // None stands for the watched root itself
        let mut folders: VecDeque<Option<EntryId>> = VecDeque::from([None]);

        while let Some(parent) = folders.pop_front() {
            let folder_id = match &parent {
                None => self.root.clone(),
                Some(entry_id) => FolderId(entry_id.0.clone()),
            };

            let mut page_token = None;
            loop {
                let page = self.client.list_page(&folder_id, page_token)?;
                for remote_entry in &page.entries {
                    let entry =
                        Entry::from_remote(remote_entry, parent.clone()).map_err(|error| {
                            FetchError::InvalidResponse(format!("{:#}", error))
                        })?;
                    if entry.kind() == EntryKind::Folder {
                        folders.push_back(Some(entry.id().clone()));
                    }
                    entries.push(entry);
                }

                page_token = match page.next_page {
                    Some(next_page) => Some(next_page),
                    None => break,
                };
            }
        }

        log::debug!("Listed {} entries under {}", entries.len(), self.root);
        Snapshot::new(cycle, entries)
            .map_err(|error| FetchError::InvalidResponse(format!("{:#}", error)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::build_page;
    use flowatch_core::client::MockRemoteFolderClient;
    use flowatch_core::types::PageToken;
    use mockall::predicate;

    #[test]
    fn test_empty_folder() {
        // Given
        let mut client = MockRemoteFolderClient::new();
        client
            .expect_list_page()
            .with(
                predicate::eq(FolderId("root".to_string())),
                predicate::eq(None),
            )
            .times(1)
            .returning(|_, _| Ok(build_page(&[], None)));
        let lister = RemoteLister::new(Box::new(client), FolderId("root".to_string()));

        // When
        let snapshot = lister.snapshot(1).unwrap();

        // Then
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.cycle(), 1);
    }

    #[test]
    fn test_pagination_is_fully_drained() {
        // Given
        let mut client = MockRemoteFolderClient::new();
        client
            .expect_list_page()
            .with(
                predicate::eq(FolderId("root".to_string())),
                predicate::eq(None),
            )
            .times(1)
            .returning(|_, _| {
                Ok(build_page(&[("1", "a.txt", false, Some("1"))], Some("page2")))
            });
        client
            .expect_list_page()
            .with(
                predicate::eq(FolderId("root".to_string())),
                predicate::eq(Some(PageToken("page2".to_string()))),
            )
            .times(1)
            .returning(|_, _| Ok(build_page(&[("2", "b.txt", false, Some("1"))], None)));
        let lister = RemoteLister::new(Box::new(client), FolderId("root".to_string()));

        // When
        let snapshot = lister.snapshot(1).unwrap();

        // Then
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains(&EntryId("1".to_string())));
        assert!(snapshot.contains(&EntryId("2".to_string())));
    }

    #[test]
    fn test_sub_folders_are_walked() {
        // Given
        let mut client = MockRemoteFolderClient::new();
        client
            .expect_list_page()
            .with(
                predicate::eq(FolderId("root".to_string())),
                predicate::eq(None),
            )
            .times(1)
            .returning(|_, _| {
                Ok(build_page(
                    &[("F", "Folder", true, Some("1")), ("1", "a.txt", false, Some("1"))],
                    None,
                ))
            });
        client
            .expect_list_page()
            .with(
                predicate::eq(FolderId("F".to_string())),
                predicate::eq(None),
            )
            .times(1)
            .returning(|_, _| Ok(build_page(&[("2", "b.txt", false, Some("1"))], None)));
        let lister = RemoteLister::new(Box::new(client), FolderId("root".to_string()));

        // When
        let snapshot = lister.snapshot(1).unwrap();

        // Then
        assert_eq!(snapshot.len(), 3);
        let nested = snapshot.get(&EntryId("2".to_string())).unwrap();
        assert_eq!(nested.parent_id(), Some(&EntryId("F".to_string())));
        let top_level = snapshot.get(&EntryId("1".to_string())).unwrap();
        assert_eq!(top_level.parent_id(), None);
    }

    #[test]
    fn test_page_failure_fails_whole_fetch() {
        // Given
        let mut client = MockRemoteFolderClient::new();
        client
            .expect_list_page()
            .with(
                predicate::eq(FolderId("root".to_string())),
                predicate::eq(None),
            )
            .times(1)
            .returning(|_, _| {
                Ok(build_page(&[("1", "a.txt", false, Some("1"))], Some("page2")))
            });
        client
            .expect_list_page()
            .with(
                predicate::eq(FolderId("root".to_string())),
                predicate::eq(Some(PageToken("page2".to_string()))),
            )
            .times(1)
            .returning(|_, _| Err(FetchError::Transient("connection error".to_string())));
        let lister = RemoteLister::new(Box::new(client), FolderId("root".to_string()));

        // When
        let result = lister.snapshot(1);

        // Then : no partial snapshot
        assert!(matches!(result, Err(FetchError::Transient(_))));
    }
}
