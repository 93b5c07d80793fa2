//! Storage backends for the folder tree.
//!
//! [`DocumentBackend`] is the one capability set the navigator, exporter and
//! workspace depend on. [`LocalBackend`] keeps everything in the on-device
//! key-value store; [`RemoteBackend`] keeps metadata in libSQL tables and
//! binary payloads in an [`ObjectStore`]. [`Backend`] wraps either.

mod local;
mod remote;

use std::collections::{HashSet, VecDeque};

use crate::models::{ContentRef, EntityId, EntityKind, FileEntry, FilePayload, Folder, OwnerId};
use crate::storage::ObjectStore;
use crate::Result;

pub use local::{LocalBackend, DEFAULT_LOCAL_QUOTA_BYTES, FILES_KEY, FOLDERS_KEY};
pub use remote::{RemoteBackend, DEFAULT_SIGNED_URL_TTL};

/// Optional operations a backend supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Durable binary retrieval, required for archive export.
    pub archive_export: bool,
}

/// Every folder and file below some folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subtree {
    /// Descendant folders, excluding the subtree root.
    pub folders: Vec<Folder>,
    /// Files in the subtree root and all descendant folders.
    pub files: Vec<FileEntry>,
}

/// Folder/file persistence used by every higher-level component.
///
/// Adapters never retry. A failed call leaves no partial state: metadata is
/// only written after any binary payload has been stored.
#[allow(async_fn_in_trait)]
pub trait DocumentBackend {
    /// Owner every record of this backend belongs to.
    fn owner(&self) -> &OwnerId;

    fn capabilities(&self) -> Capabilities;

    /// Folders directly under `parent_id` (root when `None`), by name.
    async fn list_folders(&self, parent_id: Option<&EntityId>) -> Result<Vec<Folder>>;

    /// Files directly in `folder_id` (root when `None`), by name.
    async fn list_files(&self, folder_id: Option<&EntityId>) -> Result<Vec<FileEntry>>;

    async fn get_folder(&self, id: &EntityId) -> Result<Option<Folder>>;

    async fn get_file(&self, id: &EntityId) -> Result<Option<FileEntry>>;

    /// Create a folder. A missing parent fails with `NotFound`.
    async fn create_folder(&self, name: &str, parent_id: Option<&EntityId>) -> Result<Folder>;

    /// Create a note or upload inside `folder_id`.
    async fn create_file(
        &self,
        name: &str,
        payload: FilePayload,
        folder_id: Option<&EntityId>,
    ) -> Result<FileEntry>;

    async fn rename_entity(&self, kind: EntityKind, id: &EntityId, new_name: &str) -> Result<()>;

    /// Replace the text of a note.
    async fn update_note_content(&self, id: &EntityId, text: &str) -> Result<()>;

    /// Delete a file, or a folder together with everything below it.
    async fn delete_entity(&self, kind: EntityKind, id: &EntityId) -> Result<()>;

    /// Resolve a file into something displayable.
    async fn read_file_content(&self, file: &FileEntry) -> Result<ContentRef>;

    /// Raw payload of a file: note text as UTF-8 or upload bytes.
    async fn fetch_file_bytes(&self, file: &FileEntry) -> Result<Vec<u8>>;

    /// Collect the subtree below `folder_id`, one folder at a time.
    async fn list_subtree(&self, folder_id: &EntityId) -> Result<Subtree> {
        let mut subtree = Subtree::default();
        let mut visited = HashSet::from([folder_id.clone()]);
        let mut queue = VecDeque::from([folder_id.clone()]);

        while let Some(current) = queue.pop_front() {
            subtree.files.extend(self.list_files(Some(&current)).await?);

            for child in self.list_folders(Some(&current)).await? {
                if visited.insert(child.id.clone()) {
                    queue.push_back(child.id.clone());
                    subtree.folders.push(child);
                } else {
                    tracing::warn!("Folder {} reached twice while walking {folder_id}", child.id);
                }
            }
        }

        Ok(subtree)
    }
}

/// The active backend, local or remote.
#[derive(Clone)]
pub enum Backend<O> {
    Local(LocalBackend),
    Remote(RemoteBackend<O>),
}

impl<O> Backend<O> {
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl<O: ObjectStore> DocumentBackend for Backend<O> {
    fn owner(&self) -> &OwnerId {
        match self {
            Self::Local(backend) => backend.owner(),
            Self::Remote(backend) => backend.owner(),
        }
    }

    fn capabilities(&self) -> Capabilities {
        match self {
            Self::Local(backend) => backend.capabilities(),
            Self::Remote(backend) => backend.capabilities(),
        }
    }

    async fn list_folders(&self, parent_id: Option<&EntityId>) -> Result<Vec<Folder>> {
        match self {
            Self::Local(backend) => backend.list_folders(parent_id).await,
            Self::Remote(backend) => backend.list_folders(parent_id).await,
        }
    }

    async fn list_files(&self, folder_id: Option<&EntityId>) -> Result<Vec<FileEntry>> {
        match self {
            Self::Local(backend) => backend.list_files(folder_id).await,
            Self::Remote(backend) => backend.list_files(folder_id).await,
        }
    }

    async fn get_folder(&self, id: &EntityId) -> Result<Option<Folder>> {
        match self {
            Self::Local(backend) => backend.get_folder(id).await,
            Self::Remote(backend) => backend.get_folder(id).await,
        }
    }

    async fn get_file(&self, id: &EntityId) -> Result<Option<FileEntry>> {
        match self {
            Self::Local(backend) => backend.get_file(id).await,
            Self::Remote(backend) => backend.get_file(id).await,
        }
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&EntityId>) -> Result<Folder> {
        match self {
            Self::Local(backend) => backend.create_folder(name, parent_id).await,
            Self::Remote(backend) => backend.create_folder(name, parent_id).await,
        }
    }

    async fn create_file(
        &self,
        name: &str,
        payload: FilePayload,
        folder_id: Option<&EntityId>,
    ) -> Result<FileEntry> {
        match self {
            Self::Local(backend) => backend.create_file(name, payload, folder_id).await,
            Self::Remote(backend) => backend.create_file(name, payload, folder_id).await,
        }
    }

    async fn rename_entity(&self, kind: EntityKind, id: &EntityId, new_name: &str) -> Result<()> {
        match self {
            Self::Local(backend) => backend.rename_entity(kind, id, new_name).await,
            Self::Remote(backend) => backend.rename_entity(kind, id, new_name).await,
        }
    }

    async fn update_note_content(&self, id: &EntityId, text: &str) -> Result<()> {
        match self {
            Self::Local(backend) => backend.update_note_content(id, text).await,
            Self::Remote(backend) => backend.update_note_content(id, text).await,
        }
    }

    async fn delete_entity(&self, kind: EntityKind, id: &EntityId) -> Result<()> {
        match self {
            Self::Local(backend) => backend.delete_entity(kind, id).await,
            Self::Remote(backend) => backend.delete_entity(kind, id).await,
        }
    }

    async fn read_file_content(&self, file: &FileEntry) -> Result<ContentRef> {
        match self {
            Self::Local(backend) => backend.read_file_content(file).await,
            Self::Remote(backend) => backend.read_file_content(file).await,
        }
    }

    async fn fetch_file_bytes(&self, file: &FileEntry) -> Result<Vec<u8>> {
        match self {
            Self::Local(backend) => backend.fetch_file_bytes(file).await,
            Self::Remote(backend) => backend.fetch_file_bytes(file).await,
        }
    }

    async fn list_subtree(&self, folder_id: &EntityId) -> Result<Subtree> {
        match self {
            Self::Local(backend) => backend.list_subtree(folder_id).await,
            Self::Remote(backend) => backend.list_subtree(folder_id).await,
        }
    }
}

/// Order folders by name, then creation time, then id.
pub(crate) fn sort_folders(folders: &mut [Folder]) {
    folders.sort_by(|a, b| {
        (a.name.as_str(), a.created_at, &a.id).cmp(&(b.name.as_str(), b.created_at, &b.id))
    });
}

/// Order files by name, then creation time, then id.
pub(crate) fn sort_files(files: &mut [FileEntry]) {
    files.sort_by(|a, b| {
        (a.name.as_str(), a.created_at, &a.id).cmp(&(b.name.as_str(), b.created_at, &b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, KeyValueStore};
    use crate::storage::MemoryObjectStore;
    use pretty_assertions::assert_eq;

    async fn local() -> Backend<MemoryObjectStore> {
        let db = Database::open_in_memory().await.unwrap().into_shared();
        Backend::Local(LocalBackend::new(KeyValueStore::new(db)))
    }

    async fn remote() -> Backend<MemoryObjectStore> {
        let db = Database::open_in_memory().await.unwrap().into_shared();
        Backend::Remote(RemoteBackend::new(
            db,
            MemoryObjectStore::new(),
            OwnerId::new("user-1").unwrap(),
        ))
    }

    async fn both() -> Vec<Backend<MemoryObjectStore>> {
        vec![local().await, remote().await]
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_then_list_contains_folder_once() {
        for backend in both().await {
            backend.create_folder("Math", None).await.unwrap();

            let folders = backend.list_folders(None).await.unwrap();
            let matching = folders.iter().filter(|f| f.name == "Math").count();
            assert_eq!(matching, 1, "remote={}", backend.is_remote());
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rename_preserves_children() {
        for backend in both().await {
            let parent = backend.create_folder("Old", None).await.unwrap();
            let child = backend.create_folder("Child", Some(&parent.id)).await.unwrap();
            let note = backend
                .create_file("n1", FilePayload::note("hello"), Some(&parent.id))
                .await
                .unwrap();

            backend
                .rename_entity(EntityKind::Folder, &parent.id, "New")
                .await
                .unwrap();

            let renamed = backend.get_folder(&parent.id).await.unwrap().unwrap();
            assert_eq!(renamed.name, "New");
            let folders = backend.list_folders(Some(&parent.id)).await.unwrap();
            assert_eq!(folders, vec![child]);
            let files = backend.list_files(Some(&parent.id)).await.unwrap();
            assert_eq!(files, vec![note]);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn listings_are_sorted_by_name() {
        for backend in both().await {
            for name in ["b", "c", "a"] {
                backend
                    .create_file(name, FilePayload::note(""), None)
                    .await
                    .unwrap();
            }
            let names: Vec<String> = backend
                .list_files(None)
                .await
                .unwrap()
                .into_iter()
                .map(|file| file.name)
                .collect();
            assert_eq!(names, vec!["a", "b", "c"]);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_under_missing_parent_is_not_found() {
        for backend in both().await {
            let missing = EntityId::generate();
            let error = backend.create_folder("x", Some(&missing)).await.unwrap_err();
            assert!(matches!(error, crate::Error::NotFound(_)));

            let error = backend
                .create_file("n", FilePayload::note("t"), Some(&missing))
                .await
                .unwrap_err();
            assert!(matches!(error, crate::Error::NotFound(_)));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cascade_delete_keeps_siblings() {
        for backend in both().await {
            let doomed = backend.create_folder("doomed", None).await.unwrap();
            let sibling = backend.create_folder("sibling", None).await.unwrap();
            let nested = backend.create_folder("nested", Some(&doomed.id)).await.unwrap();
            let nested_note = backend
                .create_file("deep", FilePayload::note("x"), Some(&nested.id))
                .await
                .unwrap();
            let sibling_note = backend
                .create_file("kept", FilePayload::note("y"), Some(&sibling.id))
                .await
                .unwrap();

            backend
                .delete_entity(EntityKind::Folder, &doomed.id)
                .await
                .unwrap();

            assert_eq!(backend.list_folders(None).await.unwrap(), vec![sibling.clone()]);
            assert!(backend.get_folder(&nested.id).await.unwrap().is_none());
            assert!(backend.get_file(&nested_note.id).await.unwrap().is_none());
            assert_eq!(
                backend.list_files(Some(&sibling.id)).await.unwrap(),
                vec![sibling_note]
            );
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_note_rejects_uploads() {
        for backend in both().await {
            let payload = FilePayload::upload(vec![1, 2, 3], "application/octet-stream");
            let upload = backend
                .create_file("a.bin", payload, None)
                .await
                .unwrap();
            let error = backend
                .update_note_content(&upload.id, "text")
                .await
                .unwrap_err();
            assert!(matches!(error, crate::Error::InvalidInput(_)));
        }
    }

    async fn subtree_names(backend: &Backend<MemoryObjectStore>) -> (Vec<String>, Vec<String>) {
        let top = backend.create_folder("top", None).await.unwrap();
        let a = backend.create_folder("a", Some(&top.id)).await.unwrap();
        let b = backend.create_folder("b", Some(&a.id)).await.unwrap();
        let outside = backend.create_folder("outside", None).await.unwrap();
        for (name, folder) in [("root note", &top), ("deep note", &b), ("stray", &outside)] {
            backend
                .create_file(name, FilePayload::note("x"), Some(&folder.id))
                .await
                .unwrap();
        }

        let subtree = backend.list_subtree(&top.id).await.unwrap();
        let mut folders: Vec<String> = subtree.folders.into_iter().map(|f| f.name).collect();
        let mut files: Vec<String> = subtree.files.into_iter().map(|f| f.name).collect();
        folders.sort();
        files.sort();
        (folders, files)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn default_subtree_walk_matches_remote_query() {
        let walked = subtree_names(&local().await).await;
        let queried = subtree_names(&remote().await).await;

        assert_eq!(walked, queried);
        assert_eq!(walked.0, vec!["a", "b"]);
        assert_eq!(walked.1, vec!["deep note", "root note"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn backends_are_disjoint() {
        let db = Database::open_in_memory().await.unwrap().into_shared();
        let local: Backend<MemoryObjectStore> =
            Backend::Local(LocalBackend::new(KeyValueStore::new(db.clone())));
        let remote: Backend<MemoryObjectStore> = Backend::Remote(RemoteBackend::new(
            db,
            MemoryObjectStore::new(),
            OwnerId::new("user-1").unwrap(),
        ));

        local.create_folder("local only", None).await.unwrap();
        remote.create_folder("remote only", None).await.unwrap();

        let local_names: Vec<String> = local
            .list_folders(None)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        let remote_names: Vec<String> = remote
            .list_folders(None)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(local_names, vec!["local only"]);
        assert_eq!(remote_names, vec!["remote only"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn only_remote_supports_archive_export() {
        assert!(!local().await.capabilities().archive_export);
        assert!(remote().await.capabilities().archive_export);
    }
}
