//! On-device backend: two JSON arrays in the key-value store.

use std::collections::HashSet;

use super::{sort_files, sort_folders, Capabilities, DocumentBackend};
use crate::db::KeyValueStore;
use crate::models::{
    decode_data_url, encode_data_url, ContentRef, EntityId, EntityKind, FileEntry, FileKind,
    FilePayload, Folder, OwnerId,
};
use crate::{Error, Result};

/// Key holding every local folder record.
pub const FOLDERS_KEY: &str = "binder.folders";
/// Key holding every local file record.
pub const FILES_KEY: &str = "binder.files";
/// Largest inline upload accepted by the local backend (1 MiB).
pub const DEFAULT_LOCAL_QUOTA_BYTES: u64 = 1_048_576;

/// Anonymous backend that loads the whole tree, mutates it in memory and
/// writes it back.
#[derive(Clone)]
pub struct LocalBackend {
    store: KeyValueStore,
    owner: OwnerId,
    quota_bytes: u64,
}

impl LocalBackend {
    #[must_use]
    pub fn new(store: KeyValueStore) -> Self {
        Self {
            store,
            owner: OwnerId::anonymous(),
            quota_bytes: DEFAULT_LOCAL_QUOTA_BYTES,
        }
    }

    /// Override the inline upload ceiling.
    #[must_use]
    pub const fn with_quota_bytes(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    #[must_use]
    pub const fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }

    async fn load_folders(&self) -> Result<Vec<Folder>> {
        self.store.get_json(FOLDERS_KEY).await
    }

    async fn load_files(&self) -> Result<Vec<FileEntry>> {
        self.store.get_json(FILES_KEY).await
    }

    fn check_quota(&self, size: usize) -> Result<()> {
        let size = u64::try_from(size).unwrap_or(u64::MAX);
        if size > self.quota_bytes {
            return Err(Error::QuotaExceeded {
                size,
                limit: self.quota_bytes,
            });
        }
        Ok(())
    }

    fn ensure_folder(folders: &[Folder], id: Option<&EntityId>) -> Result<()> {
        match id {
            Some(id) if !folders.iter().any(|folder| &folder.id == id) => {
                Err(Error::NotFound(format!("Folder {id}")))
            }
            _ => Ok(()),
        }
    }

    /// Ids of `root` and every folder below it.
    fn descendant_ids(folders: &[Folder], root: &EntityId) -> HashSet<EntityId> {
        let mut found = HashSet::from([root.clone()]);
        loop {
            let before = found.len();
            for folder in folders {
                if folder
                    .parent_id
                    .as_ref()
                    .is_some_and(|parent| found.contains(parent))
                {
                    found.insert(folder.id.clone());
                }
            }
            if found.len() == before {
                return found;
            }
        }
    }

    fn inline_content(file: &FileEntry) -> Result<(Vec<u8>, String)> {
        let content = file
            .content
            .as_deref()
            .ok_or_else(|| Error::NotFound(format!("Content of {}", file.name)))?;
        decode_data_url(content)
    }
}

impl DocumentBackend for LocalBackend {
    fn owner(&self) -> &OwnerId {
        &self.owner
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            archive_export: false,
        }
    }

    async fn list_folders(&self, parent_id: Option<&EntityId>) -> Result<Vec<Folder>> {
        let mut folders: Vec<Folder> = self
            .load_folders()
            .await?
            .into_iter()
            .filter(|folder| folder.owner == self.owner && folder.parent_id.as_ref() == parent_id)
            .collect();
        sort_folders(&mut folders);
        tracing::debug!("Listed {} local folders", folders.len());
        Ok(folders)
    }

    async fn list_files(&self, folder_id: Option<&EntityId>) -> Result<Vec<FileEntry>> {
        let mut files: Vec<FileEntry> = self
            .load_files()
            .await?
            .into_iter()
            .filter(|file| file.owner == self.owner && file.folder_id.as_ref() == folder_id)
            .collect();
        sort_files(&mut files);
        Ok(files)
    }

    async fn get_folder(&self, id: &EntityId) -> Result<Option<Folder>> {
        Ok(self
            .load_folders()
            .await?
            .into_iter()
            .find(|folder| &folder.id == id && folder.owner == self.owner))
    }

    async fn get_file(&self, id: &EntityId) -> Result<Option<FileEntry>> {
        Ok(self
            .load_files()
            .await?
            .into_iter()
            .find(|file| &file.id == id && file.owner == self.owner))
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&EntityId>) -> Result<Folder> {
        let mut folders = self.load_folders().await?;
        Self::ensure_folder(&folders, parent_id)?;

        let folder = Folder::new(name, parent_id.cloned(), self.owner.clone());
        folders.push(folder.clone());
        self.store.set_json(FOLDERS_KEY, &folders).await?;

        tracing::info!("Created local folder {} ({})", folder.name, folder.id);
        Ok(folder)
    }

    async fn create_file(
        &self,
        name: &str,
        payload: FilePayload,
        folder_id: Option<&EntityId>,
    ) -> Result<FileEntry> {
        if let FilePayload::Upload { bytes, .. } = &payload {
            self.check_quota(bytes.len())?;
        }

        let folders = self.load_folders().await?;
        Self::ensure_folder(&folders, folder_id)?;

        let file = match payload {
            FilePayload::Note { text } => {
                FileEntry::note(name, text, folder_id.cloned(), self.owner.clone())
            }
            FilePayload::Upload { bytes, mime_type } => {
                let mut file = FileEntry::upload(
                    name,
                    &mime_type,
                    bytes.len(),
                    folder_id.cloned(),
                    self.owner.clone(),
                );
                file.content = Some(encode_data_url(&bytes, &mime_type));
                file
            }
        };

        let mut files = self.load_files().await?;
        files.push(file.clone());
        self.store.set_json(FILES_KEY, &files).await?;

        tracing::info!("Created local {} {} ({})", file.kind.as_str(), file.name, file.id);
        Ok(file)
    }

    async fn rename_entity(&self, kind: EntityKind, id: &EntityId, new_name: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        match kind {
            EntityKind::Folder => {
                let mut folders = self.load_folders().await?;
                let folder = folders
                    .iter_mut()
                    .find(|folder| &folder.id == id && folder.owner == self.owner)
                    .ok_or_else(|| Error::NotFound(format!("Folder {id}")))?;
                folder.name = new_name.to_string();
                folder.updated_at = now;
                self.store.set_json(FOLDERS_KEY, &folders).await?;
            }
            EntityKind::File => {
                let mut files = self.load_files().await?;
                let file = files
                    .iter_mut()
                    .find(|file| &file.id == id && file.owner == self.owner)
                    .ok_or_else(|| Error::NotFound(format!("File {id}")))?;
                file.name = new_name.to_string();
                file.updated_at = now;
                self.store.set_json(FILES_KEY, &files).await?;
            }
        }

        tracing::info!("Renamed local {kind} {id}");
        Ok(())
    }

    async fn update_note_content(&self, id: &EntityId, text: &str) -> Result<()> {
        let mut files = self.load_files().await?;
        let file = files
            .iter_mut()
            .find(|file| &file.id == id && file.owner == self.owner)
            .ok_or_else(|| Error::NotFound(format!("File {id}")))?;

        if file.kind != FileKind::Note {
            return Err(Error::InvalidInput(format!("{} is not a note", file.name)));
        }
        file.content = Some(text.to_string());
        file.updated_at = chrono::Utc::now().timestamp_millis();

        self.store.set_json(FILES_KEY, &files).await
    }

    async fn delete_entity(&self, kind: EntityKind, id: &EntityId) -> Result<()> {
        match kind {
            EntityKind::Folder => {
                let mut folders = self.load_folders().await?;
                if !folders
                    .iter()
                    .any(|folder| &folder.id == id && folder.owner == self.owner)
                {
                    return Err(Error::NotFound(format!("Folder {id}")));
                }

                let doomed = Self::descendant_ids(&folders, id);
                let mut files = self.load_files().await?;
                folders.retain(|folder| !doomed.contains(&folder.id));
                files.retain(|file| {
                    file.folder_id
                        .as_ref()
                        .map_or(true, |folder_id| !doomed.contains(folder_id))
                });

                self.store
                    .set_many(&[
                        (FOLDERS_KEY, serde_json::to_string(&folders)?),
                        (FILES_KEY, serde_json::to_string(&files)?),
                    ])
                    .await?;
                tracing::info!("Deleted local folder {id} with {} descendants", doomed.len() - 1);
            }
            EntityKind::File => {
                let mut files = self.load_files().await?;
                let before = files.len();
                files.retain(|file| !(&file.id == id && file.owner == self.owner));
                if files.len() == before {
                    return Err(Error::NotFound(format!("File {id}")));
                }
                self.store.set_json(FILES_KEY, &files).await?;
                tracing::info!("Deleted local file {id}");
            }
        }
        Ok(())
    }

    async fn read_file_content(&self, file: &FileEntry) -> Result<ContentRef> {
        match file.kind {
            FileKind::Note => Ok(ContentRef::Text(file.content.clone().unwrap_or_default())),
            FileKind::Upload => {
                let (bytes, mime_type) = Self::inline_content(file)?;
                Ok(ContentRef::Inline { bytes, mime_type })
            }
        }
    }

    async fn fetch_file_bytes(&self, file: &FileEntry) -> Result<Vec<u8>> {
        match file.kind {
            FileKind::Note => Ok(file.content.clone().unwrap_or_default().into_bytes()),
            FileKind::Upload => Ok(Self::inline_content(file)?.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> (LocalBackend, KeyValueStore) {
        let store = KeyValueStore::new(Database::open_in_memory().await.unwrap().into_shared());
        (LocalBackend::new(store.clone()), store)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn records_are_anonymous_json_arrays() {
        let (backend, store) = setup().await;
        let folder = backend.create_folder("Math", None).await.unwrap();
        assert!(folder.owner.is_anonymous());

        let raw = store.get(FOLDERS_KEY).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["name"], "Math");
        assert_eq!(value[0]["user_id"], OwnerId::ANONYMOUS);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_over_quota_writes_nothing() {
        let (backend, store) = setup().await;
        let payload = FilePayload::upload(vec![0; 2 * 1024 * 1024], "application/pdf");

        let error = backend.create_file("big.pdf", payload, None).await.unwrap_err();
        assert!(matches!(
            error,
            Error::QuotaExceeded {
                size: 2_097_152,
                limit: DEFAULT_LOCAL_QUOTA_BYTES
            }
        ));
        assert_eq!(store.get(FILES_KEY).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_at_quota_is_accepted() {
        let (backend, _) = setup().await;
        let backend = backend.with_quota_bytes(4);
        let at_quota = FilePayload::upload(vec![1; 4], "application/octet-stream");
        backend.create_file("ok.bin", at_quota, None).await.unwrap();

        let over_quota = FilePayload::upload(vec![1; 5], "application/octet-stream");
        assert!(backend.create_file("no.bin", over_quota, None).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn uploads_are_stored_inline_and_read_back() {
        let (backend, _) = setup().await;
        let file = backend
            .create_file("img.png", FilePayload::upload(b"\x89PNG".to_vec(), "image/png"), None)
            .await
            .unwrap();

        assert!(file
            .content
            .as_deref()
            .is_some_and(|content| content.starts_with("data:image/png;base64,")));
        assert_eq!(file.byte_size, Some(4));

        let content = backend.read_file_content(&file).await.unwrap();
        assert_eq!(
            content,
            ContentRef::Inline {
                bytes: b"\x89PNG".to_vec(),
                mime_type: "image/png".to_string()
            }
        );
        assert_eq!(backend.fetch_file_bytes(&file).await.unwrap(), b"\x89PNG");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_note_content_replaces_text() {
        let (backend, _) = setup().await;
        let note = backend
            .create_file("todo", FilePayload::note("old"), None)
            .await
            .unwrap();

        backend.update_note_content(&note.id, "new").await.unwrap();
        let note = backend.get_file(&note.id).await.unwrap().unwrap();
        assert_eq!(
            backend.read_file_content(&note).await.unwrap(),
            ContentRef::Text("new".to_string())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn foreign_ids_in_stored_json_are_accepted() {
        let (backend, store) = setup().await;
        store
            .set(
                FOLDERS_KEY,
                r#"[{"id":"1700000000000abc","name":"Legacy","parent_id":null,"user_id":"anonymous","created_at":1,"updated_at":1}]"#,
            )
            .await
            .unwrap();

        let folders = backend.list_folders(None).await.unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].id.as_str(), "1700000000000abc");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cascade_delete_survives_a_parent_cycle() {
        let (backend, store) = setup().await;
        store
            .set(
                FOLDERS_KEY,
                r#"[
                    {"id":"a","name":"A","parent_id":"b","user_id":"anonymous","created_at":1,"updated_at":1},
                    {"id":"b","name":"B","parent_id":"a","user_id":"anonymous","created_at":1,"updated_at":1},
                    {"id":"c","name":"C","parent_id":null,"user_id":"anonymous","created_at":1,"updated_at":1}
                ]"#,
            )
            .await
            .unwrap();

        backend
            .delete_entity(EntityKind::Folder, &"a".parse().unwrap())
            .await
            .unwrap();

        let remaining: Vec<Folder> = store.get_json(FOLDERS_KEY).await.unwrap();
        let ids: Vec<&str> = remaining.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_missing_file_is_not_found() {
        let (backend, _) = setup().await;
        let error = backend
            .delete_entity(EntityKind::File, &EntityId::generate())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }
}
