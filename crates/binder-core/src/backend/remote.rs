//! Authenticated backend: libSQL metadata plus an object store for uploads.

use std::time::Duration;

use super::{Capabilities, DocumentBackend, Subtree};
use crate::db::{LibSqlTreeRepository, SharedDatabase};
use crate::models::{
    decode_data_url, ContentRef, EntityId, EntityKind, FileEntry, FileKind, FilePayload, Folder,
    OwnerId,
};
use crate::storage::{build_storage_key, ObjectStore};
use crate::{Error, Result};

/// Lifetime of signed read URLs unless configured otherwise.
pub const DEFAULT_SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

/// Remote backend for one authenticated owner.
#[derive(Clone)]
pub struct RemoteBackend<O> {
    db: SharedDatabase,
    objects: O,
    owner: OwnerId,
    signed_url_ttl: Duration,
}

impl<O: ObjectStore> RemoteBackend<O> {
    pub const fn new(db: SharedDatabase, objects: O, owner: OwnerId) -> Self {
        Self {
            db,
            objects,
            owner,
            signed_url_ttl: DEFAULT_SIGNED_URL_TTL,
        }
    }

    #[must_use]
    pub const fn with_signed_url_ttl(mut self, ttl: Duration) -> Self {
        self.signed_url_ttl = ttl;
        self
    }

    pub const fn objects(&self) -> &O {
        &self.objects
    }

    async fn ensure_folder(&self, id: Option<&EntityId>) -> Result<()> {
        let Some(id) = id else {
            return Ok(());
        };
        let db = self.db.lock().await;
        let repo = LibSqlTreeRepository::new(db.connection(), &self.owner);
        if repo.get_folder(id).await?.is_none() {
            return Err(Error::NotFound(format!("Folder {id}")));
        }
        Ok(())
    }

    async fn insert_file(&self, file: &FileEntry) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlTreeRepository::new(db.connection(), &self.owner)
            .insert_file(file)
            .await
    }

    /// Remove blobs whose metadata is already gone. Failures only leave an
    /// unreferenced object behind.
    async fn delete_objects(&self, keys: &[String]) {
        for key in keys {
            if let Err(error) = self.objects.delete(key).await {
                tracing::warn!("Failed to delete stored object {key}: {error}");
            }
        }
    }

    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        mime_type: String,
        folder_id: Option<&EntityId>,
    ) -> Result<FileEntry> {
        let key = build_storage_key(&self.owner, name);
        self.objects
            .upload(&key, &bytes, Some(mime_type.as_str()))
            .await?;

        let mut file = FileEntry::upload(
            name,
            &mime_type,
            bytes.len(),
            folder_id.cloned(),
            self.owner.clone(),
        );
        file.storage_key = Some(key.clone());

        if let Err(error) = self.insert_file(&file).await {
            tracing::warn!("Metadata insert failed for {key}, removing uploaded object");
            self.delete_objects(std::slice::from_ref(&key)).await;
            return Err(error);
        }
        Ok(file)
    }
}

impl<O: ObjectStore> DocumentBackend for RemoteBackend<O> {
    fn owner(&self) -> &OwnerId {
        &self.owner
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            archive_export: true,
        }
    }

    async fn list_folders(&self, parent_id: Option<&EntityId>) -> Result<Vec<Folder>> {
        let db = self.db.lock().await;
        LibSqlTreeRepository::new(db.connection(), &self.owner)
            .list_folders(parent_id)
            .await
    }

    async fn list_files(&self, folder_id: Option<&EntityId>) -> Result<Vec<FileEntry>> {
        let db = self.db.lock().await;
        LibSqlTreeRepository::new(db.connection(), &self.owner)
            .list_files(folder_id)
            .await
    }

    async fn get_folder(&self, id: &EntityId) -> Result<Option<Folder>> {
        let db = self.db.lock().await;
        LibSqlTreeRepository::new(db.connection(), &self.owner)
            .get_folder(id)
            .await
    }

    async fn get_file(&self, id: &EntityId) -> Result<Option<FileEntry>> {
        let db = self.db.lock().await;
        LibSqlTreeRepository::new(db.connection(), &self.owner)
            .get_file(id)
            .await
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&EntityId>) -> Result<Folder> {
        self.ensure_folder(parent_id).await?;

        let folder = Folder::new(name, parent_id.cloned(), self.owner.clone());
        {
            let db = self.db.lock().await;
            LibSqlTreeRepository::new(db.connection(), &self.owner)
                .insert_folder(&folder)
                .await?;
        }

        tracing::info!("Created folder {} ({})", folder.name, folder.id);
        Ok(folder)
    }

    async fn create_file(
        &self,
        name: &str,
        payload: FilePayload,
        folder_id: Option<&EntityId>,
    ) -> Result<FileEntry> {
        self.ensure_folder(folder_id).await?;

        let file = match payload {
            FilePayload::Note { text } => {
                let file = FileEntry::note(name, text, folder_id.cloned(), self.owner.clone());
                self.insert_file(&file).await?;
                file
            }
            FilePayload::Upload { bytes, mime_type } => {
                self.upload(name, bytes, mime_type, folder_id).await?
            }
        };

        tracing::info!("Created {} {} ({})", file.kind.as_str(), file.name, file.id);
        Ok(file)
    }

    async fn rename_entity(&self, kind: EntityKind, id: &EntityId, new_name: &str) -> Result<()> {
        {
            let db = self.db.lock().await;
            LibSqlTreeRepository::new(db.connection(), &self.owner)
                .rename(kind, id, new_name)
                .await?;
        }
        tracing::info!("Renamed {kind} {id}");
        Ok(())
    }

    async fn update_note_content(&self, id: &EntityId, text: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlTreeRepository::new(db.connection(), &self.owner);

        let file = repo
            .get_file(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("File {id}")))?;
        if file.kind != FileKind::Note {
            return Err(Error::InvalidInput(format!("{} is not a note", file.name)));
        }

        repo.update_note_content(id, text).await
    }

    async fn delete_entity(&self, kind: EntityKind, id: &EntityId) -> Result<()> {
        let keys = {
            let db = self.db.lock().await;
            let repo = LibSqlTreeRepository::new(db.connection(), &self.owner);
            match kind {
                EntityKind::Folder => repo.delete_folder_cascade(id).await?,
                EntityKind::File => repo.delete_file(id).await?.into_iter().collect(),
            }
        };

        self.delete_objects(&keys).await;
        tracing::info!("Deleted {kind} {id} ({} stored objects)", keys.len());
        Ok(())
    }

    async fn read_file_content(&self, file: &FileEntry) -> Result<ContentRef> {
        match (file.kind, file.storage_key.as_deref(), file.content.as_deref()) {
            (FileKind::Note, _, content) => {
                Ok(ContentRef::Text(content.unwrap_or_default().to_string()))
            }
            (FileKind::Upload, Some(key), _) => {
                let url = self
                    .objects
                    .create_signed_url(key, self.signed_url_ttl)
                    .await?;
                let ttl_ms = i64::try_from(self.signed_url_ttl.as_millis()).unwrap_or(i64::MAX);
                let expires_at = chrono::Utc::now()
                    .timestamp_millis()
                    .saturating_add(ttl_ms);
                Ok(ContentRef::SignedUrl { url, expires_at })
            }
            (FileKind::Upload, None, Some(content)) => {
                let (bytes, mime_type) = decode_data_url(content)?;
                Ok(ContentRef::Inline { bytes, mime_type })
            }
            (FileKind::Upload, None, None) => {
                Err(Error::NotFound(format!("Content of {}", file.name)))
            }
        }
    }

    async fn fetch_file_bytes(&self, file: &FileEntry) -> Result<Vec<u8>> {
        match (file.kind, file.storage_key.as_deref(), file.content.as_deref()) {
            (FileKind::Note, _, content) => Ok(content.unwrap_or_default().as_bytes().to_vec()),
            (FileKind::Upload, Some(key), _) => self.objects.download(key).await,
            (FileKind::Upload, None, Some(content)) => Ok(decode_data_url(content)?.0),
            (FileKind::Upload, None, None) => {
                Err(Error::NotFound(format!("Content of {}", file.name)))
            }
        }
    }

    async fn list_subtree(&self, folder_id: &EntityId) -> Result<Subtree> {
        let db = self.db.lock().await;
        let (folders, files) = LibSqlTreeRepository::new(db.connection(), &self.owner)
            .list_subtree(folder_id)
            .await?;
        Ok(Subtree { folders, files })
    }
}
