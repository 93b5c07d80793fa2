//! User-level operations over the active backend.
//!
//! Every failure is turned into a [`Notice`] here. Nothing below this layer
//! reaches the user unconverted and no operation leaves the tree unusable.

use crate::backend::{Backend, DocumentBackend};
use crate::error::ErrorKind;
use crate::export::{self, DownloadedFile, ExportedArchive};
use crate::models::{ContentRef, EntityId, EntityKind, FileEntry, FilePayload, Folder};
use crate::names;
use crate::navigator::TreeNavigator;
use crate::selector::{AuthContext, BackendSelector, StorageMode};
use crate::storage::ObjectStore;
use crate::Error;

/// How prominent a notice should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    /// Failure class for error notices.
    pub kind: Option<ErrorKind>,
}

impl Notice {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            title: title.into(),
            description: description.into(),
            kind: None,
        }
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            title: title.into(),
            description: description.into(),
            kind: None,
        }
    }

    /// Describe a failed `action` (e.g. "create folder").
    #[must_use]
    pub fn from_error(action: &str, error: &Error) -> Self {
        let kind = error.kind();
        let (severity, title, description) = match kind {
            ErrorKind::Validation => (
                Severity::Warning,
                "Invalid input".to_string(),
                error.to_string(),
            ),
            ErrorKind::BackendUnavailable => (
                Severity::Error,
                format!("Could not {action}"),
                format!("{error}. Please try again."),
            ),
            ErrorKind::NotFound => (
                Severity::Warning,
                "Item no longer exists".to_string(),
                format!("{error}. The view has been refreshed."),
            ),
            ErrorKind::QuotaExceeded => (
                Severity::Error,
                "File too large".to_string(),
                format!("{error}. Sign in to store larger files in the cloud."),
            ),
            ErrorKind::FeatureUnavailable => (
                Severity::Warning,
                "Not available".to_string(),
                error.to_string(),
            ),
        };

        Self {
            severity,
            title,
            description,
            kind: Some(kind),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind.is_some()
    }
}

/// One file of a multi-file upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Result of [`Workspace::upload_batch`].
#[derive(Debug, Clone)]
pub struct BatchUpload {
    pub uploaded: Vec<FileEntry>,
    /// Name of each rejected file with the reason.
    pub failed: Vec<(String, Notice)>,
    pub notice: Notice,
}

enum Move {
    Refresh,
    Enter(EntityId),
    Up,
    Root,
}

/// Backend selection plus navigation state, the operation boundary for a UI.
pub struct Workspace<O> {
    selector: BackendSelector<O>,
    navigator: TreeNavigator,
}

impl<O: ObjectStore + Clone> Workspace<O> {
    #[must_use]
    pub fn new(selector: BackendSelector<O>) -> Self {
        Self {
            selector,
            navigator: TreeNavigator::new(),
        }
    }

    #[must_use]
    pub const fn navigator(&self) -> &TreeNavigator {
        &self.navigator
    }

    #[must_use]
    pub const fn selector(&self) -> &BackendSelector<O> {
        &self.selector
    }

    #[must_use]
    pub const fn mode(&self) -> StorageMode {
        self.selector.mode()
    }

    fn backend(&self, action: &str) -> Result<Backend<O>, Notice> {
        self.selector
            .active()
            .map_err(|error| Notice::from_error(action, &error))
    }

    /// Log a failure, recover navigation when the target vanished and build
    /// the notice.
    async fn fail(&mut self, backend: &Backend<O>, action: &str, error: &Error) -> Notice {
        match error.kind() {
            ErrorKind::Validation | ErrorKind::FeatureUnavailable | ErrorKind::QuotaExceeded => {
                tracing::info!("Could not {action}: {error}");
            }
            ErrorKind::NotFound => {
                tracing::info!("Could not {action}: {error}");
                self.reload(backend).await;
            }
            ErrorKind::BackendUnavailable => tracing::error!("Could not {action}: {error}"),
        }
        Notice::from_error(action, error)
    }

    /// Refresh listings after a mutation. A failure here only leaves the
    /// previous listing in place.
    async fn reload(&mut self, backend: &Backend<O>) {
        if let Err(error) = self.navigator.refresh(backend).await {
            tracing::warn!("Listing refresh failed: {error}");
        }
    }

    async fn navigate(&mut self, action: &str, step: Move) -> Result<(), Notice> {
        let backend = self.backend(action)?;
        let result = match step {
            Move::Refresh => self.navigator.refresh(&backend).await,
            Move::Enter(id) => self.navigator.enter(&backend, id).await,
            Move::Up => self.navigator.up(&backend).await,
            Move::Root => self.navigator.go_to_root(&backend).await,
        };
        match result {
            Ok(()) => Ok(()),
            Err(error) => Err(self.fail(&backend, action, &error).await),
        }
    }

    /// Initial load, starting at `folder_id` when given.
    ///
    /// A stale starting folder silently lands at the root.
    pub async fn open(&mut self, folder_id: Option<EntityId>) -> Result<(), Notice> {
        self.navigator = TreeNavigator::starting_at(folder_id);
        self.navigate("load folders", Move::Refresh).await
    }

    pub async fn refresh(&mut self) -> Result<(), Notice> {
        self.navigate("load folders", Move::Refresh).await
    }

    pub async fn enter(&mut self, folder_id: EntityId) -> Result<(), Notice> {
        self.navigate("open folder", Move::Enter(folder_id)).await
    }

    pub async fn go_to_root(&mut self) -> Result<(), Notice> {
        self.navigate("open folder", Move::Root).await
    }

    pub async fn up(&mut self) -> Result<(), Notice> {
        self.navigate("open folder", Move::Up).await
    }

    pub async fn create_folder(&mut self, name: &str) -> Result<Folder, Notice> {
        let action = "create folder";
        let name = names::validate(name, "Folder")
            .map_err(|error| Notice::from_error(action, &error.into()))?;
        let backend = self.backend(action)?;

        let parent = self.navigator.current_folder_id().cloned();
        match backend.create_folder(&name, parent.as_ref()).await {
            Ok(folder) => {
                self.reload(&backend).await;
                Ok(folder)
            }
            Err(error) => Err(self.fail(&backend, action, &error).await),
        }
    }

    pub async fn create_note(&mut self, name: &str, text: &str) -> Result<FileEntry, Notice> {
        self.create_file("create note", "Note", name, FilePayload::note(text))
            .await
    }

    pub async fn upload(&mut self, request: UploadRequest) -> Result<FileEntry, Notice> {
        let UploadRequest {
            name,
            bytes,
            mime_type,
        } = request;
        self.create_file("upload file", "File", &name, FilePayload::upload(bytes, mime_type))
            .await
    }

    async fn create_file(
        &mut self,
        action: &str,
        label: &str,
        name: &str,
        payload: FilePayload,
    ) -> Result<FileEntry, Notice> {
        let name = names::validate(name, label)
            .map_err(|error| Notice::from_error(action, &error.into()))?;
        let backend = self.backend(action)?;

        let folder_id = self.navigator.current_folder_id().cloned();
        match backend.create_file(&name, payload, folder_id.as_ref()).await {
            Ok(file) => {
                self.reload(&backend).await;
                Ok(file)
            }
            Err(error) => Err(self.fail(&backend, action, &error).await),
        }
    }

    /// Upload several files into the current folder, continuing past failures.
    pub async fn upload_batch(&mut self, requests: Vec<UploadRequest>) -> BatchUpload {
        let action = "upload files";
        let total = requests.len();
        let backend = match self.backend(action) {
            Ok(backend) => backend,
            Err(notice) => {
                return BatchUpload {
                    uploaded: Vec::new(),
                    failed: Vec::new(),
                    notice,
                }
            }
        };
        let folder_id = self.navigator.current_folder_id().cloned();

        let mut uploaded = Vec::new();
        let mut failed = Vec::new();
        for request in requests {
            let result = match names::validate(&request.name, "File") {
                Ok(name) => {
                    let payload = FilePayload::upload(request.bytes, request.mime_type);
                    backend.create_file(&name, payload, folder_id.as_ref()).await
                }
                Err(error) => Err(error.into()),
            };
            match result {
                Ok(file) => uploaded.push(file),
                Err(error) => {
                    tracing::info!("Upload of {} failed: {error}", request.name);
                    failed.push((request.name, Notice::from_error("upload file", &error)));
                }
            }
        }
        self.reload(&backend).await;

        let notice = if failed.is_empty() {
            Notice::success("Upload complete", format!("Uploaded {total} file(s)"))
        } else {
            let reasons = failed
                .iter()
                .map(|(name, notice)| format!("{name}: {}", notice.description))
                .collect::<Vec<_>>()
                .join("; ");
            Notice {
                severity: if uploaded.is_empty() {
                    Severity::Error
                } else {
                    Severity::Warning
                },
                title: format!("Uploaded {} of {total} file(s)", uploaded.len()),
                description: reasons,
                kind: failed.first().and_then(|(_, notice)| notice.kind),
            }
        };

        BatchUpload {
            uploaded,
            failed,
            notice,
        }
    }

    pub async fn update_note(&mut self, id: &EntityId, text: &str) -> Notice {
        let action = "save note";
        let backend = match self.backend(action) {
            Ok(backend) => backend,
            Err(notice) => return notice,
        };
        match backend.update_note_content(id, text).await {
            Ok(()) => {
                self.reload(&backend).await;
                Notice::success("Note saved", "")
            }
            Err(error) => self.fail(&backend, action, &error).await,
        }
    }

    pub async fn rename(&mut self, kind: EntityKind, id: &EntityId, new_name: &str) -> Notice {
        let action = "rename";
        let name = match names::validate(new_name, kind.label()) {
            Ok(name) => name,
            Err(error) => return Notice::from_error(action, &error.into()),
        };
        let backend = match self.backend(action) {
            Ok(backend) => backend,
            Err(notice) => return notice,
        };

        match backend.rename_entity(kind, id, &name).await {
            Ok(()) => {
                self.reload(&backend).await;
                Notice::success(format!("{kind} renamed"), format!("Renamed to {name}"))
            }
            Err(error) => self.fail(&backend, action, &error).await,
        }
    }

    pub async fn delete(&mut self, kind: EntityKind, id: &EntityId) -> Notice {
        let action = "delete";
        let backend = match self.backend(action) {
            Ok(backend) => backend,
            Err(notice) => return notice,
        };

        match backend.delete_entity(kind, id).await {
            Ok(()) => {
                self.reload(&backend).await;
                Notice::success(format!("{kind} deleted"), "")
            }
            Err(error) => self.fail(&backend, action, &error).await,
        }
    }

    async fn lookup_file(
        &mut self,
        backend: &Backend<O>,
        action: &str,
        id: &EntityId,
    ) -> Result<FileEntry, Notice> {
        let result = backend
            .get_file(id)
            .await
            .and_then(|file| file.ok_or_else(|| Error::NotFound(format!("File {id}"))));
        match result {
            Ok(file) => Ok(file),
            Err(error) => Err(self.fail(backend, action, &error).await),
        }
    }

    /// Resolve a file's content for display.
    pub async fn view_file(&mut self, id: &EntityId) -> Result<(FileEntry, ContentRef), Notice> {
        let action = "open file";
        let backend = self.backend(action)?;
        let file = self.lookup_file(&backend, action, id).await?;

        match backend.read_file_content(&file).await {
            Ok(content) => Ok((file, content)),
            Err(error) => Err(self.fail(&backend, action, &error).await),
        }
    }

    pub async fn download_file(&mut self, id: &EntityId) -> Result<DownloadedFile, Notice> {
        let action = "download file";
        let backend = self.backend(action)?;
        let file = self.lookup_file(&backend, action, id).await?;

        match export::download_file(&backend, &file).await {
            Ok(download) => Ok(download),
            Err(error) => Err(self.fail(&backend, action, &error).await),
        }
    }

    /// Export a folder as a ZIP archive.
    pub async fn export_folder(&mut self, id: &EntityId) -> Result<ExportedArchive, Notice> {
        let action = "export folder";
        let backend = self.backend(action)?;
        if !backend.capabilities().archive_export {
            let error = Error::FeatureUnavailable(
                "Sign in and switch to cloud storage to export folders".to_string(),
            );
            return Err(self.fail(&backend, action, &error).await);
        }

        let result = match backend.get_folder(id).await {
            Ok(Some(folder)) => export::export_folder(&backend, id, &folder.name).await,
            Ok(None) => Err(Error::NotFound(format!("Folder {id}"))),
            Err(error) => Err(error),
        };
        match result {
            Ok(archive) => Ok(archive),
            Err(error) => Err(self.fail(&backend, action, &error).await),
        }
    }

    /// Persist an explicit storage mode and reload from the new backend.
    pub async fn choose_mode(&mut self, mode: StorageMode) -> Notice {
        match self.selector.choose(mode).await {
            Ok(changed) => {
                if changed {
                    self.navigator.reset();
                    if let Err(notice) = self.refresh().await {
                        return notice;
                    }
                }
                Notice::info("Storage mode", format!("Using {mode} storage"))
            }
            Err(error) => {
                tracing::error!("Could not save storage mode: {error}");
                Notice::from_error("change storage mode", &error)
            }
        }
    }

    /// Apply new auth state. Returns whether the active backend changed.
    pub async fn handle_auth_change(&mut self, auth: AuthContext) -> Result<bool, Notice> {
        if !self.selector.handle_auth_change(auth) {
            return Ok(false);
        }
        self.navigator.reset();
        self.refresh().await.map(|()| true)
    }
}
