//! Current-location cursor over a backend's folder tree.

use std::collections::HashSet;

use crate::backend::DocumentBackend;
use crate::error::ErrorKind;
use crate::models::{EntityId, EntityKind, FileEntry, Folder};
use crate::{Error, Result};

/// A folder or file from the current listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listed<'a> {
    Folder(&'a Folder),
    File(&'a FileEntry),
}

impl Listed<'_> {
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Folder(_) => EntityKind::Folder,
            Self::File(_) => EntityKind::File,
        }
    }

    #[must_use]
    pub const fn id(&self) -> &EntityId {
        match self {
            Self::Folder(folder) => &folder.id,
            Self::File(file) => &file.id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Folder(folder) => &folder.name,
            Self::File(file) => &file.name,
        }
    }
}

/// Tracks the current folder and its last loaded contents.
#[derive(Debug, Clone, Default)]
pub struct TreeNavigator {
    current_folder_id: Option<EntityId>,
    path: Vec<Folder>,
    folders: Vec<Folder>,
    files: Vec<FileEntry>,
}

impl TreeNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at `folder_id` without loading anything yet.
    #[must_use]
    pub fn starting_at(folder_id: Option<EntityId>) -> Self {
        Self {
            current_folder_id: folder_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn current_folder_id(&self) -> Option<&EntityId> {
        self.current_folder_id.as_ref()
    }

    /// Ancestors from the top level down to the current folder.
    #[must_use]
    pub fn path(&self) -> &[Folder] {
        &self.path
    }

    #[must_use]
    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    #[must_use]
    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    /// Slash-joined breadcrumb, `/` at the root.
    #[must_use]
    pub fn display_path(&self) -> String {
        if self.path.is_empty() {
            return "/".to_string();
        }
        self.path
            .iter()
            .fold(String::new(), |acc, folder| format!("{acc}/{}", folder.name))
    }

    /// Clear all state, back to an unloaded root.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub async fn enter<B: DocumentBackend>(
        &mut self,
        backend: &B,
        folder_id: EntityId,
    ) -> Result<()> {
        self.move_to(backend, Some(folder_id)).await
    }

    /// Go to the parent of the current folder.
    pub async fn up<B: DocumentBackend>(&mut self, backend: &B) -> Result<()> {
        let target = match self.path.len() {
            0 | 1 => None,
            len => Some(self.path[len - 2].id.clone()),
        };
        self.move_to(backend, target).await
    }

    pub async fn go_to_root<B: DocumentBackend>(&mut self, backend: &B) -> Result<()> {
        self.move_to(backend, None).await
    }

    /// Reload the current folder's listings and path.
    ///
    /// A current folder that no longer exists silently falls back to the root.
    pub async fn refresh<B: DocumentBackend>(&mut self, backend: &B) -> Result<()> {
        match self.load(backend).await {
            Err(error)
                if error.kind() == ErrorKind::NotFound && self.current_folder_id.is_some() =>
            {
                tracing::debug!("Current folder vanished ({error}), returning to root");
                self.current_folder_id = None;
                self.load(backend).await
            }
            other => other,
        }
    }

    async fn move_to<B: DocumentBackend>(
        &mut self,
        backend: &B,
        target: Option<EntityId>,
    ) -> Result<()> {
        let previous = std::mem::replace(&mut self.current_folder_id, target);
        let result = self.refresh(backend).await;
        if result.is_err() {
            self.current_folder_id = previous;
        }
        result
    }

    async fn load<B: DocumentBackend>(&mut self, backend: &B) -> Result<()> {
        let current = self.current_folder_id.as_ref();
        let path = match current {
            Some(id) => build_path(backend, id).await?,
            None => Vec::new(),
        };
        let folders = backend.list_folders(current).await?;
        let files = backend.list_files(current).await?;

        tracing::debug!(
            "Loaded {} folders and {} files at depth {}",
            folders.len(),
            files.len(),
            path.len()
        );
        self.path = path;
        self.folders = folders;
        self.files = files;
        Ok(())
    }

    /// Find a folder in the current listing by id, name or unique id prefix.
    pub fn find_folder(&self, query: &str) -> Result<&Folder> {
        match self.resolve_in(query, true, false)? {
            Listed::Folder(folder) => Ok(folder),
            Listed::File(_) => Err(Error::NotFound(format!("Folder {query}"))),
        }
    }

    /// Find a file in the current listing by id, name or unique id prefix.
    pub fn find_file(&self, query: &str) -> Result<&FileEntry> {
        match self.resolve_in(query, false, true)? {
            Listed::File(file) => Ok(file),
            Listed::Folder(_) => Err(Error::NotFound(format!("File {query}"))),
        }
    }

    /// Find any entry in the current listing.
    ///
    /// Exact id wins over exact name, which wins over a unique id prefix.
    pub fn resolve(&self, query: &str) -> Result<Listed<'_>> {
        self.resolve_in(query, true, true)
    }

    fn resolve_in(&self, query: &str, folders: bool, files: bool) -> Result<Listed<'_>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("Nothing to look up".to_string()));
        }

        let mut entries: Vec<Listed<'_>> = Vec::new();
        if folders {
            entries.extend(self.folders.iter().map(Listed::Folder));
        }
        if files {
            entries.extend(self.files.iter().map(Listed::File));
        }

        let tiers: [&dyn Fn(&Listed<'_>) -> bool; 3] = [
            &|entry| entry.id().as_str() == query,
            &|entry| entry.name() == query,
            &|entry| entry.id().as_str().starts_with(query),
        ];

        for tier in tiers {
            let found: Vec<&Listed<'_>> = entries.iter().filter(|entry| tier(entry)).collect();
            match found.as_slice() {
                [] => {}
                [only] => return Ok(**only),
                many => {
                    return Err(Error::InvalidInput(format!(
                        "\"{query}\" matches {} entries, use an id",
                        many.len()
                    )))
                }
            }
        }

        Err(Error::NotFound(format!("\"{query}\"")))
    }
}

/// Rebuild the ancestor chain of `folder_id`, top level first.
///
/// Fails with `NotFound` only when `folder_id` itself is missing. A missing
/// ancestor or a cycle ends the walk early and yields a shorter path.
pub async fn build_path<B: DocumentBackend>(
    backend: &B,
    folder_id: &EntityId,
) -> Result<Vec<Folder>> {
    let leaf = backend
        .get_folder(folder_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Folder {folder_id}")))?;

    let mut visited = HashSet::from([leaf.id.clone()]);
    let mut next = leaf.parent_id.clone();
    let mut path = vec![leaf];

    while let Some(parent_id) = next {
        if !visited.insert(parent_id.clone()) {
            tracing::warn!("Cycle at folder {parent_id}, truncating path");
            break;
        }
        let Some(parent) = backend.get_folder(&parent_id).await? else {
            tracing::warn!("Parent folder {parent_id} is missing, truncating path");
            break;
        };
        next = parent.parent_id.clone();
        path.push(parent);
    }

    path.reverse();
    Ok(path)
}
