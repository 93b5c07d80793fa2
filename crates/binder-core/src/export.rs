//! Folder archive export and single-file download.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write as _};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::backend::{DocumentBackend, Subtree};
use crate::models::{EntityId, FileEntry, FileKind, Folder};
use crate::names;
use crate::{Error, Result};

const UNTITLED: &str = "untitled";
const NOTE_EXTENSION: &str = ".txt";
const NOTE_MIME_TYPE: &str = "text/plain";

/// A file left out of an archive because its payload could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: String,
    pub reason: String,
}

/// What ended up in an archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// File entries written.
    pub written: usize,
    /// Directory entries written for empty folders.
    pub directories: usize,
    pub skipped: Vec<SkippedEntry>,
}

/// A finished ZIP archive of one folder.
#[derive(Debug, Clone)]
pub struct ExportedArchive {
    /// Suggested file name, `<root name>.zip`.
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub report: ExportReport,
}

/// A single file ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, PartialEq, Eq)]
enum PlannedEntry<'a> {
    Directory(String),
    File { path: String, file: &'a FileEntry },
}

/// Export `folder_id` and everything below it as a ZIP archive.
///
/// Entry paths are relative to the exported folder. Notes become `<name>.txt`
/// text entries and uploads keep their raw bytes. An upload whose payload
/// cannot be fetched is skipped and recorded in the report.
pub async fn export_folder<B: DocumentBackend>(
    backend: &B,
    folder_id: &EntityId,
    root_name: &str,
) -> Result<ExportedArchive> {
    if !backend.capabilities().archive_export {
        return Err(Error::FeatureUnavailable(
            "Archive export requires cloud storage".to_string(),
        ));
    }

    backend
        .get_folder(folder_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Folder {folder_id}")))?;

    let subtree = backend.list_subtree(folder_id).await?;
    let plan = plan_entries(folder_id, &subtree);
    tracing::debug!(
        "Exporting {} folders and {} files below {folder_id}",
        subtree.folders.len(),
        subtree.files.len()
    );

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut report = ExportReport::default();

    for entry in plan {
        match entry {
            PlannedEntry::Directory(path) => {
                zip.add_directory(path, options)?;
                report.directories += 1;
            }
            PlannedEntry::File { path, file } => match backend.fetch_file_bytes(file).await {
                Ok(bytes) => {
                    zip.start_file(path, options)?;
                    zip.write_all(&bytes)?;
                    report.written += 1;
                }
                Err(error) => {
                    tracing::warn!("Skipping {path} in export: {error}");
                    report.skipped.push(SkippedEntry {
                        path,
                        reason: error.to_string(),
                    });
                }
            },
        }
    }

    let bytes = zip.finish()?.into_inner();
    tracing::info!(
        "Exported {} entries ({} skipped) from folder {folder_id}",
        report.written,
        report.skipped.len()
    );

    Ok(ExportedArchive {
        file_name: format!("{}.zip", path_component(root_name)),
        bytes,
        report,
    })
}

/// Fetch one file for saving. Notes download as `<name>.txt`.
pub async fn download_file<B: DocumentBackend>(
    backend: &B,
    file: &FileEntry,
) -> Result<DownloadedFile> {
    let bytes = backend.fetch_file_bytes(file).await?;
    let (file_name, mime_type) = match file.kind {
        FileKind::Note => (
            format!("{}{NOTE_EXTENSION}", file.name),
            NOTE_MIME_TYPE.to_string(),
        ),
        FileKind::Upload => (file.name.clone(), file.mime_type_or_default().to_string()),
    };

    Ok(DownloadedFile {
        file_name,
        bytes,
        mime_type,
    })
}

/// Lay out archive entries depth-first, files before subfolders, each
/// group sorted by name. Names are made unique per directory.
fn plan_entries<'a>(root: &EntityId, subtree: &'a Subtree) -> Vec<PlannedEntry<'a>> {
    let mut children: HashMap<&EntityId, Vec<&Folder>> = HashMap::new();
    for folder in &subtree.folders {
        if let Some(parent) = &folder.parent_id {
            children.entry(parent).or_default().push(folder);
        }
    }
    let mut files: HashMap<&EntityId, Vec<&FileEntry>> = HashMap::new();
    for file in &subtree.files {
        if let Some(folder_id) = &file.folder_id {
            files.entry(folder_id).or_default().push(file);
        }
    }
    for group in children.values_mut() {
        group.sort_by(|a, b| (&a.name, a.created_at, &a.id).cmp(&(&b.name, b.created_at, &b.id)));
    }
    for group in files.values_mut() {
        group.sort_by(|a, b| (&a.name, a.created_at, &a.id).cmp(&(&b.name, b.created_at, &b.id)));
    }

    let mut plan = Vec::new();
    let mut visited = HashSet::from([root]);
    let mut stack: Vec<(&EntityId, String)> = vec![(root, String::new())];

    while let Some((folder_id, prefix)) = stack.pop() {
        let mut used = HashSet::new();

        for file in files.get(folder_id).into_iter().flatten().copied() {
            let name = unique_name(&mut used, entry_name(file));
            plan.push(PlannedEntry::File {
                path: format!("{prefix}{name}"),
                file,
            });
        }

        let mut pending = Vec::new();
        for folder in children.get(folder_id).into_iter().flatten().copied() {
            if !visited.insert(&folder.id) {
                continue;
            }
            let name = unique_name(&mut used, path_component(&folder.name));
            let path = format!("{prefix}{name}");
            let is_empty = !files.contains_key(&folder.id) && !children.contains_key(&folder.id);
            if is_empty {
                plan.push(PlannedEntry::Directory(path.clone()));
            }
            pending.push((&folder.id, format!("{path}/")));
        }
        stack.extend(pending.into_iter().rev());
    }

    plan
}

fn entry_name(file: &FileEntry) -> String {
    let name = path_component(&file.name);
    match file.kind {
        FileKind::Note => format!("{name}{NOTE_EXTENSION}"),
        FileKind::Upload => name,
    }
}

fn path_component(name: &str) -> String {
    let cleaned = names::sanitize(name);
    if cleaned.is_empty() || names::is_dot_only(&cleaned) {
        UNTITLED.to_string()
    } else {
        cleaned
    }
}

/// Claim `name` in `used`, appending ` (n)` before the extension on collision.
fn unique_name(used: &mut HashSet<String>, name: String) -> String {
    if used.insert(name.clone()) {
        return name;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{ext}")),
        _ => (name.clone(), String::new()),
    };
    (1..)
        .map(|n| format!("{stem} ({n}){ext}"))
        .find(|candidate| used.insert(candidate.clone()))
        .unwrap_or(name)
}
