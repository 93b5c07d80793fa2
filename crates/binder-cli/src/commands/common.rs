use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use binder_core::backend::LocalBackend;
use binder_core::config::BinderConfig;
use binder_core::db::{Database, KeyValueStore, SharedDatabase, SyncConfig};
use binder_core::navigator::{Listed, TreeNavigator};
use binder_core::selector::{AuthContext, BackendSelector, RemoteResources, StorageMode};
use binder_core::storage::R2Storage;
use binder_core::{EntityId, FileEntry, Folder, Notice, OwnerId, Severity, Workspace};
use chrono::Utc;
use serde::Serialize;

use crate::error::CliError;

const LOCAL_DB_FILE: &str = "binder.db";
const CLOUD_DB_FILE: &str = "cloud.db";
const CURSOR_KEY_PREFIX: &str = "cli.cursor";

/// One CLI invocation: the workspace plus the store holding the cursor.
pub struct Session {
    store: KeyValueStore,
    workspace: Workspace<R2Storage>,
    load_error: Option<Notice>,
}

impl Session {
    pub async fn open(data_dir: Option<PathBuf>, user: Option<&str>) -> Result<Self, CliError> {
        let config = BinderConfig::from_env()?;
        let data_dir = resolve_data_dir(data_dir.or_else(|| config.data_dir.clone()))?;
        std::fs::create_dir_all(&data_dir)?;

        let store = KeyValueStore::new(
            Database::open(data_dir.join(LOCAL_DB_FILE))
                .await?
                .into_shared(),
        );
        let local = LocalBackend::new(store.clone()).with_quota_bytes(config.local_quota_bytes);

        let remote = match config.r2.clone() {
            Some(r2) => {
                let db = open_cloud_database(&data_dir, config.sync.clone()).await?;
                Some(
                    RemoteResources::new(db, R2Storage::new(r2))
                        .with_signed_url_ttl(config.signed_url_ttl),
                )
            }
            None => {
                tracing::debug!("R2 is not configured; cloud storage disabled");
                None
            }
        };

        let auth = auth_context(user)?;
        let selector = BackendSelector::load(store.clone(), local, remote, auth).await?;
        Self::start(store, selector).await
    }

    /// Restore the saved cursor for the active mode and load the listing.
    ///
    /// A failed load is kept rather than returned so `mode` still works when
    /// the active backend is unusable.
    pub async fn start(
        store: KeyValueStore,
        selector: BackendSelector<R2Storage>,
    ) -> Result<Self, CliError> {
        let cursor = store
            .get(&cursor_key(selector.mode()))
            .await?
            .and_then(|raw| raw.parse::<EntityId>().ok());

        let mut workspace = Workspace::new(selector);
        let load_error = workspace.open(cursor).await.err();

        Ok(Self {
            store,
            workspace,
            load_error,
        })
    }

    /// Fail with the initial load error, if there was one.
    pub fn ensure_ready(&self) -> Result<(), CliError> {
        self.load_error
            .clone()
            .map_or(Ok(()), |notice| Err(CliError::Notice(notice)))
    }

    pub fn workspace(&mut self) -> &mut Workspace<R2Storage> {
        &mut self.workspace
    }

    pub const fn mode(&self) -> StorageMode {
        self.workspace.mode()
    }

    pub const fn navigator(&self) -> &TreeNavigator {
        self.workspace.navigator()
    }

    /// Reload the listing for the active backend and record the outcome.
    pub async fn reload(&mut self) -> Result<(), CliError> {
        self.load_error = self.workspace.refresh().await.err();
        self.ensure_ready()
    }

    /// Remember the current folder for the next invocation.
    pub async fn save_cursor(&self) -> Result<(), CliError> {
        if self.load_error.is_some() {
            return Ok(());
        }
        let key = cursor_key(self.workspace.mode());
        match self.workspace.navigator().current_folder_id() {
            Some(id) => self.store.set(&key, id.as_str()).await?,
            None => self.store.remove(&key).await?,
        }
        Ok(())
    }
}

pub fn auth_context(user: Option<&str>) -> Result<AuthContext, CliError> {
    match user.map(str::trim).filter(|user| !user.is_empty()) {
        Some(user) => Ok(AuthContext::signed_in(OwnerId::new(user)?)),
        None => Ok(AuthContext::anonymous()),
    }
}

pub fn cursor_key(mode: StorageMode) -> String {
    format!("{CURSOR_KEY_PREFIX}.{mode}")
}

pub fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match explicit {
        Some(path) => Ok(path),
        None => dirs::data_dir()
            .map(|dir| dir.join("binder"))
            .ok_or(CliError::NoDataDir),
    }
}

async fn open_cloud_database(
    data_dir: &Path,
    sync: Option<SyncConfig>,
) -> Result<SharedDatabase, CliError> {
    let path = data_dir.join(CLOUD_DB_FILE);
    let Some(sync_config) = sync else {
        tracing::info!("Turso is not configured; cloud metadata kept in {}", path.display());
        return Ok(Database::open(&path).await?.into_shared());
    };

    tracing::info!("Cloud metadata synced with Turso");
    // The replica's initial sync needs a deeper stack than tokio workers get.
    let db = std::thread::Builder::new()
        .stack_size(8 * 1024 * 1024)
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(binder_core::Error::from)?;
            runtime.block_on(Database::open_replica(&path, sync_config))
        })
        .map_err(|error| CliError::DatabaseInit(error.to_string()))?
        .join()
        .map_err(|_| CliError::DatabaseInit("sync initialization thread panicked".into()))??;

    Ok(db.into_shared())
}

/// Print a non-error notice, or turn an error notice into a failure.
pub fn report(notice: Notice) -> Result<(), CliError> {
    if notice.is_error() {
        return Err(CliError::Notice(notice));
    }
    if notice.description.is_empty() {
        println!("{}", notice.title);
    } else {
        println!("{}: {}", notice.title, notice.description);
    }
    Ok(())
}

pub fn print_warning(notice: &Notice) {
    if matches!(notice.severity, Severity::Warning | Severity::Error) {
        eprintln!("{}: {}", notice.title, notice.description);
    }
}

pub fn find_folder<'a>(
    navigator: &'a TreeNavigator,
    target: &str,
) -> Result<&'a Folder, CliError> {
    Ok(navigator.find_folder(target.trim())?)
}

pub fn find_file<'a>(
    navigator: &'a TreeNavigator,
    target: &str,
) -> Result<&'a FileEntry, CliError> {
    Ok(navigator.find_file(target.trim())?)
}

pub fn resolve_entry<'a>(
    navigator: &'a TreeNavigator,
    target: &str,
) -> Result<Listed<'a>, CliError> {
    Ok(navigator.resolve(target.trim())?)
}

#[derive(Debug, Serialize)]
pub struct ListingItem {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub mime_type: Option<String>,
    pub size: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Serialize)]
pub struct Listing {
    pub mode: String,
    pub path: String,
    pub items: Vec<ListingItem>,
}

pub fn listing(mode: StorageMode, navigator: &TreeNavigator) -> Listing {
    let folders = navigator.folders().iter().map(|folder| ListingItem {
        id: folder.id.to_string(),
        name: folder.name.clone(),
        kind: "folder".to_string(),
        mime_type: None,
        size: None,
        created_at: folder.created_at,
        updated_at: folder.updated_at,
    });
    let files = navigator.files().iter().map(|file| ListingItem {
        id: file.id.to_string(),
        name: file.name.clone(),
        kind: file.kind.as_str().to_string(),
        mime_type: file.mime_type.clone(),
        size: file_size(file),
        created_at: file.created_at,
        updated_at: file.updated_at,
    });

    Listing {
        mode: mode.to_string(),
        path: navigator.display_path(),
        items: folders.chain(files).collect(),
    }
}

fn file_size(file: &FileEntry) -> Option<i64> {
    file.byte_size.or_else(|| {
        file.is_note()
            .then(|| file.content.as_ref().map_or(0, String::len))
            .and_then(|len| i64::try_from(len).ok())
    })
}

pub fn format_listing_lines(listing: &Listing) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    listing
        .items
        .iter()
        .map(|item| {
            let short_id = item.id.chars().take(13).collect::<String>();
            let size = item.size.map_or_else(|| "-".to_string(), format_size);
            let relative_time = format_relative_time(item.updated_at, now_ms);
            let name = if item.kind == "folder" {
                format!("{}/", item.name)
            } else {
                item.name.clone()
            };
            format!(
                "{short_id:<13}  {:<6}  {size:>8}  {relative_time:<8}  {name}",
                item.kind
            )
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: i64) -> String {
    const KIB: i64 = 1024;
    const MIB: i64 = 1024 * KIB;

    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < MIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Note text from the arguments, falling back to piped stdin.
pub fn resolve_text(parts: &[String]) -> Result<Option<String>, CliError> {
    if let Some(text) = normalize_content(&parts.join(" ")) {
        return Ok(Some(text));
    }
    read_piped_stdin()
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn guess_mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Write `bytes` to `output`, or to `default_name` in the working directory.
pub fn write_output(
    output: Option<&Path>,
    default_name: &str,
    bytes: &[u8],
) -> Result<PathBuf, CliError> {
    let path = output.map_or_else(|| PathBuf::from(default_name), Path::to_path_buf);
    std::fs::write(&path, bytes)?;
    Ok(path)
}
