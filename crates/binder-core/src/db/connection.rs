//! libSQL handles for the local store and the cloud metadata replica.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use libsql::{Builder, Connection, Database as LibSqlDatabase};
use tokio::sync::Mutex;

use super::migrations;
use crate::error::Result;

const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Shared handle used by repositories and backends.
///
/// The mutex serializes every statement issued by one process.
pub type SharedDatabase = Arc<Mutex<Database>>;

/// Connection details for a Turso-hosted primary.
#[derive(Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Remote database URL, e.g. `libsql://binder.turso.io`.
    pub url: String,
    pub auth_token: String,
    /// Background pull interval. `None` only syncs on open.
    pub sync_interval: Option<Duration>,
}

impl SyncConfig {
    pub fn new(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: auth_token.into(),
            sync_interval: Some(DEFAULT_SYNC_INTERVAL),
        }
    }

    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Option<Duration>) -> Self {
        self.sync_interval = interval;
        self
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("url", &self.url)
            .field("auth_token", &"<redacted>")
            .field("sync_interval", &self.sync_interval)
            .finish()
    }
}

/// A migrated libSQL database with one open connection.
pub struct Database {
    inner: LibSqlDatabase,
    conn: Connection,
    replica: bool,
}

impl Database {
    /// Open (or create) a database file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let inner = Builder::new_local(&path).build().await?;
        tracing::debug!("Opened database at {path}");
        Self::prepare(inner, false).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let inner = Builder::new_local(":memory:").build().await?;
        Self::prepare(inner, false).await
    }

    /// Open an embedded replica of a remote primary.
    ///
    /// Reads are served from `local_path`; writes go to the primary. The
    /// replica is pulled once before migrations so an existing remote schema
    /// is seen.
    pub async fn open_replica(local_path: impl AsRef<Path>, sync: SyncConfig) -> Result<Self> {
        let path = local_path.as_ref().to_string_lossy().into_owned();
        let mut builder = Builder::new_remote_replica(&path, sync.url, sync.auth_token);
        if let Some(interval) = sync.sync_interval {
            builder = builder.sync_interval(interval);
        }

        let inner = builder.build().await?;
        inner.sync().await?;
        tracing::debug!("Replica at {path} pulled from remote");
        Self::prepare(inner, true).await
    }

    async fn prepare(inner: LibSqlDatabase, replica: bool) -> Result<Self> {
        let conn = inner.connect()?;

        // WAL and synchronous are not supported on every replica build.
        conn.execute("PRAGMA journal_mode = WAL;", ()).await.ok();
        conn.execute("PRAGMA synchronous = NORMAL;", ()).await.ok();
        conn.execute("PRAGMA foreign_keys = ON;", ()).await?;

        migrations::run(&conn).await?;
        Ok(Self {
            inner,
            conn,
            replica,
        })
    }

    #[must_use]
    pub fn into_shared(self) -> SharedDatabase {
        Arc::new(Mutex::new(self))
    }

    /// Pull remote changes. A no-op for local databases.
    pub async fn sync(&self) -> Result<()> {
        if self.replica {
            self.inner.sync().await?;
            tracing::debug!("Replica synced");
        }
        Ok(())
    }

    pub const fn is_replica(&self) -> bool {
        self.replica
    }

    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    async fn table_names(db: &Database) -> Vec<String> {
        let mut rows = db
            .connection()
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                (),
            )
            .await
            .unwrap();
        let mut names = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            names.push(row.get::<String>(0).unwrap());
        }
        names
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_database_is_migrated() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(!db.is_replica());

        let tables = table_names(&db).await;
        for expected in ["files", "folders", "kv_store", "schema_version"] {
            assert!(tables.iter().any(|name| name == expected), "missing {expected}");
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn foreign_keys_are_enforced() {
        let db = Database::open_in_memory().await.unwrap();
        let mut rows = db
            .connection()
            .query("PRAGMA foreign_keys", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn file_database_persists_between_handles() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("binder.db");

        {
            let db = Database::open(&path).await.unwrap();
            db.connection()
                .execute("INSERT INTO kv_store (key, value) VALUES ('probe', '1')", ())
                .await
                .unwrap();
        }

        let db = Database::open(&path).await.unwrap();
        let mut rows = db
            .connection()
            .query("SELECT value FROM kv_store WHERE key = 'probe'", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<String>(0).unwrap(), "1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_is_noop_for_local_database() {
        let db = Database::open_in_memory().await.unwrap();
        db.sync().await.unwrap();
    }

    #[test]
    fn sync_config_debug_hides_token() {
        let config = SyncConfig::new("libsql://binder.turso.io", "secret-token");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("libsql://binder.turso.io"));
        assert!(!rendered.contains("secret-token"));
        assert_eq!(config.sync_interval, Some(DEFAULT_SYNC_INTERVAL));
        assert_eq!(config.with_sync_interval(None).sync_interval, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "Requires TURSO_DATABASE_URL and TURSO_AUTH_TOKEN"]
    async fn replica_syncs_with_turso() {
        let url = env::var("TURSO_DATABASE_URL").expect("TURSO_DATABASE_URL must be set");
        let token = env::var("TURSO_AUTH_TOKEN").expect("TURSO_AUTH_TOKEN must be set");

        let tmp = tempdir().unwrap();
        let db = Database::open_replica(tmp.path().join("replica.db"), SyncConfig::new(url, token))
            .await
            .unwrap();
        assert!(db.is_replica());
        db.sync().await.unwrap();
    }
}
