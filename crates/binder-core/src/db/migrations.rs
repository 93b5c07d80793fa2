//! Versioned schema migrations shared by the local store and cloud metadata.

use crate::error::Result;
use libsql::{params, Connection};

/// Ordered schema steps. A step runs once, in its own transaction.
const MIGRATIONS: &[(i32, &[&str])] = &[
    (
        1,
        &["CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )"],
    ),
    (
        2,
        &[
            "CREATE TABLE IF NOT EXISTS folders (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                parent_id TEXT REFERENCES folders(id) ON DELETE CASCADE,
                owner_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_folders_owner_parent ON folders(owner_id, parent_id)",
            "CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('note', 'upload')),
                content TEXT,
                file_path TEXT,
                mime_type TEXT,
                file_size INTEGER,
                folder_id TEXT REFERENCES folders(id) ON DELETE CASCADE,
                owner_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_files_owner_folder ON files(owner_id, folder_id)",
        ],
    ),
];

const CURRENT_VERSION: i32 = 2;

/// Bring the schema up to [`CURRENT_VERSION`].
pub async fn run(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        (),
    )
    .await?;

    let installed = get_version(conn).await?;
    for (version, statements) in MIGRATIONS {
        if *version > installed {
            apply(conn, *version, statements).await?;
        }
    }
    Ok(())
}

async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get::<i32>(0)?),
        None => Ok(0),
    }
}

/// Run `statements` and record `version` in one transaction.
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    // libsql has no execute_batch, so statements run one at a time
    let steps = async {
        for stmt in statements {
            conn.execute(stmt, ()).await?;
        }
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![version],
        )
        .await?;
        conn.execute("COMMIT", ()).await
    };
    if let Err(error) = steps.await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(error.into());
    }

    tracing::info!("Migrated database to version {version} (latest {CURRENT_VERSION})");
    Ok(())
}
