//! On-device key-value store backed by the `kv_store` table

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

use super::SharedDatabase;

/// String key-value store, the persistence layer of the local backend.
#[derive(Clone)]
pub struct KeyValueStore {
    db: SharedDatabase,
}

impl KeyValueStore {
    pub const fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Read a raw value.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query("SELECT value FROM kv_store WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row.get::<String>(0)?))
        } else {
            Ok(None)
        }
    }

    /// Write a raw value, replacing any previous one.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }

    /// Remove a key. Missing keys are ignored.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute("DELETE FROM kv_store WHERE key = ?", [key])
            .await?;
        Ok(())
    }

    /// Write several values atomically.
    pub async fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute("BEGIN TRANSACTION", ()).await?;

        for (key, value) in entries {
            if let Err(e) = conn
                .execute(
                    "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?, ?)",
                    [*key, value.as_str()],
                )
                .await
            {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(e.into());
            }
        }

        if let Err(e) = conn.execute("COMMIT", ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
        Ok(())
    }

    /// Read a JSON value, returning `T::default()` when the key is unset.
    pub async fn get_json<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        match self.get(key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(T::default()),
        }
    }

    /// Serialize and write a JSON value.
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw).await
    }
}
