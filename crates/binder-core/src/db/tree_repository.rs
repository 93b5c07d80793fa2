//! Folder/file metadata repository over the `folders` and `files` tables

use libsql::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::models::{EntityId, EntityKind, FileEntry, Folder, OwnerId};

const FOLDER_COLUMNS: &str = "id, name, parent_id, owner_id, created_at, updated_at";
const FILE_COLUMNS: &str = "id, name, type, content, file_path, mime_type, file_size, \
                            folder_id, owner_id, created_at, updated_at";

/// Descendants of `?1` (inclusive) owned by `?2`. `UNION` stops on cycles.
const SUBTREE_CTE: &str = "WITH RECURSIVE subtree(id) AS (
        SELECT id FROM folders WHERE id = ?1 AND owner_id = ?2
        UNION
        SELECT f.id FROM folders f JOIN subtree s ON f.parent_id = s.id WHERE f.owner_id = ?2
    )";

/// Owner-scoped metadata repository. Every statement filters by owner.
pub struct LibSqlTreeRepository<'a> {
    conn: &'a Connection,
    owner: &'a OwnerId,
}

impl<'a> LibSqlTreeRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection, owner: &'a OwnerId) -> Self {
        Self { conn, owner }
    }

    pub async fn list_folders(&self, parent_id: Option<&EntityId>) -> Result<Vec<Folder>> {
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders
             WHERE owner_id = ? AND parent_id IS ?
             ORDER BY name, created_at, id"
        );
        let mut rows = self
            .conn
            .query(
                &sql,
                params![self.owner.as_str(), parent_id.map(ToString::to_string)],
            )
            .await?;

        let mut folders = Vec::new();
        while let Some(row) = rows.next().await? {
            folders.push(parse_folder(&row)?);
        }
        Ok(folders)
    }

    pub async fn list_files(&self, folder_id: Option<&EntityId>) -> Result<Vec<FileEntry>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE owner_id = ? AND folder_id IS ?
             ORDER BY name, created_at, id"
        );
        let mut rows = self
            .conn
            .query(
                &sql,
                params![self.owner.as_str(), folder_id.map(ToString::to_string)],
            )
            .await?;

        let mut files = Vec::new();
        while let Some(row) = rows.next().await? {
            files.push(parse_file(&row)?);
        }
        Ok(files)
    }

    pub async fn get_folder(&self, id: &EntityId) -> Result<Option<Folder>> {
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ? AND owner_id = ?");
        let mut rows = self
            .conn
            .query(&sql, params![id.as_str(), self.owner.as_str()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_folder(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_file(&self, id: &EntityId) -> Result<Option<FileEntry>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ? AND owner_id = ?");
        let mut rows = self
            .conn
            .query(&sql, params![id.as_str(), self.owner.as_str()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_file(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn insert_folder(&self, folder: &Folder) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO folders (id, name, parent_id, owner_id, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    folder.id.as_str(),
                    folder.name.as_str(),
                    folder.parent_id.as_ref().map(ToString::to_string),
                    self.owner.as_str(),
                    folder.created_at,
                    folder.updated_at
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn insert_file(&self, file: &FileEntry) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO files (id, name, type, content, file_path, mime_type, file_size,
                                    folder_id, owner_id, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    file.id.as_str(),
                    file.name.as_str(),
                    file.kind.as_str(),
                    file.content.clone(),
                    file.storage_key.clone(),
                    file.mime_type.clone(),
                    file.byte_size,
                    file.folder_id.as_ref().map(ToString::to_string),
                    self.owner.as_str(),
                    file.created_at,
                    file.updated_at
                ],
            )
            .await?;
        Ok(())
    }

    /// Rename a folder or file, failing with `NotFound` when nothing matched.
    pub async fn rename(&self, kind: EntityKind, id: &EntityId, name: &str) -> Result<()> {
        let table = match kind {
            EntityKind::Folder => "folders",
            EntityKind::File => "files",
        };
        let now = chrono::Utc::now().timestamp_millis();
        let sql =
            format!("UPDATE {table} SET name = ?, updated_at = ? WHERE id = ? AND owner_id = ?");

        let rows = self
            .conn
            .execute(&sql, params![name, now, id.as_str(), self.owner.as_str()])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("{kind} {id}")));
        }
        Ok(())
    }

    /// Replace the text of a note.
    pub async fn update_note_content(&self, id: &EntityId, text: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let rows = self
            .conn
            .execute(
                "UPDATE files SET content = ?, updated_at = ?
                 WHERE id = ? AND owner_id = ? AND type = 'note'",
                params![text, now, id.as_str(), self.owner.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("Note {id}")));
        }
        Ok(())
    }

    /// Delete a single file row, returning its storage key if it had one.
    pub async fn delete_file(&self, id: &EntityId) -> Result<Option<String>> {
        let file = self
            .get_file(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("File {id}")))?;

        self.conn
            .execute(
                "DELETE FROM files WHERE id = ? AND owner_id = ?",
                params![id.as_str(), self.owner.as_str()],
            )
            .await?;

        Ok(file.storage_key)
    }

    /// Delete a folder with all descendant folders and files in one transaction.
    ///
    /// Returns the storage keys of every deleted upload so the caller can
    /// remove the blobs afterwards.
    pub async fn delete_folder_cascade(&self, id: &EntityId) -> Result<Vec<String>> {
        if self.get_folder(id).await?.is_none() {
            return Err(Error::NotFound(format!("Folder {id}")));
        }

        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        match self.delete_subtree_rows(id).await {
            Ok(keys) => {
                if let Err(e) = self.conn.execute("COMMIT", ()).await {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e.into());
                }
                Ok(keys)
            }
            Err(e) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(e)
            }
        }
    }

    async fn delete_subtree_rows(&self, id: &EntityId) -> Result<Vec<String>> {
        let owner = self.owner.as_str();

        let sql = format!(
            "{SUBTREE_CTE}
             SELECT file_path FROM files
             WHERE owner_id = ?2 AND file_path IS NOT NULL
               AND folder_id IN (SELECT id FROM subtree)"
        );
        let mut rows = self.conn.query(&sql, params![id.as_str(), owner]).await?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next().await? {
            keys.push(row.get::<String>(0)?);
        }

        let sql = format!(
            "{SUBTREE_CTE}
             DELETE FROM files WHERE owner_id = ?2 AND folder_id IN (SELECT id FROM subtree)"
        );
        self.conn.execute(&sql, params![id.as_str(), owner]).await?;

        let sql = format!(
            "{SUBTREE_CTE}
             DELETE FROM folders WHERE owner_id = ?2 AND id IN (SELECT id FROM subtree)"
        );
        self.conn.execute(&sql, params![id.as_str(), owner]).await?;

        Ok(keys)
    }

    /// All descendant folders (excluding `id`) and files, in two queries.
    pub async fn list_subtree(&self, id: &EntityId) -> Result<(Vec<Folder>, Vec<FileEntry>)> {
        let owner = self.owner.as_str();

        let sql = format!(
            "{SUBTREE_CTE}
             SELECT {FOLDER_COLUMNS} FROM folders
             WHERE owner_id = ?2 AND id != ?1 AND id IN (SELECT id FROM subtree)
             ORDER BY name, created_at, id"
        );
        let mut rows = self.conn.query(&sql, params![id.as_str(), owner]).await?;
        let mut folders = Vec::new();
        while let Some(row) = rows.next().await? {
            folders.push(parse_folder(&row)?);
        }

        let sql = format!(
            "{SUBTREE_CTE}
             SELECT {FILE_COLUMNS} FROM files
             WHERE owner_id = ?2 AND folder_id IN (SELECT id FROM subtree)
             ORDER BY name, created_at, id"
        );
        let mut rows = self.conn.query(&sql, params![id.as_str(), owner]).await?;
        let mut files = Vec::new();
        while let Some(row) = rows.next().await? {
            files.push(parse_file(&row)?);
        }

        Ok((folders, files))
    }
}

/// Parse a folder from a database row
fn parse_folder(row: &Row) -> Result<Folder> {
    Ok(Folder {
        id: row.get::<String>(0)?.parse()?,
        name: row.get(1)?,
        parent_id: parse_optional_id(row.get::<Option<String>>(2)?)?,
        owner: OwnerId::new(row.get::<String>(3)?)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Parse a file from a database row
fn parse_file(row: &Row) -> Result<FileEntry> {
    Ok(FileEntry {
        id: row.get::<String>(0)?.parse()?,
        name: row.get(1)?,
        kind: row.get::<String>(2)?.parse()?,
        content: row.get(3)?,
        storage_key: row.get(4)?,
        mime_type: row.get(5)?,
        byte_size: row.get(6)?,
        folder_id: parse_optional_id(row.get::<Option<String>>(7)?)?,
        owner: OwnerId::new(row.get::<String>(8)?)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn parse_optional_id(value: Option<String>) -> Result<Option<EntityId>> {
    value.map(|raw| raw.parse()).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::FileKind;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn owner() -> OwnerId {
        OwnerId::new("user-1").unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_and_list_sorted_by_name() {
        let db = setup().await;
        let owner = owner();
        let repo = LibSqlTreeRepository::new(db.connection(), &owner);

        for name in ["Physics", "Biology", "Math"] {
            repo.insert_folder(&Folder::new(name, None, owner.clone()))
                .await
                .unwrap();
        }

        let names: Vec<String> = repo
            .list_folders(None)
            .await
            .unwrap()
            .into_iter()
            .map(|folder| folder.name)
            .collect();
        assert_eq!(names, vec!["Biology", "Math", "Physics"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_listing_is_owner_scoped() {
        let db = setup().await;
        let alice = OwnerId::new("alice").unwrap();
        let bob = OwnerId::new("bob").unwrap();

        LibSqlTreeRepository::new(db.connection(), &alice)
            .insert_folder(&Folder::new("Private", None, alice.clone()))
            .await
            .unwrap();

        let bob_repo = LibSqlTreeRepository::new(db.connection(), &bob);
        assert!(bob_repo.list_folders(None).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_file_roundtrip_keeps_nullable_columns() {
        let db = setup().await;
        let owner = owner();
        let repo = LibSqlTreeRepository::new(db.connection(), &owner);

        let note = FileEntry::note("todo", "buy milk", None, owner.clone());
        repo.insert_file(&note).await.unwrap();

        let fetched = repo.get_file(&note.id).await.unwrap().unwrap();
        assert_eq!(fetched, note);
        assert_eq!(fetched.kind, FileKind::Note);
        assert_eq!(fetched.storage_key, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rename_missing_is_not_found() {
        let db = setup().await;
        let owner = owner();
        let repo = LibSqlTreeRepository::new(db.connection(), &owner);

        let error = repo
            .rename(EntityKind::Folder, &EntityId::generate(), "x")
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cascade_delete_returns_storage_keys() {
        let db = setup().await;
        let owner = owner();
        let repo = LibSqlTreeRepository::new(db.connection(), &owner);

        let top = Folder::new("top", None, owner.clone());
        let child = Folder::new("child", Some(top.id.clone()), owner.clone());
        let sibling = Folder::new("sibling", None, owner.clone());
        repo.insert_folder(&top).await.unwrap();
        repo.insert_folder(&child).await.unwrap();
        repo.insert_folder(&sibling).await.unwrap();

        let mut upload =
            FileEntry::upload("img.png", "image/png", 3, Some(child.id.clone()), owner.clone());
        upload.storage_key = Some("user-1/1_a.png".to_string());
        repo.insert_file(&upload).await.unwrap();

        let keys = repo.delete_folder_cascade(&top.id).await.unwrap();
        assert_eq!(keys, vec!["user-1/1_a.png".to_string()]);

        assert!(repo.get_folder(&child.id).await.unwrap().is_none());
        assert!(repo.get_file(&upload.id).await.unwrap().is_none());
        assert!(repo.get_folder(&sibling.id).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_subtree_collects_all_descendants() {
        let db = setup().await;
        let owner = owner();
        let repo = LibSqlTreeRepository::new(db.connection(), &owner);

        let top = Folder::new("top", None, owner.clone());
        let mid = Folder::new("mid", Some(top.id.clone()), owner.clone());
        let leaf = Folder::new("leaf", Some(mid.id.clone()), owner.clone());
        for folder in [&top, &mid, &leaf] {
            repo.insert_folder(folder).await.unwrap();
        }
        repo.insert_file(&FileEntry::note("a", "1", Some(top.id.clone()), owner.clone()))
            .await
            .unwrap();
        repo.insert_file(&FileEntry::note("b", "2", Some(leaf.id.clone()), owner.clone()))
            .await
            .unwrap();
        repo.insert_file(&FileEntry::note("outside", "3", None, owner.clone()))
            .await
            .unwrap();

        let (folders, files) = repo.list_subtree(&top.id).await.unwrap();
        let folder_names: Vec<&str> = folders.iter().map(|f| f.name.as_str()).collect();
        let file_names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(folder_names, vec!["leaf", "mid"]);
        assert_eq!(file_names, vec!["a", "b"]);
    }
}
