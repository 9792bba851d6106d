//! SQLite-backed metadata tracker.
//!
//! [`MetadataStore`] is the durable record of groups, projects, and
//! per-file indexing state. It answers "which projects are in this group"
//! and "which files changed since they were last indexed", and is the only
//! place that knows a project's last successful chunk count.
//!
//! # Schema
//!
//! | Table | Key | Relations |
//! |-------|-----|-----------|
//! | `groups` | `name` unique | |
//! | `projects` | `name` unique | `group_id → groups` (on delete set null) |
//! | `files` | `(project_id, file_path)` unique | `project_id → projects` (on delete cascade) |
//!
//! Timestamps are stored as Unix seconds. Cascades are also carried out
//! explicitly inside a transaction, so they hold even on a connection where
//! foreign keys are off.

use anyhow::Result as AnyResult;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use vectcode_core::models::{Group, NewProject, Project, ProjectFilter, TrackedFile};

use crate::db;
use crate::error::MetadataError;
use crate::migrate;

pub type Result<T> = std::result::Result<T, MetadataError>;

const PROJECT_COLUMNS: &str = "p.id, p.name, p.path, p.language, p.description, p.group_id, \
     g.name AS group_name, p.chunk_count, p.last_indexed_at, p.last_modified_at, \
     p.created_at, p.updated_at";

const FILE_COLUMNS: &str =
    "id, project_id, file_path, last_modified_at, last_indexed_at, chunk_count, file_hash";

pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the database at `path` and make sure the schema exists.
    pub async fn open(path: &Path) -> AnyResult<Self> {
        let pool = db::connect(path).await?;
        migrate::run_metadata_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ============ Groups ============

    /// Create a group.
    ///
    /// # Errors
    ///
    /// [`MetadataError::Conflict`] if a group with `name` already exists.
    pub async fn create_group(&self, name: &str, description: &str) -> Result<Group> {
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO groups (name, description, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(description)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "group", name))?;

        self.get_group(name).await
    }

    /// Look up a group by name. [`MetadataError::NotFound`] if absent.
    pub async fn get_group(&self, name: &str) -> Result<Group> {
        sqlx::query(
            "SELECT id, name, description, created_at, updated_at FROM groups WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| group_from_row(&row))
        .ok_or_else(|| MetadataError::not_found("group", name))
    }

    /// Fetch a group, creating it with an empty description if absent.
    pub async fn get_or_create_group(&self, name: &str) -> Result<Group> {
        match self.get_group(name).await {
            Ok(group) => Ok(group),
            Err(MetadataError::NotFound { .. }) => {
                log::info!("creating group {}", name);
                self.create_group(name, "").await
            }
            Err(e) => Err(e),
        }
    }

    /// All groups, ordered by name.
    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        let rows = sqlx::query(
            "SELECT id, name, description, created_at, updated_at FROM groups ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(group_from_row).collect())
    }

    /// Groups with the number of projects assigned to each, ordered by name.
    pub async fn list_groups_with_counts(&self) -> Result<Vec<(Group, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT g.id, g.name, g.description, g.created_at, g.updated_at,
                   COUNT(p.id) AS project_count
            FROM groups g
            LEFT JOIN projects p ON p.group_id = g.id
            GROUP BY g.id
            ORDER BY g.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| (group_from_row(row), row.get::<i64, _>("project_count")))
            .collect())
    }

    /// Replace a group's description. [`MetadataError::NotFound`] if absent.
    pub async fn update_group(&self, name: &str, description: &str) -> Result<Group> {
        let result =
            sqlx::query("UPDATE groups SET description = ?, updated_at = ? WHERE name = ?")
                .bind(description)
                .bind(Utc::now().timestamp())
                .bind(name)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::not_found("group", name));
        }
        self.get_group(name).await
    }

    /// Delete a group. Member projects survive with their group cleared.
    /// [`MetadataError::NotFound`] if absent.
    pub async fn delete_group(&self, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM groups WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?;
        let id = id.ok_or_else(|| MetadataError::not_found("group", name))?;

        sqlx::query("UPDATE projects SET group_id = NULL, updated_at = ? WHERE group_id = ?")
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM groups WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ============ Projects ============

    /// Insert a project row and return it with its group name resolved.
    ///
    /// # Errors
    ///
    /// - [`MetadataError::Conflict`] if the name is taken.
    /// - [`MetadataError::NotFound`] if `group_id` names no group.
    pub async fn create_project(&self, project: &NewProject) -> Result<Project> {
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO projects (name, path, language, description, group_id, chunk_count,
                                  last_indexed_at, last_modified_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&project.name)
        .bind(&project.path)
        .bind(&project.language)
        .bind(&project.description)
        .bind(project.group_id)
        .bind(project.chunk_count)
        .bind(project.last_indexed_at.map(|t| t.timestamp()))
        .bind(project.last_modified_at.map(|t| t.timestamp()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "project", &project.name))?;

        self.get_project(&project.name).await
    }

    /// Look up a project by name. [`MetadataError::NotFound`] if absent.
    pub async fn get_project(&self, name: &str) -> Result<Project> {
        let sql = format!(
            "SELECT {} FROM projects p LEFT JOIN groups g ON p.group_id = g.id WHERE p.name = ?",
            PROJECT_COLUMNS
        );
        sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| project_from_row(&row))
            .ok_or_else(|| MetadataError::not_found("project", name))
    }

    /// Projects matching every set filter field, ordered by name.
    pub async fn list_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>> {
        let mut sql = format!(
            "SELECT {} FROM projects p LEFT JOIN groups g ON p.group_id = g.id WHERE 1 = 1",
            PROJECT_COLUMNS
        );
        if filter.group_id.is_some() {
            sql.push_str(" AND p.group_id = ?");
        }
        if filter.group_name.is_some() {
            sql.push_str(" AND g.name = ?");
        }
        if filter.name.is_some() {
            sql.push_str(" AND p.name = ?");
        }
        sql.push_str(" ORDER BY p.name");

        let mut query = sqlx::query(&sql);
        if let Some(group_id) = filter.group_id {
            query = query.bind(group_id);
        }
        if let Some(ref group_name) = filter.group_name {
            query = query.bind(group_name);
        }
        if let Some(ref name) = filter.name {
            query = query.bind(name);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(project_from_row).collect())
    }

    /// Projects in the named group. An unknown group has no projects.
    pub async fn projects_in_group(&self, group_name: &str) -> Result<Vec<Project>> {
        self.list_projects(&ProjectFilter::by_group(group_name))
            .await
    }

    /// Write every mutable field of `project`, looked up by name.
    /// [`MetadataError::NotFound`] if no project has that name.
    pub async fn update_project(&self, project: &Project) -> Result<Project> {
        let result = sqlx::query(
            r#"
            UPDATE projects SET
                path = ?,
                language = ?,
                description = ?,
                group_id = ?,
                chunk_count = ?,
                last_indexed_at = ?,
                last_modified_at = ?,
                updated_at = ?
            WHERE name = ?
            "#,
        )
        .bind(&project.path)
        .bind(&project.language)
        .bind(&project.description)
        .bind(project.group_id)
        .bind(project.chunk_count)
        .bind(project.last_indexed_at.map(|t| t.timestamp()))
        .bind(project.last_modified_at.map(|t| t.timestamp()))
        .bind(Utc::now().timestamp())
        .bind(&project.name)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "project", &project.name))?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::not_found("project", &project.name));
        }
        self.get_project(&project.name).await
    }

    /// Delete a project and all of its file rows in one transaction.
    /// [`MetadataError::NotFound`] if no project has that name.
    pub async fn delete_project(&self, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM projects WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?;
        let id = id.ok_or_else(|| MetadataError::not_found("project", name))?;

        sqlx::query("DELETE FROM files WHERE project_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ============ Files ============

    /// Insert or overwrite the row for `(file.project_id, file.file_path)`.
    /// [`MetadataError::NotFound`] if the project does not exist.
    pub async fn upsert_file(&self, file: &TrackedFile) -> Result<TrackedFile> {
        sqlx::query(
            r#"
            INSERT INTO files (project_id, file_path, last_modified_at, last_indexed_at,
                               chunk_count, file_hash)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_id, file_path) DO UPDATE SET
                last_modified_at = excluded.last_modified_at,
                last_indexed_at = excluded.last_indexed_at,
                chunk_count = excluded.chunk_count,
                file_hash = excluded.file_hash
            "#,
        )
        .bind(file.project_id)
        .bind(&file.file_path)
        .bind(file.last_modified_at.map(|t| t.timestamp()))
        .bind(file.last_indexed_at.map(|t| t.timestamp()))
        .bind(file.chunk_count)
        .bind(&file.file_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "file", &file.file_path))?;

        self.get_file(file.project_id, &file.file_path).await
    }

    /// [`MetadataError::NotFound`] if the project has no row for `file_path`.
    pub async fn get_file(&self, project_id: i64, file_path: &str) -> Result<TrackedFile> {
        let sql = format!(
            "SELECT {} FROM files WHERE project_id = ? AND file_path = ?",
            FILE_COLUMNS
        );
        sqlx::query(&sql)
            .bind(project_id)
            .bind(file_path)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| file_from_row(&row))
            .ok_or_else(|| MetadataError::not_found("file", file_key(project_id, file_path)))
    }

    /// All tracked files of a project, ordered by path.
    pub async fn list_files(&self, project_id: i64) -> Result<Vec<TrackedFile>> {
        let sql = format!(
            "SELECT {} FROM files WHERE project_id = ? ORDER BY file_path",
            FILE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(file_from_row).collect())
    }

    /// Files never indexed, or modified after their last indexing. Agrees
    /// with [`TrackedFile::is_stale`].
    pub async fn stale_files(&self, project_id: i64) -> Result<Vec<TrackedFile>> {
        let sql = format!(
            r#"
            SELECT {} FROM files
            WHERE project_id = ?
              AND (last_indexed_at IS NULL
                   OR (last_modified_at IS NOT NULL AND last_modified_at > last_indexed_at))
            ORDER BY file_path
            "#,
            FILE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(file_from_row).collect())
    }

    /// Re-read the mtime of every tracked file of a project from disk.
    ///
    /// `root` is the project directory the stored paths are relative to.
    /// Files that can no longer be stat'ed keep their recorded mtime.
    /// Returns the number of rows whose mtime changed.
    pub async fn refresh_file_mtimes(&self, project_id: i64, root: &Path) -> Result<usize> {
        let mut changed = 0;
        for file in self.list_files(project_id).await? {
            let modified = match std::fs::metadata(root.join(&file.file_path))
                .and_then(|m| m.modified())
            {
                Ok(t) => DateTime::<Utc>::from(t).timestamp(),
                Err(e) => {
                    log::debug!("cannot stat {}: {}", file.file_path, e);
                    continue;
                }
            };
            if file.last_modified_at.map(|t| t.timestamp()) == Some(modified) {
                continue;
            }
            sqlx::query("UPDATE files SET last_modified_at = ? WHERE id = ?")
                .bind(modified)
                .bind(file.id)
                .execute(&self.pool)
                .await?;
            changed += 1;
        }
        Ok(changed)
    }

    /// Remove one file row. [`MetadataError::NotFound`] if there is none.
    pub async fn delete_file(&self, project_id: i64, file_path: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM files WHERE project_id = ? AND file_path = ?")
            .bind(project_id)
            .bind(file_path)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::not_found(
                "file",
                file_key(project_id, file_path),
            ));
        }
        Ok(())
    }

    /// Remove every file row of a project. Returns how many were deleted.
    pub async fn delete_project_files(&self, project_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM files WHERE project_id = ?")
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn file_key(project_id: i64, file_path: &str) -> String {
    format!("{}:{}", project_id, file_path)
}

/// Map constraint violations on writes to the tracker's error kinds.
fn map_write_error(err: sqlx::Error, entity: &'static str, key: &str) -> MetadataError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return MetadataError::conflict(entity, key);
        }
        if db_err.is_foreign_key_violation() {
            let parent = if entity == "file" { "project" } else { "group" };
            return MetadataError::not_found(parent, format!("referenced by {} {}", entity, key));
        }
    }
    MetadataError::Database(err)
}

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn opt_ts(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

fn group_from_row(row: &SqliteRow) -> Group {
    Group {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: ts(row.get("created_at")),
        updated_at: ts(row.get("updated_at")),
    }
}

fn project_from_row(row: &SqliteRow) -> Project {
    Project {
        id: row.get("id"),
        name: row.get("name"),
        path: row.get("path"),
        language: row.get("language"),
        description: row.get("description"),
        group_id: row.get("group_id"),
        group_name: row.get("group_name"),
        chunk_count: row.get("chunk_count"),
        last_indexed_at: opt_ts(row.get("last_indexed_at")),
        last_modified_at: opt_ts(row.get("last_modified_at")),
        created_at: ts(row.get("created_at")),
        updated_at: ts(row.get("updated_at")),
    }
}

fn file_from_row(row: &SqliteRow) -> TrackedFile {
    TrackedFile {
        id: row.get("id"),
        project_id: row.get("project_id"),
        file_path: row.get("file_path"),
        last_modified_at: opt_ts(row.get("last_modified_at")),
        last_indexed_at: opt_ts(row.get("last_indexed_at")),
        chunk_count: row.get("chunk_count"),
        file_hash: row.get("file_hash"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, MetadataStore) {
        let tmp = TempDir::new().unwrap();
        let store = MetadataStore::open(&tmp.path().join("meta.db"))
            .await
            .unwrap();
        (tmp, store)
    }

    fn new_project(name: &str, group_id: Option<i64>) -> NewProject {
        NewProject {
            name: name.to_string(),
            path: format!("/src/{}", name),
            language: "go".to_string(),
            group_id,
            ..Default::default()
        }
    }

    fn at(secs: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(secs, 0)
    }

    fn tracked(project_id: i64, path: &str, modified: i64, indexed: Option<i64>) -> TrackedFile {
        TrackedFile {
            id: 0,
            project_id,
            file_path: path.to_string(),
            last_modified_at: at(modified),
            last_indexed_at: indexed.and_then(at),
            chunk_count: 1,
            file_hash: "abc".to_string(),
        }
    }

    #[tokio::test]
    async fn test_group_crud() {
        let (_tmp, store) = store().await;

        let group = store.create_group("backend", "services").await.unwrap();
        assert_eq!(group.name, "backend");
        assert_eq!(group.description, "services");

        let updated = store.update_group("backend", "all services").await.unwrap();
        assert_eq!(updated.description, "all services");
        assert_eq!(updated.id, group.id);

        store.create_group("alpha", "").await.unwrap();
        let names: Vec<String> = store
            .list_groups()
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["alpha", "backend"]);

        store.delete_group("backend").await.unwrap();
        assert!(store.get_group("backend").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_names_conflict() {
        let (_tmp, store) = store().await;

        store.create_group("g", "").await.unwrap();
        assert!(store.create_group("g", "").await.unwrap_err().is_conflict());

        store.create_project(&new_project("api", None)).await.unwrap();
        let err = store
            .create_project(&new_project("api", None))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_missing_names_not_found() {
        let (_tmp, store) = store().await;

        assert!(store.get_group("nope").await.unwrap_err().is_not_found());
        assert!(store
            .update_group("nope", "x")
            .await
            .unwrap_err()
            .is_not_found());
        assert!(store.delete_group("nope").await.unwrap_err().is_not_found());
        assert!(store.get_project("nope").await.unwrap_err().is_not_found());
        assert!(store
            .delete_project("nope")
            .await
            .unwrap_err()
            .is_not_found());
        assert!(store.get_file(1, "a.go").await.unwrap_err().is_not_found());
        assert!(store
            .delete_file(1, "a.go")
            .await
            .unwrap_err()
            .is_not_found());

        let mut ghost = store.create_project(&new_project("p", None)).await.unwrap();
        ghost.name = "ghost".to_string();
        assert!(store
            .update_project(&ghost)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_get_or_create_group_is_stable() {
        let (_tmp, store) = store().await;
        let first = store.get_or_create_group("infra").await.unwrap();
        let second = store.get_or_create_group("infra").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_project_round_trip_with_group() {
        let (_tmp, store) = store().await;
        let group = store.create_group("backend", "").await.unwrap();

        let mut new = new_project("api", Some(group.id));
        new.chunk_count = 7;
        new.last_indexed_at = at(1_700_000_000);
        let project = store.create_project(&new).await.unwrap();

        assert_eq!(project.group_name.as_deref(), Some("backend"));
        assert_eq!(project.chunk_count, 7);
        assert_eq!(project.last_indexed_at, at(1_700_000_000));
        assert!(project.last_modified_at.is_none());

        let mut changed = project.clone();
        changed.chunk_count = 9;
        changed.description = "public API".to_string();
        let updated = store.update_project(&changed).await.unwrap();
        assert_eq!(updated.chunk_count, 9);
        assert_eq!(updated.description, "public API");
    }

    #[tokio::test]
    async fn test_list_projects_filters() {
        let (_tmp, store) = store().await;
        let backend = store.create_group("backend", "").await.unwrap();
        store.create_group("frontend", "").await.unwrap();

        store
            .create_project(&new_project("svc-b", Some(backend.id)))
            .await
            .unwrap();
        store
            .create_project(&new_project("svc-a", Some(backend.id)))
            .await
            .unwrap();
        store.create_project(&new_project("web", None)).await.unwrap();

        let all = store.list_projects(&ProjectFilter::default()).await.unwrap();
        let names: Vec<&str> = all.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["svc-a", "svc-b", "web"]);

        let in_backend = store.projects_in_group("backend").await.unwrap();
        assert_eq!(in_backend.len(), 2);

        let by_id = store
            .list_projects(&ProjectFilter {
                group_id: Some(backend.id),
                name: Some("svc-b".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_id.len(), 1);

        assert!(store.projects_in_group("frontend").await.unwrap().is_empty());
        assert!(store.projects_in_group("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_group_keeps_projects() {
        let (_tmp, store) = store().await;
        let group = store.create_group("backend", "").await.unwrap();
        let project = store
            .create_project(&new_project("api", Some(group.id)))
            .await
            .unwrap();
        store
            .upsert_file(&tracked(project.id, "main.go", 100, Some(200)))
            .await
            .unwrap();

        store.delete_group("backend").await.unwrap();

        let after = store.get_project("api").await.unwrap();
        assert_eq!(after.group_id, None);
        assert_eq!(after.group_name, None);
        assert_eq!(store.list_files(project.id).await.unwrap().len(), 1);

        let counts = store.list_groups_with_counts().await.unwrap();
        assert!(counts.is_empty());
    }

    #[tokio::test]
    async fn test_delete_project_cascades_files() {
        let (_tmp, store) = store().await;
        let project = store.create_project(&new_project("api", None)).await.unwrap();
        let other = store.create_project(&new_project("web", None)).await.unwrap();
        for path in ["a.go", "b.go", "c.go"] {
            store
                .upsert_file(&tracked(project.id, path, 100, Some(200)))
                .await
                .unwrap();
        }
        store
            .upsert_file(&tracked(other.id, "a.go", 100, Some(200)))
            .await
            .unwrap();

        store.delete_project("api").await.unwrap();

        let orphans: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE project_id = ?")
                .bind(project.id)
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(orphans, 0);
        assert_eq!(store.list_files(other.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_file_overwrites_in_place() {
        let (_tmp, store) = store().await;
        let project = store.create_project(&new_project("api", None)).await.unwrap();

        let first = store
            .upsert_file(&tracked(project.id, "main.go", 100, Some(150)))
            .await
            .unwrap();

        let mut changed = tracked(project.id, "main.go", 300, Some(400));
        changed.file_hash = "def".to_string();
        changed.chunk_count = 4;
        let second = store.upsert_file(&changed).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.file_hash, "def");
        assert_eq!(second.chunk_count, 4);
        assert_eq!(second.last_indexed_at, at(400));
        assert_eq!(store.list_files(project.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_file_unknown_project() {
        let (_tmp, store) = store().await;
        let err = store
            .upsert_file(&tracked(999, "main.go", 1, None))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stale_files_agrees_with_predicate() {
        let (_tmp, store) = store().await;
        let project = store.create_project(&new_project("api", None)).await.unwrap();

        let rows = vec![
            tracked(project.id, "fresh.go", 100, Some(200)),
            tracked(project.id, "equal.go", 200, Some(200)),
            tracked(project.id, "modified.go", 300, Some(200)),
            tracked(project.id, "never.go", 100, None),
            TrackedFile {
                last_modified_at: None,
                ..tracked(project.id, "unknown.go", 0, Some(200))
            },
        ];
        for row in &rows {
            store.upsert_file(row).await.unwrap();
        }

        let stale: Vec<String> = store
            .stale_files(project.id)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.file_path)
            .collect();
        assert_eq!(stale, vec!["modified.go", "never.go"]);

        let from_predicate: Vec<String> = store
            .list_files(project.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|f| f.is_stale())
            .map(|f| f.file_path)
            .collect();
        assert_eq!(stale, from_predicate);
    }

    #[tokio::test]
    async fn test_refresh_file_mtimes_surfaces_edits() {
        let (tmp, store) = store().await;
        let project = store.create_project(&new_project("api", None)).await.unwrap();
        let root = tmp.path().join("api");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("edited.go"), "package api\n").unwrap();

        let indexed = Utc::now().timestamp() - 3600;
        for path in ["edited.go", "gone.go"] {
            store
                .upsert_file(&tracked(project.id, path, indexed - 10, Some(indexed)))
                .await
                .unwrap();
        }
        assert!(store.stale_files(project.id).await.unwrap().is_empty());

        assert_eq!(store.refresh_file_mtimes(project.id, &root).await.unwrap(), 1);
        let stale: Vec<String> = store
            .stale_files(project.id)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.file_path)
            .collect();
        assert_eq!(stale, vec!["edited.go"]);

        let gone = store.get_file(project.id, "gone.go").await.unwrap();
        assert_eq!(gone.last_modified_at, at(indexed - 10));
        assert_eq!(store.refresh_file_mtimes(project.id, &root).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_file_and_project_files() {
        let (_tmp, store) = store().await;
        let project = store.create_project(&new_project("api", None)).await.unwrap();
        for path in ["a.go", "b.go", "c.go"] {
            store
                .upsert_file(&tracked(project.id, path, 1, Some(2)))
                .await
                .unwrap();
        }

        store.delete_file(project.id, "a.go").await.unwrap();
        assert_eq!(store.list_files(project.id).await.unwrap().len(), 2);

        assert_eq!(store.delete_project_files(project.id).await.unwrap(), 2);
        assert!(store.list_files(project.id).await.unwrap().is_empty());
        assert!(store.get_project("api").await.is_ok());
    }
}
