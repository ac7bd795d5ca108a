//! SQLite persistence for templates and projects.
//!
//! A single connection is shared behind a mutex; every query runs on the
//! blocking thread pool so async callers never stall a runtime worker.
//! Names are UNIQUE in both tables, so concurrent creations with the same
//! name cannot both succeed.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::debug;

use crate::core::store::{ProjectStore, StoreError, TemplateStore};
use crate::domain::{
    NewProject, NewTemplate, Project, ProjectId, ProjectStatus, Template, TemplateId,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS templates (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    source_url  TEXT NOT NULL,
    language    TEXT NOT NULL DEFAULT '',
    tags        TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    template_id INTEGER NOT NULL,
    status      TEXT NOT NULL,
    remote_url  TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
"#;

const TEMPLATE_COLUMNS: &str =
    "id, name, description, source_url, language, tags, created_at, updated_at";

const PROJECT_COLUMNS: &str = "id, name, template_id, status, remote_url, created_at, updated_at";

/// SQLite-backed store implementing both `ProjectStore` and `TemplateStore`
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "Opening database");
        Self::init(Connection::open(path)?)
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// Map UNIQUE violations to `Conflict`, everything else to `Database`
fn write_error(err: rusqlite::Error, name: &str) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict(name.to_string())
        }
        _ => StoreError::Database(err),
    }
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<Template> {
    Ok(Template {
        id: TemplateId(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        source_url: row.get(3)?,
        language: row.get(4)?,
        tags: row.get(5)?,
        created_at: timestamp(row, 6)?,
        updated_at: timestamp(row, 7)?,
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    let status: String = row.get(3)?;
    let status = status
        .parse::<ProjectStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(Project {
        id: ProjectId(row.get(0)?),
        name: row.get(1)?,
        template_id: TemplateId(row.get(2)?),
        status,
        remote_url: row.get(4)?,
        created_at: timestamp(row, 5)?,
        updated_at: timestamp(row, 6)?,
    })
}

#[async_trait]
impl TemplateStore for SqliteStore {
    async fn create(&self, new: NewTemplate) -> Result<Template, StoreError> {
        self.with_conn(move |conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO templates (name, description, source_url, language, tags, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    new.name,
                    new.description,
                    new.source_url,
                    new.language,
                    new.tags,
                    now.to_rfc3339()
                ],
            )
            .map_err(|e| write_error(e, &new.name))?;

            Ok(Template {
                id: TemplateId(conn.last_insert_rowid()),
                name: new.name,
                description: new.description,
                source_url: new.source_url,
                language: new.language,
                tags: new.tags,
                created_at: now,
                updated_at: now,
            })
        })
        .await
    }

    async fn get(&self, id: TemplateId) -> Result<Option<Template>, StoreError> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = ?1");
            Ok(conn
                .query_row(&sql, params![id.0], template_from_row)
                .optional()?)
        })
        .await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Template>, StoreError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE name = ?1");
            Ok(conn
                .query_row(&sql, params![name], template_from_row)
                .optional()?)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<Template>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM templates ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], template_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn update(&self, template: &Template) -> Result<(), StoreError> {
        let template = template.clone();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE templates
                     SET name = ?2, description = ?3, source_url = ?4, language = ?5, tags = ?6, updated_at = ?7
                     WHERE id = ?1",
                    params![
                        template.id.0,
                        template.name,
                        template.description,
                        template.source_url,
                        template.language,
                        template.tags,
                        template.updated_at.to_rfc3339()
                    ],
                )
                .map_err(|e| write_error(e, &template.name))?;

            if changed == 0 {
                return Err(StoreError::NotFound(format!("template {}", template.id)));
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: TemplateId) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let changed = conn.execute("DELETE FROM templates WHERE id = ?1", params![id.0])?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("template {id}")));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ProjectStore for SqliteStore {
    async fn create(&self, new: NewProject) -> Result<Project, StoreError> {
        self.with_conn(move |conn| {
            let now = Utc::now();
            let status = ProjectStatus::Creating;
            conn.execute(
                "INSERT INTO projects (name, template_id, status, remote_url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, '', ?4, ?4)",
                params![new.name, new.template_id.0, status.as_str(), now.to_rfc3339()],
            )
            .map_err(|e| write_error(e, &new.name))?;

            Ok(Project {
                id: ProjectId(conn.last_insert_rowid()),
                name: new.name,
                template_id: new.template_id,
                status,
                remote_url: String::new(),
                created_at: now,
                updated_at: now,
            })
        })
        .await
    }

    async fn get(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1");
            Ok(conn
                .query_row(&sql, params![id.0], project_from_row)
                .optional()?)
        })
        .await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Project>, StoreError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE name = ?1");
            Ok(conn
                .query_row(&sql, params![name], project_from_row)
                .optional()?)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<Project>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], project_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn update(&self, project: &Project) -> Result<(), StoreError> {
        let project = project.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE projects SET status = ?2, remote_url = ?3, updated_at = ?4 WHERE id = ?1",
                params![
                    project.id.0,
                    project.status.as_str(),
                    project.remote_url,
                    project.updated_at.to_rfc3339()
                ],
            )?;

            if changed == 0 {
                return Err(StoreError::NotFound(format!("project {}", project.id)));
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: ProjectId) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let changed = conn.execute("DELETE FROM projects WHERE id = ?1", params![id.0])?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("project {id}")));
            }
            Ok(())
        })
        .await
    }
}
