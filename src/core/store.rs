//! Persistence contracts for templates and projects.
//!
//! The orchestrator only depends on these traits; `adapters::SqliteStore`
//! is the shipped implementation.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{NewProject, NewTemplate, Project, ProjectId, Template, TemplateId};

/// Errors raised by a persistence backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint (record name) was violated
    #[error("a record named '{0}' already exists")]
    Conflict(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

/// CRUD over project records
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Persist a new project with status `Creating`
    async fn create(&self, project: NewProject) -> Result<Project, StoreError>;

    async fn get(&self, id: ProjectId) -> Result<Option<Project>, StoreError>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Project>, StoreError>;

    async fn list(&self) -> Result<Vec<Project>, StoreError>;

    /// Overwrite status, remote URL and update time of an existing project
    async fn update(&self, project: &Project) -> Result<(), StoreError>;

    async fn delete(&self, id: ProjectId) -> Result<(), StoreError>;
}

/// CRUD over template records
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn create(&self, template: NewTemplate) -> Result<Template, StoreError>;

    async fn get(&self, id: TemplateId) -> Result<Option<Template>, StoreError>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Template>, StoreError>;

    async fn list(&self) -> Result<Vec<Template>, StoreError>;

    async fn update(&self, template: &Template) -> Result<(), StoreError>;

    async fn delete(&self, id: TemplateId) -> Result<(), StoreError>;
}
