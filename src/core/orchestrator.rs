//! Project orchestrator.
//!
//! Validates creation requests, persists the project, and launches the
//! provisioning pipeline as a detached background job. Also serves the
//! plain project reads/deletes and the per-project log streams.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::adapters::GitOperations;
use crate::domain::{
    CreateProjectRequest, NewProject, Project, ProjectId, ProjectStatus, Template, TemplateId,
};

use super::job::JobHandle;
use super::log_broadcast::{LogBroadcaster, LogSubscription};
use super::pipeline::{ProvisionPipeline, ABORTED_LINE};
use super::store::{ProjectStore, StoreError, TemplateStore};

/// Errors surfaced synchronously by project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("project with this name already exists: {0}")]
    DuplicateName(String),

    #[error("template not found: {0}")]
    TemplateNotFound(TemplateId),

    #[error("project not found: {0}")]
    NotFound(ProjectId),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of an accepted creation request
#[derive(Debug)]
pub struct CreatedProject {
    /// The persisted record, status `Creating`
    pub project: Project,

    /// Handle to the pipeline now running in the background
    pub job: JobHandle,
}

/// Main project orchestrator
pub struct Orchestrator {
    templates: Arc<dyn TemplateStore>,
    pipeline: ProvisionPipeline,
}

impl Orchestrator {
    /// Create an orchestrator. Job workspaces are created under
    /// `workspace_root`.
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        templates: Arc<dyn TemplateStore>,
        git: Arc<dyn GitOperations>,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            templates,
            pipeline: ProvisionPipeline {
                projects,
                git,
                logs: Arc::new(LogBroadcaster::new()),
                workspace_root: workspace_root.into(),
            },
        }
    }

    /// The broadcaster holding every project's log
    pub fn logs(&self) -> &Arc<LogBroadcaster> {
        &self.pipeline.logs
    }

    /// Validate and persist a project, then start provisioning it.
    ///
    /// Returns as soon as the record exists; the pipeline keeps running
    /// even if the caller goes away. Stage failures are reported only
    /// through the project's status and log.
    #[instrument(skip(self, request), fields(name = %request.name, template_id = %request.template_id))]
    pub async fn create_project(
        &self,
        request: CreateProjectRequest,
    ) -> Result<CreatedProject, ProjectError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ProjectError::InvalidRequest(
                "project name cannot be empty".to_string(),
            ));
        }

        info!("Creating project");

        if self.pipeline.projects.get_by_name(name).await?.is_some() {
            warn!("Project already exists");
            return Err(ProjectError::DuplicateName(name.to_string()));
        }

        let Some(template) = self.templates.get(request.template_id).await? else {
            warn!("Template not found");
            return Err(ProjectError::TemplateNotFound(request.template_id));
        };

        let new_project = NewProject {
            name: name.to_string(),
            template_id: template.id,
        };
        let project = match self.pipeline.projects.create(new_project).await {
            Ok(project) => project,
            // Lost a race with a concurrent request for the same name
            Err(StoreError::Conflict(_)) => {
                warn!("Project already exists");
                return Err(ProjectError::DuplicateName(name.to_string()));
            }
            Err(e) => {
                error!(error = %e, "Failed to create project record");
                return Err(e.into());
            }
        };

        info!(project_id = %project.id, "Project record created");

        let job = self.spawn_job(project.clone(), template);
        Ok(CreatedProject { project, job })
    }

    /// Launch the pipeline on a fresh token that no caller controls.
    ///
    /// The pipeline runs in its own task so that a panic inside it can
    /// still be turned into an `Error` status and a closed log.
    fn spawn_job(&self, project: Project, template: Template) -> JobHandle {
        let id = project.id;
        let token = CancellationToken::new();
        let pipeline = self.pipeline.clone();
        let job_token = token.clone();

        let task = tokio::spawn(async move {
            let mut fallback = project.clone();
            let run = {
                let pipeline = pipeline.clone();
                tokio::spawn(async move { pipeline.run(project, template, job_token).await })
            };

            match run.await {
                Ok(status) => status,
                Err(e) => {
                    error!(project_id = %id, error = %e, "Pipeline task aborted");
                    pipeline.logs.append(id, ABORTED_LINE);
                    let status = pipeline.persist_failure(&mut fallback).await;
                    pipeline.logs.close(id);
                    status
                }
            }
        });

        JobHandle::new(id, token, task)
    }

    pub async fn get_project(&self, id: ProjectId) -> Result<Project, ProjectError> {
        self.pipeline
            .projects
            .get(id)
            .await?
            .ok_or(ProjectError::NotFound(id))
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>, ProjectError> {
        Ok(self.pipeline.projects.list().await?)
    }

    /// Delete a project record. A pipeline still running for it is not
    /// stopped, and a provisioned remote repository is left in place.
    #[instrument(skip(self))]
    pub async fn delete_project(&self, id: ProjectId) -> Result<(), ProjectError> {
        let project = self.get_project(id).await?;
        if project.status == ProjectStatus::Creating {
            warn!("Deleting a project whose pipeline may still be running");
        }

        self.pipeline.projects.delete(id).await?;
        info!("Project deleted");
        Ok(())
    }

    /// Subscribe to a project's log: backlog, live lines, end-of-stream
    pub fn subscribe_logs(&self, id: ProjectId) -> LogSubscription {
        self.pipeline.logs.subscribe(id)
    }

    /// Every log line recorded for a project so far
    pub fn get_logs(&self, id: ProjectId) -> Vec<String> {
        self.pipeline.logs.get_logs(id)
    }
}
