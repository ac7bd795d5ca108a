//! The five-stage provisioning pipeline.
//!
//! Stages run strictly in order and each one is gated on the previous one:
//! clone, strip history, create remote, publish, finalize. Every stage
//! writes a progress line to the project's log before and after it runs.
//! The first failure is terminal: the project is marked `Error`, the log is
//! closed, and later stages are never attempted. Nothing is retried and
//! nothing already provisioned is rolled back.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::adapters::GitOperations;
use crate::domain::{Project, ProjectId, ProjectStatus, Template};

use super::log_broadcast::LogBroadcaster;
use super::store::ProjectStore;

/// First line of every project log
pub const START_LINE: &str = "Starting project creation";

/// Written when the terminal status could not be persisted
pub const PERSIST_FAILURE_LINE: &str = "Failed to update project status";

/// Written when the pipeline task terminated unexpectedly
pub const ABORTED_LINE: &str = "Project creation aborted unexpectedly";

/// One step of the provisioning pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Clone,
    StripHistory,
    CreateRemote,
    Publish,
    Finalize,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Clone,
        Stage::StripHistory,
        Stage::CreateRemote,
        Stage::Publish,
        Stage::Finalize,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Clone => "clone",
            Stage::StripHistory => "strip_history",
            Stage::CreateRemote => "create_remote",
            Stage::Publish => "publish",
            Stage::Finalize => "finalize",
        }
    }

    /// Line logged when the stage starts (finalize has none)
    pub fn start_line(&self) -> Option<&'static str> {
        match self {
            Stage::Clone => Some("Cloning template repository"),
            Stage::StripHistory => Some("Clearing git history"),
            Stage::CreateRemote => Some("Creating repository on GitHub"),
            Stage::Publish => Some("Pushing code to repository"),
            Stage::Finalize => None,
        }
    }

    pub fn done_line(&self) -> &'static str {
        match self {
            Stage::Clone => "Repository cloned",
            Stage::StripHistory => "Git history cleared",
            Stage::CreateRemote => "Repository created",
            Stage::Publish => "Code pushed to repository",
            Stage::Finalize => "Project ready",
        }
    }

    pub fn failure_line(&self) -> &'static str {
        match self {
            Stage::Clone => "Failed to clone repository",
            Stage::StripHistory => "Failed to clear git history",
            Stage::CreateRemote => "Failed to create repository on GitHub",
            Stage::Publish => "Failed to push code",
            Stage::Finalize => PERSIST_FAILURE_LINE,
        }
    }
}

/// A stage that did not complete
#[derive(Debug)]
struct StageFailure {
    stage: Stage,
    error: anyhow::Error,
}

/// Description given to the remote repository
pub fn remote_description(template: &Template) -> String {
    format!("Project created from template: {}", template.name)
}

/// Everything a pipeline run needs, shared between jobs
#[derive(Clone)]
pub(crate) struct ProvisionPipeline {
    pub projects: Arc<dyn ProjectStore>,
    pub git: Arc<dyn GitOperations>,
    pub logs: Arc<LogBroadcaster>,
    pub workspace_root: PathBuf,
}

impl ProvisionPipeline {
    /// Drive one project to a terminal status and close its log.
    ///
    /// Returns the status the pipeline reached. If that status could not be
    /// persisted the store may still say `Creating`.
    #[instrument(skip_all, fields(project_id = %project.id, project = %project.name))]
    pub async fn run(
        &self,
        mut project: Project,
        template: Template,
        cancel: CancellationToken,
    ) -> ProjectStatus {
        info!(
            template = %template.name,
            provider = self.git.name(),
            "Starting project creation"
        );
        self.logs.append(project.id, START_LINE);

        let status = match self.provision(&project, &template, &cancel).await {
            Ok(remote_url) => self.finalize(&mut project, remote_url).await,
            Err(failure) => self.fail(&mut project, failure).await,
        };

        self.logs.close(project.id);
        status
    }

    /// Stages 1-4. The workspace lives only inside this call.
    async fn provision(
        &self,
        project: &Project,
        template: &Template,
        cancel: &CancellationToken,
    ) -> Result<String, StageFailure> {
        let id = project.id;

        let workspace = self
            .stage(id, Stage::Clone, cancel, async {
                let workspace = self.create_workspace(id)?;
                self.git
                    .clone_repository(&template.source_url, workspace.path(), cancel)
                    .await?;
                Ok::<_, anyhow::Error>(workspace)
            })
            .await?;

        self.stage(
            id,
            Stage::StripHistory,
            cancel,
            self.git.strip_history(workspace.path(), cancel),
        )
        .await?;

        let description = remote_description(template);
        let remote_url = self
            .stage(
                id,
                Stage::CreateRemote,
                cancel,
                self.git.create_remote(&project.name, &description, cancel),
            )
            .await?;

        self.stage(
            id,
            Stage::Publish,
            cancel,
            self.git.publish(workspace.path(), &remote_url, cancel),
        )
        .await?;

        Ok(remote_url)
    }

    /// Run one stage between its start and done log lines
    async fn stage<T, F>(
        &self,
        id: ProjectId,
        stage: Stage,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T, StageFailure>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        if cancel.is_cancelled() {
            return Err(StageFailure {
                stage,
                error: anyhow::anyhow!("job cancelled before stage '{}'", stage.name()),
            });
        }

        if let Some(line) = stage.start_line() {
            self.logs.append(id, line);
        }
        info!(stage = stage.name(), "Stage started");

        match op.await {
            Ok(value) => {
                info!(stage = stage.name(), "Stage completed");
                self.logs.append(id, stage.done_line());
                Ok(value)
            }
            Err(error) => Err(StageFailure { stage, error }),
        }
    }

    fn create_workspace(&self, id: ProjectId) -> anyhow::Result<TempDir> {
        tempfile::Builder::new()
            .prefix(&format!("template-{}-", id))
            .tempdir_in(&self.workspace_root)
            .with_context(|| {
                format!(
                    "Failed to create workspace under {}",
                    self.workspace_root.display()
                )
            })
    }

    /// Stage 5: record the remote URL and mark the project ready
    async fn finalize(&self, project: &mut Project, remote_url: String) -> ProjectStatus {
        if let Err(e) = project.mark_ready(remote_url) {
            warn!(error = %e, "Project left its creating state during provisioning");
            return project.status;
        }

        match self.projects.update(project).await {
            Ok(()) => {
                info!(remote_url = %project.remote_url, "Project ready");
                self.logs.append(project.id, Stage::Finalize.done_line());
            }
            Err(e) => {
                error!(error = %e, "Failed to persist ready status");
                self.logs.append(project.id, PERSIST_FAILURE_LINE);
            }
        }

        project.status
    }

    async fn fail(&self, project: &mut Project, failure: StageFailure) -> ProjectStatus {
        error!(
            stage = failure.stage.name(),
            error = %format!("{:#}", failure.error),
            "Stage failed"
        );
        self.logs.append(project.id, failure.stage.failure_line());
        self.persist_failure(project).await
    }

    /// Mark the project `Error` and persist it, logging a line if the store
    /// refuses. Used for stage failures and for aborted pipeline tasks.
    pub async fn persist_failure(&self, project: &mut Project) -> ProjectStatus {
        if let Err(e) = project.mark_failed() {
            warn!(error = %e, "Project already in a terminal state");
            return project.status;
        }

        if let Err(e) = self.projects.update(project).await {
            error!(error = %e, "Failed to persist error status");
            self.logs.append(project.id, PERSIST_FAILURE_LINE);
        }

        project.status
    }
}
