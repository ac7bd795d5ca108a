//! Handle to a running provisioning job.
//!
//! A job is spawned on its own `CancellationToken` that is never derived
//! from the caller. Dropping the handle, or the request that created it,
//! leaves the pipeline running. Only an explicit [`JobHandle::cancel`]
//! stops it, and only at the next git operation boundary.

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::domain::{ProjectId, ProjectStatus};

/// Owner-side view of a detached pipeline task
#[derive(Debug)]
pub struct JobHandle {
    project_id: ProjectId,
    token: CancellationToken,
    task: JoinHandle<ProjectStatus>,
}

impl JobHandle {
    pub(crate) fn new(
        project_id: ProjectId,
        token: CancellationToken,
        task: JoinHandle<ProjectStatus>,
    ) -> Self {
        Self {
            project_id,
            token,
            task,
        }
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Request cancellation. The stage in flight fails and the project
    /// ends in `Error`.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the pipeline and return the status it finished with
    pub async fn wait(self) -> Result<ProjectStatus, JoinError> {
        self.task.await
    }
}
