//! Adapters for external systems.
//!
//! - `GitOperations`: the version-control and remote-hosting contract the
//!   provisioning pipeline depends on, implemented by `GitHubProvider`
//! - `SqliteStore`: the persistence backend for templates and projects

pub mod github;
pub mod sqlite;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use github::{GitHubConfig, GitHubProvider};
pub use sqlite::SqliteStore;

/// Git and remote-hosting operations used by the pipeline.
///
/// Every operation may be slow (network or subprocess bound) and must stop
/// promptly, with an error, once `cancel` fires.
#[async_trait]
pub trait GitOperations: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Materialize `source` into the (empty) directory `dest`
    async fn clone_repository(
        &self,
        source: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Remove version-control history from a working tree
    async fn strip_history(&self, path: &Path, cancel: &CancellationToken) -> Result<()>;

    /// Create an empty remote repository and return its clone URL
    async fn create_remote(
        &self,
        name: &str,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<String>;

    /// Commit everything under `path` as a single initial commit and push it
    /// to `remote_url` as the default branch
    async fn publish(&self, path: &Path, remote_url: &str, cancel: &CancellationToken)
        -> Result<()>;
}
