//! Git CLI + GitHub REST implementation of `GitOperations`.
//!
//! Local work (clone, commit, push) shells out to `git`; creating the
//! destination repository goes through the GitHub API. Each subprocess and
//! HTTP call races a timeout and the job's cancellation token, and child
//! processes are killed when abandoned.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::GitOperations;

/// Message of the single commit pushed to a new repository
pub const INITIAL_COMMIT_MESSAGE: &str = "Initial commit from template";

/// Branch the initial commit is pushed to
pub const DEFAULT_BRANCH: &str = "main";

/// Environment variable the inline credential helper reads the token from
const TOKEN_ENV: &str = "REPOFORGE_GIT_TOKEN";

const CREDENTIAL_HELPER: &str =
    "!f() { echo username=x-access-token; echo \"password=$REPOFORGE_GIT_TOKEN\"; }; f";

/// Settings for talking to GitHub and running git
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// Personal access token used for the API and for pushing
    pub token: String,

    /// Account that owns new repositories
    pub owner: String,

    /// Create repositories under `/orgs/{owner}` instead of the token's user
    pub organization: bool,

    /// Create new repositories as private
    pub private: bool,

    /// API base URL (override for GitHub Enterprise)
    pub api_url: String,

    /// Upper bound for any single git command or API call
    pub command_timeout: Duration,

    pub committer_name: String,
    pub committer_email: String,

    /// git executable (default: "git")
    pub git_binary: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            owner: String::new(),
            organization: false,
            private: false,
            api_url: "https://api.github.com".to_string(),
            command_timeout: Duration::from_secs(300),
            committer_name: "repoforge".to_string(),
            committer_email: "repoforge@users.noreply.github.com".to_string(),
            git_binary: "git".to_string(),
        }
    }
}

/// Request body for repository creation
#[derive(Debug, Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    description: &'a str,
    private: bool,
    auto_init: bool,
}

/// The part of GitHub's repository response we use
#[derive(Debug, Deserialize)]
struct RepoResponse {
    clone_url: String,
}

/// `GitOperations` backed by the git CLI and the GitHub REST API
pub struct GitHubProvider {
    config: GitHubConfig,
    client: reqwest::Client,
}

impl GitHubProvider {
    pub fn new(config: GitHubConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    /// Endpoint that creates a repository for the configured owner
    fn repos_endpoint(&self) -> String {
        let base = self.config.api_url.trim_end_matches('/');
        if self.config.organization {
            format!("{}/orgs/{}/repos", base, self.config.owner)
        } else {
            format!("{}/user/repos", base)
        }
    }

    /// Run a git command, returning stdout on success
    async fn git(
        &self,
        args: &[&str],
        cwd: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let label = args
            .iter()
            .find(|a| !a.starts_with('-') && !a.contains('='))
            .copied()
            .unwrap_or("command");

        if cancel.is_cancelled() {
            anyhow::bail!("git {} cancelled", label);
        }

        let mut cmd = Command::new(&self.config.git_binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        if !self.config.token.is_empty() {
            cmd.env(TOKEN_ENV, &self.config.token);
        }

        debug!(command = label, "Running git");

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn git {}", label))?;

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => anyhow::bail!("git {} cancelled", label),
            result = timeout(self.config.command_timeout, child.wait_with_output()) => result
                .with_context(|| {
                    format!("git {} timed out after {:?}", label, self.config.command_timeout)
                })?
                .with_context(|| format!("Failed to wait for git {}", label))?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            anyhow::bail!(
                "git {} failed with exit code {}: {}",
                label,
                exit_code,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl GitOperations for GitHubProvider {
    fn name(&self) -> &str {
        "github"
    }

    async fn clone_repository(
        &self,
        source: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let dest = dest
            .to_str()
            .with_context(|| format!("Workspace path is not valid UTF-8: {}", dest.display()))?;
        self.git(&["clone", "--", source, dest], None, cancel)
            .await
            .with_context(|| format!("Failed to clone {}", source))?;
        Ok(())
    }

    async fn strip_history(&self, path: &Path, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            anyhow::bail!("strip history cancelled");
        }

        let git_dir = path.join(".git");
        match tokio::fs::remove_dir_all(&git_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove {}", git_dir.display())),
        }
    }

    async fn create_remote(
        &self,
        name: &str,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if self.config.token.is_empty() {
            anyhow::bail!("GitHub token is not configured");
        }

        let body = CreateRepoRequest {
            name,
            description,
            private: self.config.private,
            auto_init: false,
        };

        let request = self
            .client
            .post(self.repos_endpoint())
            .bearer_auth(&self.config.token)
            .header(USER_AGENT, "repoforge")
            .header(ACCEPT, "application/vnd.github+json")
            .json(&body)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => anyhow::bail!("repository creation cancelled"),
            result = timeout(self.config.command_timeout, request) => result
                .context("GitHub request timed out")?
                .context("Failed to reach GitHub")?,
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API error ({}): {}", status, text.trim());
        }

        let repo: RepoResponse = response
            .json()
            .await
            .context("Failed to parse GitHub repository response")?;

        Ok(repo.clone_url)
    }

    async fn publish(
        &self,
        path: &Path,
        remote_url: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let user_name = format!("user.name={}", self.config.committer_name);
        let user_email = format!("user.email={}", self.config.committer_email);
        let helper = format!("credential.helper={}", CREDENTIAL_HELPER);

        self.git(&["init"], Some(path), cancel)
            .await
            .context("Failed to init git")?;
        self.git(&["add", "--all"], Some(path), cancel)
            .await
            .context("Failed to add files")?;
        self.git(
            &[
                "-c",
                &user_name,
                "-c",
                &user_email,
                "commit",
                "--allow-empty",
                "-m",
                INITIAL_COMMIT_MESSAGE,
            ],
            Some(path),
            cancel,
        )
        .await
        .context("Failed to commit")?;
        self.git(&["branch", "-M", DEFAULT_BRANCH], Some(path), cancel)
            .await
            .context("Failed to rename branch")?;
        self.git(&["remote", "add", "origin", remote_url], Some(path), cancel)
            .await
            .context("Failed to add remote")?;

        let mut push: Vec<&str> = Vec::new();
        if !self.config.token.is_empty() {
            // Reset inherited helpers, then answer with the token from the env
            push.extend(["-c", "credential.helper=", "-c", helper.as_str()]);
        }
        push.extend(["push", "-u", "origin", DEFAULT_BRANCH]);

        self.git(&push, Some(path), cancel)
            .await
            .context("Failed to push")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_repos_endpoint_for_user_and_org() {
        let user = GitHubProvider::new(GitHubConfig {
            owner: "alice".to_string(),
            api_url: "https://api.github.com/".to_string(),
            ..Default::default()
        });
        assert_eq!(user.repos_endpoint(), "https://api.github.com/user/repos");

        let org = GitHubProvider::new(GitHubConfig {
            owner: "acme".to_string(),
            organization: true,
            ..Default::default()
        });
        assert_eq!(org.repos_endpoint(), "https://api.github.com/orgs/acme/repos");
        assert_eq!(org.name(), "github");
    }

    #[tokio::test]
    async fn test_strip_history_removes_git_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".git/objects")).unwrap();
        std::fs::write(temp.path().join("README.md"), "hello").unwrap();

        let provider = GitHubProvider::new(GitHubConfig::default());
        let cancel = CancellationToken::new();
        provider.strip_history(temp.path(), &cancel).await.unwrap();

        assert!(!temp.path().join(".git").exists());
        assert!(temp.path().join("README.md").exists());

        // Already clean is fine too
        provider.strip_history(temp.path(), &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_remote_requires_token() {
        let provider = GitHubProvider::new(GitHubConfig::default());
        let err = provider
            .create_remote("demo", "desc", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("token"));
    }

    #[tokio::test]
    async fn test_missing_git_binary_fails_clone() {
        let temp = TempDir::new().unwrap();
        let provider = GitHubProvider::new(GitHubConfig {
            git_binary: "/nonexistent/repoforge-git".to_string(),
            ..Default::default()
        });

        let err = provider
            .clone_repository("https://example.com/x.git", temp.path(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to spawn git clone"));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_git() {
        let temp = TempDir::new().unwrap();
        let provider = GitHubProvider::new(GitHubConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = provider
            .publish(temp.path(), "https://example.com/x.git", &cancel)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("cancelled"));
    }
}
