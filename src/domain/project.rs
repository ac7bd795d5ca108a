//! Project records and their status lifecycle.
//!
//! A Project is one materialization of a template into a new remote
//! repository. Its status only ever moves forward:
//! `Creating -> Ready` or `Creating -> Error`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::template::TemplateId;

/// Identifier of a persisted project (store-assigned rowid)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub i64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Pipeline accepted and running
    Creating,

    /// Remote repository provisioned and published
    Ready,

    /// A pipeline stage failed
    Error,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }

    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Creating, Self::Ready) | (Self::Creating, Self::Error)
        )
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creating" => Ok(Self::Creating),
            "ready" => Ok(Self::Ready),
            "error" => Ok(Self::Error),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Raised when a stored status string is not recognised
#[derive(Debug, Error)]
#[error("unknown project status: {0}")]
pub struct UnknownStatus(pub String);

/// Rejected status change
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid status transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: ProjectStatus,
    pub to: ProjectStatus,
}

/// A project created from a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,

    /// Project name, also used as the remote repository name
    pub name: String,

    /// Template the project was created from
    pub template_id: TemplateId,

    pub status: ProjectStatus,

    /// Clone URL of the provisioned repository (empty until ready)
    pub remote_url: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Move to `target`, refusing anything but `Creating -> Ready|Error`
    pub fn transition_to(&mut self, target: ProjectStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(target) {
            return Err(InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record the provisioned remote and mark the project ready
    pub fn mark_ready(&mut self, remote_url: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition_to(ProjectStatus::Ready)?;
        self.remote_url = remote_url.into();
        Ok(())
    }

    pub fn mark_failed(&mut self) -> Result<(), InvalidTransition> {
        self.transition_to(ProjectStatus::Error)
    }
}

/// Fields supplied when persisting a new project
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub template_id: TemplateId,
}

/// Request to create a project from a template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub template_id: TemplateId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creating_project() -> Project {
        let now = Utc::now();
        Project {
            id: ProjectId(1),
            name: "demo".to_string(),
            template_id: TemplateId(7),
            status: ProjectStatus::Creating,
            remote_url: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_creating_moves_to_ready_with_url() {
        let mut project = creating_project();
        project
            .mark_ready("https://github.com/acme/demo.git")
            .unwrap();

        assert_eq!(project.status, ProjectStatus::Ready);
        assert_eq!(project.remote_url, "https://github.com/acme/demo.git");
    }

    #[test]
    fn test_terminal_states_never_transition() {
        let mut project = creating_project();
        project.mark_failed().unwrap();

        let err = project.mark_ready("https://example.com/x.git").unwrap_err();
        assert_eq!(err.from, ProjectStatus::Error);
        assert_eq!(err.to, ProjectStatus::Ready);
        assert!(project.remote_url.is_empty());

        let mut ready = creating_project();
        ready.mark_ready("u").unwrap();
        assert!(ready.mark_failed().is_err());
        assert!(ready.transition_to(ProjectStatus::Creating).is_err());
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            ProjectStatus::Creating,
            ProjectStatus::Ready,
            ProjectStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<ProjectStatus>().unwrap(), status);
        }
        assert!("done".parse::<ProjectStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&ProjectStatus::Creating).unwrap();
        assert_eq!(json, "\"creating\"");
    }
}
