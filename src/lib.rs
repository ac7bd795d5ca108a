//! repoforge - provision new repositories from templates
//!
//! Creating a project validates the request synchronously, records the
//! project as `creating`, and hands the slow part to a detached job that
//! clones the template, strips its history, creates a GitHub repository
//! and pushes a single initial commit.
//!
//! # Architecture
//!
//! - Every job owns an append-only log; callers follow it live or read the
//!   accumulated backlog at any time
//! - A project's status only moves forward: `creating` then `ready` or `error`
//! - Jobs are detached from the caller and stop only through their own handle
//!
//! # Modules
//!
//! - `adapters`: External system integrations (git/GitHub, SQLite)
//! - `core`: Orchestration logic (Orchestrator, Pipeline, LogBroadcaster)
//! - `domain`: Data structures (Project, Template)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Register a template
//! repoforge template add --name rust-cli --url https://github.com/acme/rust-cli-template
//!
//! # Create a project and follow its log
//! repoforge project create my-tool --template 1
//!
//! # Check project status
//! repoforge project show 1
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use crate::adapters::{GitOperations, GitHubProvider, SqliteStore};
pub use crate::core::{JobHandle, LogBroadcaster, Orchestrator, TemplateService};
pub use crate::domain::{Project, ProjectId, ProjectStatus, Template, TemplateId};
