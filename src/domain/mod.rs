//! Domain types for repoforge.
//!
//! - Template: a reusable source repository
//! - Project: one template-to-repository materialization

pub mod project;
pub mod template;

pub use project::{
    CreateProjectRequest, InvalidTransition, NewProject, Project, ProjectId, ProjectStatus,
};
pub use template::{NewTemplate, Template, TemplateId, TemplateUpdate};
