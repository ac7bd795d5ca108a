//! Core orchestration logic.
//!
//! This module contains:
//! - Orchestrator: project creation and the detached provisioning job
//! - Pipeline: the five ordered provisioning stages
//! - LogBroadcaster: per-project log with live subscriptions
//! - Store: persistence contracts
//! - TemplateService: template catalogue

pub mod job;
pub mod log_broadcast;
pub mod orchestrator;
pub mod pipeline;
pub mod store;
pub mod templates;

// Re-export commonly used types
pub use job::JobHandle;
pub use log_broadcast::{LogBroadcaster, LogSubscription, SUBSCRIBER_CAPACITY};
pub use orchestrator::{CreatedProject, Orchestrator, ProjectError};
pub use pipeline::Stage;
pub use store::{ProjectStore, StoreError, TemplateStore};
pub use templates::{TemplateError, TemplateService};
