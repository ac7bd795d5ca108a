//! Template catalogue operations.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{NewTemplate, Template, TemplateId, TemplateUpdate};

use super::store::{StoreError, TemplateStore};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template with this name already exists: {0}")]
    DuplicateName(String),

    #[error("template not found: {0}")]
    NotFound(TemplateId),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// CRUD over templates with unique names
pub struct TemplateService {
    store: Arc<dyn TemplateStore>,
}

impl TemplateService {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self { store }
    }

    pub async fn create_template(&self, mut new: NewTemplate) -> Result<Template, TemplateError> {
        new.name = new.name.trim().to_string();
        new.source_url = new.source_url.trim().to_string();

        if new.name.is_empty() {
            return Err(TemplateError::InvalidRequest(
                "template name cannot be empty".to_string(),
            ));
        }
        if new.source_url.is_empty() {
            return Err(TemplateError::InvalidRequest(
                "template source URL cannot be empty".to_string(),
            ));
        }

        if self.store.get_by_name(&new.name).await?.is_some() {
            warn!(name = %new.name, "Template already exists");
            return Err(TemplateError::DuplicateName(new.name));
        }

        let name = new.name.clone();
        let template = self.store.create(new).await.map_err(|e| match e {
            StoreError::Conflict(_) => TemplateError::DuplicateName(name),
            other => other.into(),
        })?;

        info!(template_id = %template.id, name = %template.name, "Template created");
        Ok(template)
    }

    pub async fn get_template(&self, id: TemplateId) -> Result<Template, TemplateError> {
        self.store.get(id).await?.ok_or(TemplateError::NotFound(id))
    }

    pub async fn list_templates(&self) -> Result<Vec<Template>, TemplateError> {
        Ok(self.store.list().await?)
    }

    /// Apply the provided fields; renaming onto another template's name fails
    pub async fn update_template(
        &self,
        id: TemplateId,
        update: TemplateUpdate,
    ) -> Result<Template, TemplateError> {
        let mut template = self.get_template(id).await?;

        if let Some(name) = update.name.as_deref().filter(|n| !n.is_empty()) {
            if let Some(other) = self.store.get_by_name(name).await? {
                if other.id != id {
                    return Err(TemplateError::DuplicateName(name.to_string()));
                }
            }
        }

        template.apply(&update);
        self.store.update(&template).await.map_err(|e| match e {
            StoreError::Conflict(name) => TemplateError::DuplicateName(name),
            other => other.into(),
        })?;

        info!(template_id = %id, "Template updated");
        Ok(template)
    }

    pub async fn delete_template(&self, id: TemplateId) -> Result<(), TemplateError> {
        self.get_template(id).await?;
        self.store.delete(id).await?;
        info!(template_id = %id, "Template deleted");
        Ok(())
    }
}
