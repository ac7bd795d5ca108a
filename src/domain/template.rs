//! Template records.
//!
//! A template is a reusable source repository. Projects capture a copy of
//! the template when they are created, so editing a template never affects
//! a pipeline that is already running.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a persisted template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub i64);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reusable repository blueprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,

    /// Unique display name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Location the pipeline clones from (URL or local path)
    pub source_url: String,

    #[serde(default)]
    pub language: String,

    /// Free-form, comma-separated tags
    #[serde(default)]
    pub tags: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// Tags split on commas, trimmed, empties removed
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Apply the non-empty fields of an update
    pub fn apply(&mut self, update: &TemplateUpdate) {
        if let Some(name) = non_empty(&update.name) {
            self.name = name.to_string();
        }
        if let Some(description) = non_empty(&update.description) {
            self.description = description.to_string();
        }
        if let Some(source_url) = non_empty(&update.source_url) {
            self.source_url = source_url.to_string();
        }
        if let Some(language) = non_empty(&update.language) {
            self.language = language.to_string();
        }
        if let Some(tags) = non_empty(&update.tags) {
            self.tags = tags.to_string();
        }
        self.updated_at = Utc::now();
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Fields supplied when registering a template
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub source_url: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub tags: String,
}

/// Partial update; `None` or empty strings leave a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub source_url: Option<String>,
    pub language: Option<String>,
    pub tags: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Template {
        let now = Utc::now();
        Template {
            id: TemplateId(1),
            name: "rust-service".to_string(),
            description: "Axum service skeleton".to_string(),
            source_url: "https://github.com/acme/rust-service.git".to_string(),
            language: "rust".to_string(),
            tags: "rust, web,,service ".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_tag_list_skips_blanks() {
        assert_eq!(template().tag_list(), vec!["rust", "web", "service"]);
    }

    #[test]
    fn test_apply_only_touches_provided_fields() {
        let mut t = template();
        t.apply(&TemplateUpdate {
            description: Some("New description".to_string()),
            language: Some(String::new()),
            ..Default::default()
        });

        assert_eq!(t.name, "rust-service");
        assert_eq!(t.description, "New description");
        assert_eq!(t.language, "rust");
    }
}
