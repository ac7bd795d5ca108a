//! Template Catalogue Integration Tests
//!
//! Exercises `TemplateService` over a file-backed SQLite store.

use std::sync::Arc;

use repoforge::adapters::SqliteStore;
use repoforge::core::{TemplateError, TemplateService};
use repoforge::domain::{NewTemplate, TemplateId, TemplateUpdate};
use tempfile::TempDir;
use tokio_test::assert_err;

fn new_template(name: &str) -> NewTemplate {
    NewTemplate {
        name: name.to_string(),
        description: "Starter project".to_string(),
        source_url: format!("https://github.com/acme/{}.git", name),
        language: "rust".to_string(),
        tags: "cli, starter".to_string(),
    }
}

#[tokio::test]
async fn test_template_crud() {
    let temp = TempDir::new().unwrap();
    let store = SqliteStore::open(&temp.path().join("state/repoforge.db")).unwrap();
    let service = TemplateService::new(Arc::new(store));

    let created = service.create_template(new_template("rust-cli")).await.unwrap();
    assert_eq!(created.name, "rust-cli");
    assert_eq!(created.tag_list(), vec!["cli", "starter"]);

    let fetched = service.get_template(created.id).await.unwrap();
    assert_eq!(fetched, created);

    service.create_template(new_template("web-app")).await.unwrap();
    let names: Vec<String> = service
        .list_templates()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["rust-cli", "web-app"]);

    let updated = service
        .update_template(
            created.id,
            TemplateUpdate {
                description: Some("Command-line starter".to_string()),
                language: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.description, "Command-line starter");
    // Empty values leave fields alone
    assert_eq!(updated.language, "rust");
    assert_eq!(service.get_template(created.id).await.unwrap(), updated);

    service.delete_template(created.id).await.unwrap();
    let err = assert_err!(service.get_template(created.id).await);
    assert!(matches!(err, TemplateError::NotFound(id) if id == created.id));
}

#[tokio::test]
async fn test_templates_survive_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("repoforge.db");

    let id = {
        let service = TemplateService::new(Arc::new(SqliteStore::open(&path).unwrap()));
        service.create_template(new_template("kept")).await.unwrap().id
    };

    let service = TemplateService::new(Arc::new(SqliteStore::open(&path).unwrap()));
    assert_eq!(service.get_template(id).await.unwrap().name, "kept");
}

#[tokio::test]
async fn test_duplicate_template_names_rejected() {
    let service = TemplateService::new(Arc::new(SqliteStore::open_in_memory().unwrap()));

    let first = service.create_template(new_template("one")).await.unwrap();
    let second = service.create_template(new_template("two")).await.unwrap();

    let err = assert_err!(service.create_template(new_template("one")).await);
    assert!(matches!(err, TemplateError::DuplicateName(name) if name == "one"));

    let err = assert_err!(
        service
            .update_template(
                second.id,
                TemplateUpdate {
                    name: Some("one".to_string()),
                    ..Default::default()
                },
            )
            .await
    );
    assert!(matches!(err, TemplateError::DuplicateName(_)));

    // Renaming to its own name is not a conflict
    let same = service
        .update_template(
            first.id,
            TemplateUpdate {
                name: Some("one".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(same.name, "one");
}

#[tokio::test]
async fn test_invalid_templates_rejected() {
    let service = TemplateService::new(Arc::new(SqliteStore::open_in_memory().unwrap()));

    let err = assert_err!(
        service
            .create_template(NewTemplate {
                name: "  ".to_string(),
                source_url: "https://github.com/acme/x.git".to_string(),
                ..Default::default()
            })
            .await
    );
    assert!(matches!(err, TemplateError::InvalidRequest(_)));

    let err = assert_err!(
        service
            .create_template(NewTemplate {
                name: "no-url".to_string(),
                ..Default::default()
            })
            .await
    );
    assert!(matches!(err, TemplateError::InvalidRequest(_)));

    let err = assert_err!(service.delete_template(TemplateId(99)).await);
    assert!(matches!(err, TemplateError::NotFound(TemplateId(99))));
}
