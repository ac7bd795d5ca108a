//! `repoforge template` subcommands.

use anyhow::Result;
use clap::Subcommand;

use crate::domain::{NewTemplate, Template, TemplateId, TemplateUpdate};

use super::{print_json, App};

#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// Register a template
    Add {
        /// Unique template name
        #[arg(long)]
        name: String,

        /// Git URL (or local path) to clone from
        #[arg(long)]
        url: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long, default_value = "")]
        language: String,

        /// Comma-separated tags
        #[arg(long, default_value = "")]
        tags: String,
    },

    /// List templates
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show one template
    Show {
        id: i64,

        #[arg(long)]
        json: bool,
    },

    /// Change template fields
    Update {
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        language: Option<String>,

        #[arg(long)]
        tags: Option<String>,
    },

    /// Delete a template
    Remove { id: i64 },
}

pub async fn execute(app: &App, command: TemplateCommands) -> Result<()> {
    match command {
        TemplateCommands::Add {
            name,
            url,
            description,
            language,
            tags,
        } => {
            let template = app
                .templates
                .create_template(NewTemplate {
                    name,
                    description,
                    source_url: url,
                    language,
                    tags,
                })
                .await?;
            println!("Template {} created: {}", template.id, template.name);
        }
        TemplateCommands::List { json } => {
            let templates = app.templates.list_templates().await?;
            if json {
                return print_json(&templates);
            }
            if templates.is_empty() {
                println!("No templates registered.");
                println!("Add one with: repoforge template add --name <name> --url <git-url>");
                return Ok(());
            }
            println!("{:<6} {:<24} {:<12} URL", "ID", "NAME", "LANGUAGE");
            println!("{}", "-".repeat(72));
            for t in &templates {
                println!("{:<6} {:<24} {:<12} {}", t.id, t.name, t.language, t.source_url);
            }
        }
        TemplateCommands::Show { id, json } => {
            let template = app.templates.get_template(TemplateId(id)).await?;
            if json {
                return print_json(&template);
            }
            print_template(&template);
        }
        TemplateCommands::Update {
            id,
            name,
            url,
            description,
            language,
            tags,
        } => {
            let template = app
                .templates
                .update_template(
                    TemplateId(id),
                    TemplateUpdate {
                        name,
                        description,
                        source_url: url,
                        language,
                        tags,
                    },
                )
                .await?;
            println!("Template {} updated.", template.id);
        }
        TemplateCommands::Remove { id } => {
            app.templates.delete_template(TemplateId(id)).await?;
            println!("Template {} deleted.", id);
        }
    }

    Ok(())
}

fn print_template(t: &Template) {
    println!("Template {}", t.id);
    println!("  Name:        {}", t.name);
    println!("  URL:         {}", t.source_url);
    if !t.description.is_empty() {
        println!("  Description: {}", t.description);
    }
    if !t.language.is_empty() {
        println!("  Language:    {}", t.language);
    }
    let tags = t.tag_list();
    if !tags.is_empty() {
        println!("  Tags:        {}", tags.join(", "));
    }
    println!("  Created:     {}", t.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated:     {}", t.updated_at.format("%Y-%m-%d %H:%M:%S"));
}
