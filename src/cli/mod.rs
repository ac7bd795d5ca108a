//! Command-line interface for repoforge.
//!
//! Provides commands for managing templates, creating projects from them
//! (following the provisioning log live), and inspecting configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::adapters::{GitHubProvider, SqliteStore};
use crate::config::ResolvedConfig;
use crate::core::{Orchestrator, TemplateService};

pub mod project;
pub mod template;

/// repoforge - provision new repositories from templates
#[derive(Parser, Debug)]
#[command(name = "repoforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage templates
    Template {
        #[command(subcommand)]
        command: template::TemplateCommands,
    },

    /// Create and inspect projects
    Project {
        #[command(subcommand)]
        command: project::ProjectCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Services wired from configuration
pub struct App {
    pub orchestrator: Orchestrator,
    pub templates: TemplateService,
}

impl App {
    pub fn from_config(config: &ResolvedConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(&config.database).with_context(|| {
            format!("Failed to open database: {}", config.database.display())
        })?);
        let git = Arc::new(GitHubProvider::new(config.github.clone()));

        Ok(Self {
            orchestrator: Orchestrator::new(
                store.clone(),
                store.clone(),
                git,
                config.workspace.clone(),
            ),
            templates: TemplateService::new(store),
        })
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Config => show_config(),
            Commands::Template { command } => {
                let app = App::from_config(crate::config::config()?)?;
                template::execute(&app, command).await
            }
            Commands::Project { command } => {
                let app = App::from_config(crate::config::config()?)?;
                project::execute(&app, command).await
            }
        }
    }
}

fn show_config() -> Result<()> {
    let config = crate::config::config()?;

    println!("Configuration:");
    match &config.config_file {
        Some(path) => println!("  Config file: {}", path.display()),
        None => println!("  Config file: (none, using defaults)"),
    }
    println!("  Home:        {}", config.home.display());
    println!("  Database:    {}", config.database.display());
    println!("  Workspace:   {}", config.workspace.display());
    println!();
    println!("GitHub:");
    println!("  API:         {}", config.github.api_url);
    println!(
        "  Owner:       {}{}",
        config.github.owner,
        if config.github.organization { " (organization)" } else { "" }
    );
    println!("  Token:       {}", config.redacted_token());
    println!("  Private:     {}", config.github.private);
    println!("  Timeout:     {:?}", config.github.command_timeout);

    Ok(())
}

/// Print a value as pretty JSON
fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_project_create() {
        let cli = Cli::try_parse_from(["repoforge", "project", "create", "demo", "--template", "3"])
            .unwrap();
        match cli.command {
            Commands::Project {
                command: project::ProjectCommands::Create { name, template },
            } => {
                assert_eq!(name, "demo");
                assert_eq!(template, 3);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
