//! `repoforge project` subcommands.

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::core::{CreatedProject, Orchestrator};
use crate::domain::{CreateProjectRequest, Project, ProjectId, ProjectStatus, TemplateId};

use super::{print_json, App};

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a project from a template and follow its progress
    Create {
        /// Project name (also the new repository's name)
        name: String,

        /// Template ID
        #[arg(short, long)]
        template: i64,
    },

    /// List projects
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show one project
    Show {
        id: i64,

        #[arg(long)]
        json: bool,
    },

    /// Delete a project record (the remote repository is kept)
    Remove { id: i64 },
}

pub async fn execute(app: &App, command: ProjectCommands) -> Result<()> {
    match command {
        ProjectCommands::Create { name, template } => create(app, name, template).await,
        ProjectCommands::List { json } => {
            let projects = app.orchestrator.list_projects().await?;
            if json {
                return print_json(&projects);
            }
            if projects.is_empty() {
                println!("No projects yet.");
                return Ok(());
            }
            println!("{:<6} {:<24} {:<10} {:<9} REMOTE", "ID", "NAME", "STATUS", "TEMPLATE");
            println!("{}", "-".repeat(80));
            for p in &projects {
                println!(
                    "{:<6} {:<24} {:<10} {:<9} {}",
                    p.id, p.name, p.status, p.template_id, p.remote_url
                );
            }
            Ok(())
        }
        ProjectCommands::Show { id, json } => {
            let project = app.orchestrator.get_project(ProjectId(id)).await?;
            if json {
                return print_json(&project);
            }
            print_project(&project);
            Ok(())
        }
        ProjectCommands::Remove { id } => {
            app.orchestrator.delete_project(ProjectId(id)).await?;
            println!("Project {} deleted.", id);
            Ok(())
        }
    }
}

/// Start provisioning and stream the job log until it ends.
///
/// Ctrl-C cancels the job explicitly, so it still ends in a recorded
/// `error` state instead of being cut off mid-stage.
async fn create(app: &App, name: String, template: i64) -> Result<()> {
    let CreatedProject { project, job } = app
        .orchestrator
        .create_project(CreateProjectRequest {
            name,
            template_id: TemplateId(template),
        })
        .await?;

    println!("Project {} '{}' accepted ({})", project.id, project.name, project.status);

    let mut logs = app.orchestrator.subscribe_logs(project.id);
    let mut received = 0usize;
    loop {
        tokio::select! {
            line = logs.recv() => match line {
                Some(line) => {
                    received += 1;
                    println!("  {}", line);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !job.is_cancelled() => {
                eprintln!("Cancelling project creation...");
                job.cancel();
            }
        }
    }

    for line in catch_up(&app.orchestrator, project.id, received) {
        println!("  {}", line);
    }

    let status = job.wait().await.context("Provisioning task failed")?;
    let project = app.orchestrator.get_project(project.id).await?;
    println!();
    print_project(&project);

    if status == ProjectStatus::Error {
        anyhow::bail!("Project creation failed");
    }
    Ok(())
}

/// Lines to show after the live stream ended. A job that finished before
/// we subscribed yields nothing live, so fall back to its stored log.
fn catch_up(orchestrator: &Orchestrator, id: ProjectId, received: usize) -> Vec<String> {
    if received > 0 {
        return Vec::new();
    }
    orchestrator.get_logs(id)
}

fn print_project(p: &Project) {
    println!("Project {}", p.id);
    println!("  Name:     {}", p.name);
    println!("  Template: {}", p.template_id);
    println!("  Status:   {}", p.status);
    if !p.remote_url.is_empty() {
        println!("  Remote:   {}", p.remote_url);
    }
    println!("  Created:  {}", p.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated:  {}", p.updated_at.format("%Y-%m-%d %H:%M:%S"));
}
