use anyhow::Result;
use azdokit::Client;
use colored::Colorize;

use crate::progress;
use crate::ui;
use crate::Context;

pub fn projects(ctx: &Context) -> Result<()> {
    let client = super::client(ctx)?;
    list_projects(&client)
}

pub fn processes(ctx: &Context) -> Result<()> {
    let client = super::client(ctx)?;
    list_processes(&client)
}

fn list_projects(client: &Client) -> Result<()> {
    let pb = progress::spinner("Listing projects...");
    let result = client.list_projects();
    pb.finish_and_clear();
    let mut projects = result?;

    ui::header("Projects");
    if projects.is_empty() {
        ui::dim("No projects in this organization");
        return Ok(());
    }

    projects.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    for project in &projects {
        println!(
            "  {:<30} {}  {}",
            project.name.bold(),
            project.id.to_string().dimmed(),
            project
                .visibility
                .map(|v| v.to_string())
                .unwrap_or_default()
                .cyan()
        );
        if let Some(description) = project.description.as_deref().filter(|d| !d.is_empty()) {
            ui::dim(&format!("  {description}"));
        }
    }
    println!();
    ui::info(&format!("{} project(s)", projects.len()));
    Ok(())
}

fn list_processes(client: &Client) -> Result<()> {
    let pb = progress::spinner("Listing process templates...");
    let result = client.processes();
    pb.finish_and_clear();
    let processes = result?;

    ui::header("Process Templates");
    for process in &processes {
        let default = if process.is_default {
            " (default)".green().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:<20} {}{}",
            process.name.bold(),
            process.id.to_string().dimmed(),
            default
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use azdokit::{MockBackend, Project};
    use azdokit::clock::ManualClock;

    fn client(mock: &MockBackend) -> Client {
        Client::with_backend(Box::new(mock.clone())).with_clock(Box::new(ManualClock::new()))
    }

    #[test]
    fn test_list_projects_empty() {
        let mock = MockBackend::with_default_processes();
        list_projects(&client(&mock)).unwrap();
    }

    #[test]
    fn test_list_projects_after_create() {
        let mock = MockBackend::with_default_processes();
        let client = client(&mock);
        client
            .reconciler()
            .create(&mut Project::new("Proj1").description("Demo"))
            .unwrap();
        list_projects(&client).unwrap();
    }

    #[test]
    fn test_list_processes_failure_propagates() {
        let mock = MockBackend::with_default_processes();
        mock.fail_next(azdokit::backend::Method::GetProcesses, "unauthorized");
        let err = list_processes(&client(&mock)).unwrap_err();
        assert!(err.to_string().contains("listing process templates"));
    }
}
