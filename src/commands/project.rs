use anyhow::{Result, bail};
use azdokit::{Client, DeleteOutcome, Project, ReconcileOptions};

use crate::cli::ProjectCommand;
use crate::progress::{self, SpinnerCallback};
use crate::ui;
use crate::Context;

pub fn run(ctx: &Context, cmd: ProjectCommand) -> Result<()> {
    let client = super::client(ctx)?;
    match cmd {
        ProjectCommand::Show { target } => show(&client, &target),
        ProjectCommand::Delete { id, wait } => delete(&client, &id, wait),
    }
}

fn show(client: &Client, target: &str) -> Result<()> {
    let target = target.trim();
    if target.is_empty() {
        bail!("Either a project name or a project id must be given");
    }

    let pb = progress::spinner(&format!("Reading {target}..."));
    let result = client.reconciler().find(target);
    pb.finish_and_clear();

    let Some(project) = result? else {
        bail!("Project with name or id {target} does not exist");
    };
    print_project(&project);
    Ok(())
}

pub fn print_project(project: &Project) {
    ui::header(&project.name);
    ui::kv(
        "id",
        &project.id.map(|id| id.to_string()).unwrap_or_default(),
    );
    ui::kv(
        "description",
        project.description.as_deref().unwrap_or_default(),
    );
    ui::kv("visibility", project.visibility.as_str());
    ui::kv("version control", project.version_control.as_str());
    ui::kv("work item template", &project.work_item_template);
    if let Some(template_id) = project.process_template_id {
        ui::kv("process template id", &template_id.to_string());
    }
}

fn delete(client: &Client, id: &str, wait: bool) -> Result<()> {
    let options = ReconcileOptions {
        await_delete: wait || client.options().await_delete,
        ..*client.options()
    };

    let callback = SpinnerCallback::new(
        progress::spinner(&format!("Deleting {id}...")),
        format!("Deleting {id}"),
    );
    let result = client
        .reconciler_with(&callback)
        .with_options(options)
        .delete(id);
    callback.progress_bar().finish_and_clear();

    match result? {
        DeleteOutcome::Queued(handle) => {
            ui::success(&format!("Delete of {id} queued (operation {})", handle.id));
        }
        DeleteOutcome::Completed(_) => ui::success(&format!("Deleted {id}")),
    }
    Ok(())
}
