//! Manifest-driven plan, apply and destroy.

use anyhow::{Context as AnyhowContext, Result, bail};
use azdokit::descriptor::changed_fields;
use azdokit::{Client, DeleteOutcome, Project, ReconcileOptions};
use colored::Colorize;
use indicatif::MultiProgress;
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

use crate::Context;
use crate::cli::{ApplyArgs, DestroyArgs, ManifestArgs};
use crate::config::expand_path;
use crate::manifest::Manifest;
use crate::progress::{self, SpinnerCallback};
use crate::state::AzdoState;
use crate::ui;

// ============================================================================
// Planning
// ============================================================================

/// What apply would do for one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create,
    Update(Vec<&'static str>),
    NoChange,
    /// An immutable field differs; the project would have to be replaced
    Replace(&'static str),
}

#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub desired: Project,
    /// Refreshed remote record, `None` when the project does not exist
    pub current: Option<Project>,
    pub action: Action,
    /// State key the project was found under when it is being renamed
    pub renamed_from: Option<String>,
}

impl PlanEntry {
    pub fn is_change(&self) -> bool {
        self.action != Action::NoChange
    }
}

fn action_for(current: Option<&Project>, desired: &Project) -> Action {
    let Some(current) = current else {
        return Action::Create;
    };
    if current.version_control != desired.version_control {
        return Action::Replace("version_control");
    }
    if current.work_item_template != desired.work_item_template {
        return Action::Replace("work_item_template");
    }

    let fields = changed_fields(current, desired);
    if fields.is_empty() {
        Action::NoChange
    } else {
        Action::Update(fields)
    }
}

/// State key and record for a manifest project, following `previous_name`
fn recorded<'a>(
    manifest: &Manifest,
    state: &'a AzdoState,
    name: &str,
) -> Option<(String, &'a Project)> {
    if let Some(record) = state.record(name) {
        return Some((name.to_string(), record));
    }
    let previous = manifest.previous_name(name)?;
    state
        .record(previous)
        .map(|record| (previous.to_string(), record))
}

/// Refresh every manifest project and decide what to do with it.
///
/// A project recorded in state (under its name or its `previous_name`) is
/// read by id. One that is not is looked up by name, then by previous name,
/// so an existing project is adopted.
pub fn plan(client: &Client, manifest: &Manifest, state: &AzdoState) -> Result<Vec<PlanEntry>> {
    let reconciler = client.reconciler();
    let mut entries = Vec::with_capacity(manifest.projects.len());

    for desired in &manifest.projects {
        let previous = manifest.previous_name(&desired.name);
        let recorded = recorded(manifest, state, &desired.name);

        let current = match &recorded {
            Some((_, record)) => reconciler.read(record)?,
            None => match reconciler.find(&desired.name)? {
                Some(found) => Some(found),
                None => match previous {
                    Some(previous) => reconciler.find(previous)?,
                    None => None,
                },
            },
        };
        if current.is_none() && recorded.is_some() {
            log::info!("{} is recorded in state but gone remotely", desired.name);
        }

        let renamed_from = match (&current, previous) {
            (Some(current), Some(previous)) if current.name != desired.name => {
                log::debug!("{} is renamed from {}", desired.name, current.name);
                Some(recorded.map_or_else(|| previous.to_string(), |(key, _)| key))
            }
            _ => None,
        };

        let action = action_for(current.as_ref(), desired);
        entries.push(PlanEntry {
            desired: desired.clone(),
            current,
            action,
            renamed_from,
        });
    }

    Ok(entries)
}

fn refresh(client: &Client, manifest: &Manifest, state: &AzdoState) -> Result<Vec<PlanEntry>> {
    let pb = progress::spinner("Refreshing project state...");
    let result = plan(client, manifest, state);
    pb.finish_and_clear();
    result
}

/// Display the plan in a user-friendly format
pub fn display_plan(entries: &[PlanEntry]) {
    let changes = entries.iter().filter(|e| e.is_change()).count();
    if changes == 0 {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Project Plan".bold()
    );
    println!("│");

    for entry in entries {
        let (symbol, detail) = match &entry.action {
            Action::Create => (
                "+".green(),
                format!(
                    "(create: {}, {}, {})",
                    entry.desired.visibility,
                    entry.desired.version_control,
                    entry.desired.work_item_template
                ),
            ),
            Action::Update(fields) => match &entry.renamed_from {
                Some(previous) => (
                    "~".yellow(),
                    format!("(rename from {previous}; update: {})", fields.join(", ")),
                ),
                None => ("~".yellow(), format!("(update: {})", fields.join(", "))),
            },
            Action::NoChange => ("○".dimmed(), "(no change)".to_string()),
            Action::Replace(field) => (
                "!".red(),
                format!("({field} cannot change in place; replace the project)"),
            ),
        };
        println!("│   {} {:<30} {}", symbol, entry.desired.name, detail.dimmed());
    }

    let replace = entries
        .iter()
        .filter(|e| matches!(e.action, Action::Replace(_)))
        .count();

    println!("│");
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} need replacement)",
        changes.to_string().bold(),
        replace.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

pub fn plan_command(ctx: &Context, args: ManifestArgs) -> Result<()> {
    let manifest = Manifest::load(&expand_path(&args.file))?;
    let state = AzdoState::load()?;
    let client = super::client(ctx)?;

    let entries = refresh(&client, &manifest, &state)?;
    display_plan(&entries);
    Ok(())
}

// ============================================================================
// Apply
// ============================================================================

#[derive(Debug, Clone)]
pub enum ApplyResult {
    Created(Project),
    Updated(Project),
    NoChange(Project),
    Failed { error: String },
}

/// Outcome of applying one plan entry
#[derive(Debug, Clone)]
pub struct Applied {
    pub name: String,
    /// State key to drop once the renamed project is recorded under `name`
    pub renamed_from: Option<String>,
    pub result: ApplyResult,
}

/// Summary of execution results
#[derive(Debug, Default)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub no_change: usize,
    pub failed: usize,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.updated
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

fn apply_entry(client: &Client, entry: &PlanEntry, callback: &SpinnerCallback) -> ApplyResult {
    let reconciler = client.reconciler_with(callback);

    let result = match (&entry.action, &entry.current) {
        (Action::Create, _) | (_, None) => {
            let mut record = entry.desired.clone();
            reconciler
                .create(&mut record)
                .map(|()| ApplyResult::Created(record))
        }
        (Action::NoChange, Some(current)) => Ok(ApplyResult::NoChange(current.clone())),
        (Action::Update(_) | Action::Replace(_), Some(current)) => reconciler
            .update(current, &entry.desired)
            .map(|_| {
                let mut record = entry.desired.clone();
                record.id = current.id;
                record.process_template_id = current.process_template_id;
                ApplyResult::Updated(record)
            }),
    };

    result.unwrap_or_else(|e| ApplyResult::Failed {
        error: e.to_string(),
    })
}

/// Apply plan entries in parallel
pub fn execute(client: &Client, entries: &[PlanEntry], jobs: usize) -> Result<Vec<Applied>> {
    let multi = MultiProgress::new();
    let results: Arc<Mutex<Vec<Applied>>> = Arc::new(Mutex::new(Vec::new()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to create apply thread pool")?;

    pool.install(|| {
        entries.par_iter().for_each(|entry| {
            let pb = progress::multi_spinner(&multi, &entry.desired.name);
            let callback = SpinnerCallback::new(pb.clone(), entry.desired.name.clone());

            let result = apply_entry(client, entry, &callback);

            let symbol = match &result {
                ApplyResult::NoChange(_) => "○".dimmed(),
                ApplyResult::Created(_) | ApplyResult::Updated(_) => "✓".green(),
                ApplyResult::Failed { .. } => "✗".red(),
            };
            pb.finish_with_message(format!("{} {}", symbol, entry.desired.name));

            push_apply_result(
                &results,
                Applied {
                    name: entry.desired.name.clone(),
                    renamed_from: entry.renamed_from.clone(),
                    result,
                },
            );
        });
    });

    into_apply_results(results)
}

fn push_apply_result(results: &Arc<Mutex<Vec<Applied>>>, applied: Applied) {
    match results.lock() {
        Ok(mut locked) => locked.push(applied),
        Err(poisoned) => poisoned.into_inner().push(applied),
    }
}

fn into_apply_results(results: Arc<Mutex<Vec<Applied>>>) -> Result<Vec<Applied>> {
    let mutex = Arc::try_unwrap(results)
        .map_err(|_| anyhow::anyhow!("Failed to collect apply results: shared result state"))?;

    match mutex.into_inner() {
        Ok(collected) => Ok(collected),
        Err(poisoned) => Ok(poisoned.into_inner()),
    }
}

/// Record successful results in state and count outcomes
pub fn record_results(state: &mut AzdoState, results: Vec<Applied>) -> ExecuteSummary {
    let mut summary = ExecuteSummary::default();
    for applied in results {
        if let Some(previous) = &applied.renamed_from
            && !matches!(applied.result, ApplyResult::Failed { .. })
        {
            state.remove(previous);
        }
        match applied.result {
            ApplyResult::Created(record) => {
                summary.created += 1;
                state.upsert(&applied.name, record);
            }
            ApplyResult::Updated(record) => {
                summary.updated += 1;
                state.upsert(&applied.name, record);
            }
            ApplyResult::NoChange(record) => {
                summary.no_change += 1;
                state.upsert(&applied.name, record);
            }
            ApplyResult::Failed { error } => {
                summary.failed += 1;
                ui::error(&format!("{}: {}", applied.name, error));
            }
        }
    }
    summary
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Projects applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Projects applied with errors", "⚠".yellow().bold());
    }

    if summary.total_changes() == 0 && summary.failed == 0 {
        println!("    • nothing changed");
    }
    if summary.created > 0 {
        println!("    • {} projects created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} projects updated", summary.updated);
    }
    if summary.no_change > 0 {
        println!("    • {} projects unchanged", summary.no_change);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "projects".red());
    }
}

pub fn apply(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let manifest = Manifest::load(&expand_path(&args.manifest.file))?;
    let mut state = AzdoState::load()?;
    let client = super::client(ctx)?;

    let entries = refresh(&client, &manifest, &state)?;
    display_plan(&entries);

    if !entries.iter().any(PlanEntry::is_change) {
        return Ok(());
    }

    if args.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(());
    }

    if !args.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    println!();
    println!(
        "  {} Applying {} projects...",
        "→".cyan(),
        entries.iter().filter(|e| e.is_change()).count()
    );

    let results = execute(&client, &entries, args.jobs)?;
    let summary = record_results(&mut state, results);
    state.save()?;
    print_summary(&summary);

    if !summary.is_success() {
        bail!("{} project(s) failed to apply", summary.failed);
    }
    Ok(())
}

// ============================================================================
// Destroy
// ============================================================================

#[derive(Debug, Default)]
pub struct DestroySummary {
    pub deleted: usize,
    pub already_gone: usize,
    pub failed: usize,
}

/// Delete manifest projects recorded in state, forgetting each one that is gone
pub fn destroy_projects(
    client: &Client,
    manifest: &Manifest,
    state: &mut AzdoState,
    options: ReconcileOptions,
) -> DestroySummary {
    let mut summary = DestroySummary::default();

    for desired in &manifest.projects {
        let Some((key, id)) = recorded(manifest, state, &desired.name)
            .and_then(|(key, record)| record.id.map(|id| (key, id.to_string())))
        else {
            continue;
        };

        let callback = SpinnerCallback::new(
            progress::spinner(&format!("Deleting {}...", desired.name)),
            format!("Deleting {}", desired.name),
        );
        let result = client
            .reconciler_with(&callback)
            .with_options(options)
            .delete(&id);
        callback.progress_bar().finish_and_clear();

        match result {
            Ok(DeleteOutcome::Queued(_)) => {
                ui::success(&format!("{} delete queued", desired.name));
                state.remove(&key);
                summary.deleted += 1;
            }
            Ok(DeleteOutcome::Completed(_)) => {
                ui::success(&format!("{} deleted", desired.name));
                state.remove(&key);
                summary.deleted += 1;
            }
            Err(e) if e.is_not_found() => {
                ui::warn(&format!("{} no longer exists", desired.name));
                state.remove(&key);
                summary.already_gone += 1;
            }
            Err(e) => {
                ui::error(&e.to_string());
                summary.failed += 1;
            }
        }
    }

    summary
}

pub fn destroy(ctx: &Context, args: DestroyArgs) -> Result<()> {
    let manifest = Manifest::load(&expand_path(&args.manifest.file))?;
    let mut state = AzdoState::load()?;

    let targets: Vec<&str> = manifest
        .projects
        .iter()
        .filter(|p| recorded(&manifest, &state, &p.name).is_some_and(|(_, r)| r.id.is_some()))
        .map(|p| p.name.as_str())
        .collect();

    if targets.is_empty() {
        ui::info("Nothing to destroy: no manifest project is recorded in state");
        return Ok(());
    }

    ui::header("Projects to delete");
    for name in &targets {
        println!("  {} {}", "-".red(), name);
    }
    println!();

    if !args.yes && !confirm_proceed()? {
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let client = super::client(ctx)?;
    let options = ReconcileOptions {
        await_delete: args.wait || client.options().await_delete,
        ..*client.options()
    };

    let summary = destroy_projects(&client, &manifest, &mut state, options);
    state.save()?;

    if summary.failed > 0 {
        bail!("{} project(s) failed to delete", summary.failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use azdokit::backend::{Method, MockBackend};
    use azdokit::clock::ManualClock;
    use azdokit::{OperationStatus, Visibility};

    fn client(mock: &MockBackend) -> Client {
        Client::with_backend(Box::new(mock.clone())).with_clock(Box::new(ManualClock::new()))
    }

    fn manifest(content: &str) -> Manifest {
        Manifest::parse(content).unwrap()
    }

    const TWO_PROJECTS: &str = r#"
[[project]]
name = "Proj1"
description = "Demo"

[[project]]
name = "Proj2"
visibility = "public"
work_item_template = "Scrum"
"#;

    fn applied(mock: &MockBackend, content: &str) -> AzdoState {
        let client = client(mock);
        let mut state = AzdoState::default();
        let entries = plan(&client, &manifest(content), &state).unwrap();
        let results = execute(&client, &entries, 2).unwrap();
        let summary = record_results(&mut state, results);
        assert!(summary.is_success());
        state
    }

    #[test]
    fn test_plan_creates_missing_projects() {
        let mock = MockBackend::with_default_processes();
        let entries = plan(&client(&mock), &manifest(TWO_PROJECTS), &AzdoState::default()).unwrap();

        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.action == Action::Create));
        assert_eq!(mock.mutations(), 0);
    }

    #[test]
    fn test_apply_records_state() {
        let mock = MockBackend::with_default_processes();
        let state = applied(&mock, TWO_PROJECTS);

        let first = state.record("Proj1").unwrap();
        assert!(first.id.is_some());
        assert_eq!(first.description.as_deref(), Some("Demo"));

        let second = state.record("Proj2").unwrap();
        assert_eq!(second.visibility, Visibility::Public);
        assert_eq!(second.work_item_template, "Scrum");
    }

    #[test]
    fn test_second_plan_is_no_change() {
        let mock = MockBackend::with_default_processes();
        let state = applied(&mock, TWO_PROJECTS);
        let mutations = mock.mutations();

        let entries = plan(&client(&mock), &manifest(TWO_PROJECTS), &state).unwrap();
        assert!(entries.iter().all(|e| e.action == Action::NoChange));

        let results = execute(&client(&mock), &entries, 2).unwrap();
        let mut state = state;
        let summary = record_results(&mut state, results);
        assert_eq!(summary.no_change, 2);
        assert_eq!(summary.total_changes(), 0);
        assert_eq!(mock.mutations(), mutations);
    }

    #[test]
    fn test_plan_update_and_apply() {
        let mock = MockBackend::with_default_processes();
        let mut state = applied(&mock, TWO_PROJECTS);
        let changed = TWO_PROJECTS.replace("\"Demo\"", "\"Changed\"");

        let client = client(&mock);
        let entries = plan(&client, &manifest(&changed), &state).unwrap();
        assert_eq!(entries[0].action, Action::Update(vec!["description"]));
        assert_eq!(entries[1].action, Action::NoChange);

        let summary = record_results(&mut state, execute(&client, &entries, 1).unwrap());
        assert_eq!(summary.updated, 1);
        assert_eq!(
            state.record("Proj1").unwrap().description.as_deref(),
            Some("Changed")
        );
        assert_eq!(
            mock.project("Proj1").unwrap().description.as_deref(),
            Some("Changed")
        );
    }

    #[test]
    fn test_plan_immutable_change_needs_replace() {
        let mock = MockBackend::with_default_processes();
        let mut state = applied(&mock, TWO_PROJECTS);
        let changed = TWO_PROJECTS.replace("\"Scrum\"", "\"Basic\"");

        let client = client(&mock);
        let entries = plan(&client, &manifest(&changed), &state).unwrap();
        assert_eq!(entries[1].action, Action::Replace("work_item_template"));

        let mutations = mock.mutations();
        let summary = record_results(&mut state, execute(&client, &entries, 2).unwrap());
        assert_eq!(summary.failed, 1);
        assert_eq!(mock.mutations(), mutations);
        assert_eq!(state.record("Proj2").unwrap().work_item_template, "Scrum");
    }

    #[test]
    fn test_plan_recreates_project_deleted_remotely() {
        let mock = MockBackend::with_default_processes();
        let state = applied(&mock, TWO_PROJECTS);
        let id = state.record("Proj1").unwrap().lookup_key();
        client(&mock).reconciler().delete(&id).unwrap();

        let entries = plan(&client(&mock), &manifest(TWO_PROJECTS), &state).unwrap();
        assert_eq!(entries[0].action, Action::Create);
        assert!(entries[0].current.is_none());
    }

    #[test]
    fn test_plan_adopts_existing_project() {
        let mock = MockBackend::with_default_processes();
        let mut existing = Project::new("Proj1").description("Demo");
        client(&mock).reconciler().create(&mut existing).unwrap();

        let only_first = "[[project]]\nname = \"Proj1\"\ndescription = \"Demo\"\n";
        let entries = plan(&client(&mock), &manifest(only_first), &AzdoState::default()).unwrap();
        assert_eq!(entries[0].action, Action::NoChange);
        assert_eq!(entries[0].current.as_ref().unwrap().id, existing.id);
    }

    #[test]
    fn test_rename_updates_existing_project() {
        let mock = MockBackend::with_default_processes();
        let mut state = applied(&mock, "[[project]]\nname = \"Proj1\"\n");
        let id = state.record("Proj1").unwrap().id;

        let renamed = manifest("[[project]]\nname = \"Proj2\"\nprevious_name = \"Proj1\"\n");
        let client = client(&mock);
        let entries = plan(&client, &renamed, &state).unwrap();
        assert_eq!(entries[0].action, Action::Update(vec!["name"]));
        assert_eq!(entries[0].renamed_from.as_deref(), Some("Proj1"));

        let summary = record_results(&mut state, execute(&client, &entries, 1).unwrap());
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.created, 0);
        assert!(mock.project("Proj1").is_none());
        assert!(mock.project("Proj2").is_some());
        assert!(state.record("Proj1").is_none());
        assert_eq!(state.record("Proj2").unwrap().id, id);

        // The next plan finds the project under its new name.
        let entries = plan(&client, &renamed, &state).unwrap();
        assert_eq!(entries[0].action, Action::NoChange);
        assert!(entries[0].renamed_from.is_none());
    }

    #[test]
    fn test_rename_adopts_project_missing_from_state() {
        let mock = MockBackend::with_default_processes();
        let mut existing = Project::new("Proj1");
        client(&mock).reconciler().create(&mut existing).unwrap();

        let renamed = manifest("[[project]]\nname = \"Proj2\"\nprevious_name = \"Proj1\"\n");
        let entries = plan(&client(&mock), &renamed, &AzdoState::default()).unwrap();
        assert_eq!(entries[0].action, Action::Update(vec!["name"]));
        assert_eq!(entries[0].current.as_ref().unwrap().id, existing.id);
    }

    #[test]
    fn test_destroy_follows_rename() {
        let mock = MockBackend::with_default_processes();
        let mut state = applied(&mock, "[[project]]\nname = \"Proj1\"\n");

        let renamed = manifest("[[project]]\nname = \"Proj2\"\nprevious_name = \"Proj1\"\n");
        let summary = destroy_projects(&client(&mock), &renamed, &mut state, ReconcileOptions::default());

        assert_eq!(summary.deleted, 1);
        assert!(state.projects.is_empty());
        assert!(mock.project("Proj1").is_none());
    }

    #[test]
    fn test_apply_failure_is_reported() {
        let mock = MockBackend::with_default_processes();
        mock.script_next_operation([OperationStatus::Failed]);

        let client = client(&mock);
        let only_first = "[[project]]\nname = \"Proj1\"\n";
        let mut state = AzdoState::default();
        let entries = plan(&client, &manifest(only_first), &state).unwrap();
        let summary = record_results(&mut state, execute(&client, &entries, 1).unwrap());

        assert_eq!(summary.failed, 1);
        assert!(!summary.is_success());
        assert!(state.record("Proj1").is_none());
    }

    #[test]
    fn test_plan_refresh_error_propagates() {
        let mock = MockBackend::with_default_processes();
        mock.fail_next(Method::GetProject, "unauthorized");
        assert!(plan(&client(&mock), &manifest(TWO_PROJECTS), &AzdoState::default()).is_err());
    }

    #[test]
    fn test_destroy_removes_recorded_projects() {
        let mock = MockBackend::with_default_processes();
        let mut state = applied(&mock, TWO_PROJECTS);

        let summary = destroy_projects(
            &client(&mock),
            &manifest(TWO_PROJECTS),
            &mut state,
            ReconcileOptions::default(),
        );

        assert_eq!(summary.deleted, 2);
        assert!(state.projects.is_empty());
        assert!(mock.project("Proj1").is_none());
        assert!(mock.project("Proj2").is_none());
    }

    #[test]
    fn test_destroy_forgets_projects_already_gone() {
        let mock = MockBackend::with_default_processes();
        let mut state = applied(&mock, TWO_PROJECTS);
        let id = state.record("Proj1").unwrap().lookup_key();
        client(&mock).reconciler().delete(&id).unwrap();

        let options = ReconcileOptions {
            await_delete: true,
            ..ReconcileOptions::default()
        };
        let summary = destroy_projects(&client(&mock), &manifest(TWO_PROJECTS), &mut state, options);

        assert_eq!(summary.already_gone, 1);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.failed, 0);
        assert!(state.projects.is_empty());
    }

    #[test]
    fn test_destroy_keeps_state_on_failure() {
        let mock = MockBackend::with_default_processes();
        let mut state = applied(&mock, TWO_PROJECTS);
        mock.fail_next(Method::DeleteProject, "forbidden");

        let summary = destroy_projects(
            &client(&mock),
            &manifest(TWO_PROJECTS),
            &mut state,
            ReconcileOptions::default(),
        );

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.deleted, 1);
        assert!(state.record("Proj1").is_some());
    }

    #[test]
    fn push_apply_result_handles_poisoned_mutex() {
        let results: Arc<Mutex<Vec<Applied>>> = Arc::new(Mutex::new(Vec::new()));
        let poisoned = Arc::clone(&results);

        let _ = std::thread::spawn(move || {
            let _guard = poisoned
                .lock()
                .expect("lock should succeed before poisoning");
            panic!("intentional poison");
        })
        .join();

        push_apply_result(
            &results,
            Applied {
                name: "Proj1".to_string(),
                renamed_from: None,
                result: ApplyResult::Failed {
                    error: "boom".to_string(),
                },
            },
        );

        let collected = into_apply_results(results).expect("poisoned mutex should be recovered");
        assert_eq!(collected.len(), 1);
    }
}
