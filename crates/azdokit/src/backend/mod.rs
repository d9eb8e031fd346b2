//! Backend trait and implementations for talking to Azure DevOps.
//!
//! This module provides the [`Backend`] trait, the capability-typed client
//! the poller and reconciler are written against. The primary
//! implementation is [`rest::RestBackend`], which calls the REST API over
//! HTTPS.
//!
//! # Testing
//!
//! Use [`MockBackend`] for testing without network access:
//!
//! ```
//! use azdokit::backend::{Backend, MockBackend};
//! use azdokit::OperationStatus;
//!
//! let mock = MockBackend::with_default_processes();
//! let handle = mock.add_operation([OperationStatus::Queued, OperationStatus::Succeeded]);
//!
//! let first = mock.get_operation(handle.id, handle.plugin_id).unwrap();
//! assert_eq!(first.status, OperationStatus::Queued);
//! assert_eq!(mock.get_processes().unwrap().len(), 4);
//! ```

pub mod rest;

use crate::error::{Error, Result};
use crate::types::{
    Operation, OperationReference, OperationStatus, Process, ProjectReference, TeamProject,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Capability-typed Azure DevOps client.
///
/// Implementations must be safe to share between threads: several
/// reconciliations may run against one backend at once.
pub trait Backend: Send + Sync {
    /// Queue creation of a project.
    fn create_project(&self, project: &TeamProject) -> Result<OperationReference>;

    /// Fetch a project by id or name.
    ///
    /// # Errors
    ///
    /// Returns an error whose category is `NotFound` if no such project exists.
    fn get_project(
        &self,
        id_or_name: &str,
        include_capabilities: bool,
        include_history: bool,
    ) -> Result<TeamProject>;

    /// List every project in the organization.
    fn list_projects(&self) -> Result<Vec<ProjectReference>>;

    /// Queue an update. Fields left `None` are not touched.
    fn update_project(&self, id: Uuid, project: &TeamProject) -> Result<OperationReference>;

    /// Queue deletion of a project.
    fn delete_project(&self, id: Uuid) -> Result<OperationReference>;

    /// Query the status of an asynchronous operation.
    fn get_operation(&self, operation_id: Uuid, plugin_id: Option<Uuid>) -> Result<Operation>;

    /// List the process templates of the organization.
    fn get_processes(&self) -> Result<Vec<Process>>;

    /// Fetch one process template.
    fn get_process_by_id(&self, id: Uuid) -> Result<Process>;
}

/// Well-known ids of the inherited process templates.
pub mod process_ids {
    /// Agile.
    pub const AGILE: &str = "adcc42ab-9882-485e-a3ed-7678f01f66bc";
    /// Scrum.
    pub const SCRUM: &str = "6b724908-ef14-45cf-84f8-768b5384da45";
    /// CMMI.
    pub const CMMI: &str = "27450541-8e31-4150-9947-dc59f998fc01";
    /// Basic.
    pub const BASIC: &str = "b8a3a935-7e91-48b8-a94c-606d37c3e9f2";
}

/// One scripted answer to `get_operation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    /// Report this status.
    Status(OperationStatus),
    /// Fail the query with an HTTP 500 carrying this message.
    Error(String),
}

impl From<OperationStatus> for Scripted {
    fn from(status: OperationStatus) -> Self {
        Self::Status(status)
    }
}

/// Backend methods that can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `create_project`
    CreateProject,
    /// `get_project`
    GetProject,
    /// `list_projects`
    ListProjects,
    /// `update_project`
    UpdateProject,
    /// `delete_project`
    DeleteProject,
    /// `get_processes`
    GetProcesses,
    /// `get_process_by_id`
    GetProcessById,
}

/// A call recorded by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `create_project` with the project name.
    CreateProject(String),
    /// `get_project` with the lookup key.
    GetProject(String),
    /// `list_projects`.
    ListProjects,
    /// `update_project` with the id and the body sent.
    UpdateProject(Uuid, TeamProject),
    /// `delete_project` with the id.
    DeleteProject(Uuid),
    /// `get_operation` with the operation id.
    GetOperation(Uuid),
    /// `get_processes`.
    GetProcesses,
    /// `get_process_by_id` with the id.
    GetProcessById(Uuid),
}

impl Call {
    /// Whether this call changes remote state.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::CreateProject(_) | Self::UpdateProject(..) | Self::DeleteProject(_)
        )
    }
}

#[derive(Debug, Default)]
struct MockState {
    projects: Vec<TeamProject>,
    processes: Vec<Process>,
    operations: HashMap<Uuid, VecDeque<Scripted>>,
    next_script: VecDeque<Scripted>,
    failures: HashMap<Method, String>,
    calls: Vec<Call>,
}

impl MockState {
    fn take_failure(&mut self, method: Method) -> Result<()> {
        match self.failures.remove(&method) {
            Some(message) => Err(Error::http(message, Some(500))),
            None => Ok(()),
        }
    }

    /// Register an operation using the pending script, or an immediate success.
    fn issue_operation(&mut self) -> OperationReference {
        let mut script = std::mem::take(&mut self.next_script);
        if script.is_empty() {
            script.push_back(Scripted::Status(OperationStatus::Succeeded));
        }
        let id = Uuid::new_v4();
        self.operations.insert(id, script);
        OperationReference {
            id,
            plugin_id: Some(Uuid::nil()),
            status: Some(OperationStatus::Queued),
            url: None,
        }
    }

    fn next_script_fails(&self) -> bool {
        self.next_script.iter().any(|s| {
            matches!(
                s,
                Scripted::Status(OperationStatus::Failed | OperationStatus::Cancelled)
            )
        })
    }

    fn find_project(&self, id_or_name: &str) -> Option<usize> {
        self.projects.iter().position(|p| {
            p.id.is_some_and(|id| id.to_string().eq_ignore_ascii_case(id_or_name))
                || p.name
                    .as_deref()
                    .is_some_and(|n| n.eq_ignore_ascii_case(id_or_name))
        })
    }
}

/// In-memory backend for testing without network access.
///
/// Projects created through it become visible immediately unless the
/// scripted operation ends in `Failed` or `Cancelled`. Every call is
/// recorded and can be inspected with [`MockBackend::calls`].
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock backend with the four inherited process templates.
    #[must_use]
    pub fn with_default_processes() -> Self {
        let mock = Self::new();
        for (id, name) in [
            (process_ids::AGILE, "Agile"),
            (process_ids::SCRUM, "Scrum"),
            (process_ids::CMMI, "CMMI"),
            (process_ids::BASIC, "Basic"),
        ] {
            if let Ok(id) = Uuid::parse_str(id) {
                mock.add_process(Process::new(id, name));
            }
        }
        mock
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Add a process template to the catalog.
    pub fn add_process(&self, process: Process) {
        self.state().processes.push(process);
    }

    /// Seed an existing project. Returns its id (generated if absent).
    pub fn add_project(&self, mut project: TeamProject) -> Uuid {
        let id = *project.id.get_or_insert_with(Uuid::new_v4);
        self.state().projects.push(project);
        id
    }

    /// Register a standalone operation that answers with `script` in order.
    ///
    /// The last entry repeats once the script is exhausted.
    pub fn add_operation<I, S>(&self, script: I) -> OperationReference
    where
        I: IntoIterator<Item = S>,
        S: Into<Scripted>,
    {
        let mut state = self.state();
        state.next_script = script.into_iter().map(Into::into).collect();
        state.issue_operation()
    }

    /// Script the answers of the next operation a mutating call issues.
    pub fn script_next_operation<I, S>(&self, script: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Scripted>,
    {
        self.state().next_script = script.into_iter().map(Into::into).collect();
    }

    /// Make the next call to `method` fail with an HTTP 500.
    pub fn fail_next(&self, method: Method, message: impl Into<String>) {
        self.state().failures.insert(method, message.into());
    }

    /// All calls received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Number of `get_operation` calls received.
    #[must_use]
    pub fn operation_queries(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::GetOperation(_)))
            .count()
    }

    /// Number of mutating calls received.
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.calls().iter().filter(|c| c.is_mutation()).count()
    }

    /// Stored copy of a project, if present.
    #[must_use]
    pub fn project(&self, id_or_name: &str) -> Option<TeamProject> {
        let state = self.state();
        state
            .find_project(id_or_name)
            .map(|idx| state.projects[idx].clone())
    }
}

impl Backend for MockBackend {
    fn create_project(&self, project: &TeamProject) -> Result<OperationReference> {
        let mut state = self.state();
        let name = project.name.clone().unwrap_or_default();
        state.calls.push(Call::CreateProject(name.clone()));
        state.take_failure(Method::CreateProject)?;

        if state.find_project(&name).is_some() {
            return Err(Error::http(
                format!("project {name} already exists"),
                Some(409),
            ));
        }

        if !state.next_script_fails() {
            let mut stored = project.clone();
            stored.id = Some(Uuid::new_v4());
            stored.state = Some("wellFormed".to_string());
            stored.revision = Some(1);
            state.projects.push(stored);
        }
        Ok(state.issue_operation())
    }

    fn get_project(
        &self,
        id_or_name: &str,
        include_capabilities: bool,
        _include_history: bool,
    ) -> Result<TeamProject> {
        let mut state = self.state();
        state.calls.push(Call::GetProject(id_or_name.to_string()));
        state.take_failure(Method::GetProject)?;

        let idx = state
            .find_project(id_or_name)
            .ok_or_else(|| Error::not_found("project", id_or_name))?;
        let mut project = state.projects[idx].clone();
        if !include_capabilities {
            project.capabilities = None;
        }
        Ok(project)
    }

    fn list_projects(&self) -> Result<Vec<ProjectReference>> {
        let mut state = self.state();
        state.calls.push(Call::ListProjects);
        state.take_failure(Method::ListProjects)?;

        Ok(state
            .projects
            .iter()
            .filter_map(|p| {
                Some(ProjectReference {
                    id: p.id?,
                    name: p.name.clone()?,
                    description: p.description.clone(),
                    state: p.state.clone(),
                    visibility: p.visibility,
                })
            })
            .collect())
    }

    fn update_project(&self, id: Uuid, project: &TeamProject) -> Result<OperationReference> {
        let mut state = self.state();
        state.calls.push(Call::UpdateProject(id, project.clone()));
        state.take_failure(Method::UpdateProject)?;

        let idx = state
            .find_project(&id.to_string())
            .ok_or_else(|| Error::http(format!("project {id} does not exist"), Some(404)))?;
        if !state.next_script_fails() {
            let stored = &mut state.projects[idx];
            if let Some(name) = &project.name {
                stored.name = Some(name.clone());
            }
            if let Some(description) = &project.description {
                stored.description = Some(description.clone());
            }
            if let Some(visibility) = project.visibility {
                stored.visibility = Some(visibility);
            }
            stored.revision = Some(stored.revision.unwrap_or(0) + 1);
        }
        Ok(state.issue_operation())
    }

    fn delete_project(&self, id: Uuid) -> Result<OperationReference> {
        let mut state = self.state();
        state.calls.push(Call::DeleteProject(id));
        state.take_failure(Method::DeleteProject)?;

        let idx = state
            .find_project(&id.to_string())
            .ok_or_else(|| Error::http(format!("project {id} does not exist"), Some(404)))?;
        state.projects.remove(idx);
        Ok(state.issue_operation())
    }

    fn get_operation(&self, operation_id: Uuid, _plugin_id: Option<Uuid>) -> Result<Operation> {
        let mut state = self.state();
        state.calls.push(Call::GetOperation(operation_id));

        let script = state
            .operations
            .get_mut(&operation_id)
            .ok_or_else(|| Error::http(format!("operation {operation_id} not found"), Some(404)))?;
        let answer = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };

        match answer {
            Some(Scripted::Status(status)) => Ok(Operation {
                id: operation_id,
                plugin_id: Some(Uuid::nil()),
                status,
                detailed_message: (!status.is_success()).then(|| format!("operation {status}")),
                result_message: None,
            }),
            Some(Scripted::Error(message)) => Err(Error::http(message, Some(500))),
            None => Err(Error::InvalidResponse("empty operation script".to_string())),
        }
    }

    fn get_processes(&self) -> Result<Vec<Process>> {
        let mut state = self.state();
        state.calls.push(Call::GetProcesses);
        state.take_failure(Method::GetProcesses)?;
        Ok(state.processes.clone())
    }

    fn get_process_by_id(&self, id: Uuid) -> Result<Process> {
        let mut state = self.state();
        state.calls.push(Call::GetProcessById(id));
        state.take_failure(Method::GetProcessById)?;

        state
            .processes
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| Error::http(format!("process {id} does not exist"), Some(404)))
    }
}
