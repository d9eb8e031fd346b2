//! Create, read, update and delete orchestration for projects.
//!
//! The reconciler ties the other pieces together: it builds descriptors,
//! issues the mutating call, hands the returned operation to the
//! [`Poller`], and maps the remote project back into a [`Project`] record.
//!
//! Every error leaving a public method is wrapped in [`Error::Context`]
//! naming the action and the project.

use crate::backend::Backend;
use crate::clock::Clock;
use crate::descriptor::{
    self, PROCESS_TEMPLATE_GROUP, SOURCE_CONTROL_TYPE, TEMPLATE_TYPE_ID, VERSION_CONTROL_GROUP,
};
use crate::error::{Error, Result};
use crate::poller::{NoCallback, PollCallback, Poller};
use crate::templates::TemplateResolver;
use crate::types::{
    DeleteOutcome, Operation, Project, ReconcileOptions, TeamProject, UpdateOutcome,
    VersionControl,
};
use uuid::Uuid;

/// Reconciles declarative project records against a backend.
///
/// # Example
///
/// ```
/// use azdokit::backend::MockBackend;
/// use azdokit::clock::ManualClock;
/// use azdokit::reconciler::Reconciler;
/// use azdokit::Project;
///
/// let backend = MockBackend::with_default_processes();
/// let clock = ManualClock::new();
/// let reconciler = Reconciler::new(&backend, &clock);
///
/// let mut project = Project::new("Proj1");
/// reconciler.create(&mut project).unwrap();
/// assert!(project.id.is_some());
/// ```
pub struct Reconciler<'a> {
    backend: &'a dyn Backend,
    clock: &'a dyn Clock,
    callback: &'a dyn PollCallback,
    options: ReconcileOptions,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler with default options and no progress callback.
    pub fn new(backend: &'a dyn Backend, clock: &'a dyn Clock) -> Self {
        Self {
            backend,
            clock,
            callback: &NoCallback,
            options: ReconcileOptions::default(),
        }
    }

    /// Report polling progress to `callback`.
    #[must_use]
    pub fn with_callback(mut self, callback: &'a dyn PollCallback) -> Self {
        self.callback = callback;
        self
    }

    /// Replace the polling options.
    #[must_use]
    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Options in effect.
    #[must_use]
    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    fn poller(&self) -> Poller<'_> {
        Poller::new(self.backend, self.clock, self.callback)
    }

    fn resolver(&self) -> TemplateResolver<'_> {
        TemplateResolver::new(self.backend)
    }

    /// Create the remote project and fill in `record` from it.
    ///
    /// `record` is overwritten only once the operation succeeded and the
    /// new project could be read back; on any error its id stays unset.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown template (no create call is made), the
    /// create call error, `OperationFailed`, `Timeout`, or a failed read.
    pub fn create(&self, record: &mut Project) -> Result<()> {
        log::info!("Creating project {}", record.name);
        let observed = self
            .try_create(record)
            .map_err(|err| err.context("creating project", record.name.clone()))?;
        *record = observed;
        Ok(())
    }

    fn try_create(&self, record: &Project) -> Result<Project> {
        let body = descriptor::build_create(&self.resolver(), record)?;
        let handle = self.backend.create_project(&body)?;
        let operation = self.poller().await_standard(&handle, &self.options.create)?;
        ensure_succeeded(operation)?;

        self.find(&record.name)?
            .ok_or_else(|| Error::not_found("project", record.name.clone()))
    }

    /// Read the remote state of `record`, by id when known, else by name.
    ///
    /// Returns `Ok(None)` when the project does not exist.
    ///
    /// # Errors
    ///
    /// Lookup failures other than not-found, and a template id that cannot
    /// be resolved back to a name.
    pub fn read(&self, record: &Project) -> Result<Option<Project>> {
        self.find(&record.lookup_key())
    }

    /// Read a project by name or id.
    ///
    /// # Errors
    ///
    /// Same as [`Reconciler::read`].
    pub fn find(&self, id_or_name: &str) -> Result<Option<Project>> {
        log::debug!("Reading project {id_or_name}");
        let remote = match self.backend.get_project(id_or_name, true, false) {
            Ok(remote) => remote,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err.context("reading project", id_or_name)),
        };
        self.to_record(remote)
            .map(Some)
            .map_err(|err| err.context("reading project", id_or_name))
    }

    fn to_record(&self, remote: TeamProject) -> Result<Project> {
        let name = remote
            .name
            .clone()
            .ok_or_else(|| Error::InvalidResponse("project without a name".to_string()))?;

        let version_control = remote
            .capability(VERSION_CONTROL_GROUP, SOURCE_CONTROL_TYPE)
            .ok_or_else(|| {
                Error::InvalidResponse(format!("project {name} reports no version control type"))
            })?
            .parse::<VersionControl>()?;

        let template_id = remote
            .capability(PROCESS_TEMPLATE_GROUP, TEMPLATE_TYPE_ID)
            .ok_or_else(|| {
                Error::InvalidResponse(format!("project {name} reports no process template"))
            })?;
        let work_item_template = self.resolver().resolve_name_by_id(template_id)?;
        let process_template_id = Uuid::parse_str(template_id).ok();

        Ok(Project {
            id: remote.id,
            name,
            description: remote.description.filter(|d| !d.is_empty()),
            visibility: remote.visibility.unwrap_or_default(),
            version_control,
            work_item_template,
            process_template_id,
        })
    }

    /// Bring the remote project recorded as `prior` in line with `desired`.
    ///
    /// Only changed mutable fields are sent. No change means no remote call
    /// at all and [`UpdateOutcome::Unchanged`].
    ///
    /// # Errors
    ///
    /// `Immutable` when version control or the process template differ,
    /// `InvalidId` when `prior` has no id, the update call error,
    /// `OperationFailed` or `Timeout`.
    pub fn update(&self, prior: &Project, desired: &Project) -> Result<UpdateOutcome> {
        self.try_update(prior, desired)
            .map_err(|err| err.context("updating project", prior.name.clone()))
    }

    fn try_update(&self, prior: &Project, desired: &Project) -> Result<UpdateOutcome> {
        check_immutable(prior, desired)?;

        let fields = descriptor::changed_fields(prior, desired);
        let Some(patch) = descriptor::for_update(prior, desired) else {
            log::debug!("Project {} is up to date", prior.name);
            return Ok(UpdateOutcome::Unchanged);
        };

        let id = prior.id.ok_or_else(|| Error::InvalidId {
            kind: "project",
            value: String::new(),
        })?;

        log::info!("Updating project {} ({})", prior.name, fields.join(", "));
        let handle = self.backend.update_project(id, &patch)?;
        let operation = self.poller().await_standard(&handle, &self.options.update)?;
        let operation = ensure_succeeded(operation)?;

        Ok(UpdateOutcome::Updated { fields, operation })
    }

    /// Delete the project with the given id.
    ///
    /// Returns as soon as the delete is queued unless
    /// [`ReconcileOptions::await_delete`] is set.
    ///
    /// # Errors
    ///
    /// `InvalidId` for a malformed id (no remote call is made), the delete
    /// call error, and with `await_delete` also `OperationFailed` or `Timeout`.
    pub fn delete(&self, id: &str) -> Result<DeleteOutcome> {
        log::info!("Deleting project {id}");
        self.try_delete(id)
            .map_err(|err| err.context("deleting project", id))
    }

    fn try_delete(&self, id: &str) -> Result<DeleteOutcome> {
        let parsed = Uuid::parse_str(id).map_err(|_| Error::InvalidId {
            kind: "project",
            value: id.to_string(),
        })?;

        let handle = self.backend.delete_project(parsed)?;
        if !self.options.await_delete {
            return Ok(DeleteOutcome::Queued(handle));
        }

        let operation = self.poller().await_standard(&handle, &self.options.delete)?;
        ensure_succeeded(operation).map(DeleteOutcome::Completed)
    }
}

fn check_immutable(prior: &Project, desired: &Project) -> Result<()> {
    if prior.version_control != desired.version_control {
        return Err(Error::Immutable {
            field: "version_control",
            from: prior.version_control.to_string(),
            to: desired.version_control.to_string(),
        });
    }
    if prior.work_item_template != desired.work_item_template {
        return Err(Error::Immutable {
            field: "work_item_template",
            from: prior.work_item_template.clone(),
            to: desired.work_item_template.clone(),
        });
    }
    Ok(())
}

fn ensure_succeeded(operation: Operation) -> Result<Operation> {
    if operation.status.is_success() {
        Ok(operation)
    } else {
        Err(Error::OperationFailed {
            operation_id: operation.id,
            status: operation.status,
            message: operation.message().map(str::to_string),
        })
    }
}
