//! # azdokit
//!
//! Pure Rust library for declarative Azure DevOps project management.
//!
//! This crate provides functionality for:
//! - Creating, reading, updating and deleting team projects from a
//!   declarative [`Project`] record
//! - Waiting on the asynchronous operations Azure DevOps returns for
//!   project create, update and delete
//! - Resolving process templates ("Agile", "Scrum", ...) by name and id
//!
//! ## Example
//!
//! ```no_run
//! use azdokit::{Client, ConnectionConfig, Project, Visibility};
//!
//! let config = ConnectionConfig::new("https://dev.azure.com/acme", "my-pat")
//!     .expect("invalid connection settings");
//! let client = Client::connect(&config);
//!
//! let mut project = Project::new("Proj1")
//!     .description("Demo project")
//!     .visibility(Visibility::Private);
//!
//! client.reconciler().create(&mut project).expect("create failed");
//! println!("Created {} with id {:?}", project.name, project.id);
//! ```
//!
//! ## Operation Polling
//!
//! Mutating calls return an operation handle at once. The
//! [`poller::Poller`] waits `min_timeout` before its first status query,
//! then queries every `poll_interval` until the status is terminal or the
//! timeout is spent:
//!
//! | Operation | First query | Interval | Timeout |
//! |-----------|-------------|----------|---------|
//! | create    | 5s          | 10s      | 10 min  |
//! | update    | 10s         | 10s      | 10 min  |
//! | delete    | not awaited unless `await_delete` is set | | |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod clock;
pub mod descriptor;
pub mod error;
pub mod poller;
pub mod reconciler;
pub mod templates;
pub mod types;

pub use backend::MockBackend;
pub use backend::rest::ConnectionConfig;
pub use error::{Error, ErrorCategory, Result};
pub use types::{
    DeleteOutcome, MIN_POLL_INTERVAL, Operation, OperationReference, OperationStatus, PollConfig, Process, Project,
    ProjectReference, ReconcileOptions, TeamProject, UpdateOutcome, VersionControl, Visibility,
};

use backend::Backend;
use backend::rest::RestBackend;
use clock::{Clock, SystemClock};
use poller::{LogCallback, PollCallback};
use reconciler::Reconciler;
use templates::TemplateResolver;

/// High-level client for project operations.
///
/// The client owns the backend and the clock; reconcilers borrow them.
/// It is `Send + Sync`, so one client can serve reconciliations running on
/// several threads.
///
/// # Example
///
/// ```
/// use azdokit::{Client, MockBackend};
///
/// let client = Client::with_backend(Box::new(MockBackend::with_default_processes()));
/// let names: Vec<String> = client.processes().unwrap().into_iter().map(|p| p.name).collect();
/// assert_eq!(names, ["Agile", "Scrum", "CMMI", "Basic"]);
/// ```
pub struct Client {
    backend: Box<dyn Backend>,
    clock: Box<dyn Clock>,
    options: ReconcileOptions,
}

impl Client {
    /// Create a client talking to the organization in `config`.
    #[must_use]
    pub fn connect(config: &ConnectionConfig) -> Self {
        log::debug!("Connecting to {}", config.organization_url());
        Self::with_backend(Box::new(RestBackend::new(config)))
    }

    /// Create a client with a custom backend (useful for testing).
    #[must_use]
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            clock: Box::new(SystemClock),
            options: ReconcileOptions::default(),
        }
    }

    /// Replace the clock used while polling.
    #[must_use]
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the reconcile options.
    #[must_use]
    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Options handed to every reconciler.
    #[must_use]
    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// The underlying backend.
    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Reconciler that logs polling progress.
    #[must_use]
    pub fn reconciler(&self) -> Reconciler<'_> {
        self.reconciler_with(&LogCallback)
    }

    /// Reconciler that reports polling progress to `callback`.
    #[must_use]
    pub fn reconciler_with<'a>(&'a self, callback: &'a dyn PollCallback) -> Reconciler<'a> {
        Reconciler::new(self.backend.as_ref(), self.clock.as_ref())
            .with_callback(callback)
            .with_options(self.options)
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// List every project in the organization.
    pub fn list_projects(&self) -> Result<Vec<ProjectReference>> {
        self.backend
            .list_projects()
            .map_err(|err| err.context("listing projects", "in organization"))
    }

    /// List the process templates available in the organization.
    pub fn processes(&self) -> Result<Vec<Process>> {
        TemplateResolver::new(self.backend.as_ref())
            .list()
            .map_err(|err| err.context("listing process templates", "in organization"))
    }
}
