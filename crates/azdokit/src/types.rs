//! Core types for Azure DevOps project management.
//!
//! This module holds both the declarative [`Project`] record callers work
//! with and the wire-level shapes exchanged with the REST API
//! ([`TeamProject`], [`OperationReference`], [`Operation`], [`Process`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Error;

/// Status of a server-side asynchronous operation.
///
/// `NotSet`, `Queued` and `InProgress` are pending; `Cancelled`, `Failed`
/// and `Succeeded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationStatus {
    /// The operation object has no status yet.
    NotSet,
    /// Accepted, waiting for a job agent.
    Queued,
    /// Running.
    InProgress,
    /// Cancelled before completion.
    Cancelled,
    /// Finished with an error.
    Failed,
    /// Finished successfully.
    Succeeded,
}

impl OperationStatus {
    /// Statuses that mean the job is still queued or running.
    pub const PENDING: [OperationStatus; 3] = [Self::NotSet, Self::Queued, Self::InProgress];

    /// Statuses from which no further transition happens.
    pub const TERMINAL: [OperationStatus; 3] = [Self::Failed, Self::Succeeded, Self::Cancelled];

    /// Wire name of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSet => "notSet",
            Self::Queued => "queued",
            Self::InProgress => "inProgress",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Succeeded => "succeeded",
        }
    }

    /// Whether this is one of the terminal statuses.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    /// Whether the job finished successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Handle returned by every asynchronous mutating call.
///
/// It carries no state of its own; pass it to the poller to query status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationReference {
    /// Operation identifier.
    pub id: Uuid,
    /// Plugin (subsystem) that owns the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_id: Option<Uuid>,
    /// Status at the time the reference was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OperationStatus>,
    /// REST location of the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl OperationReference {
    /// Create a reference with just an id and plugin id.
    #[must_use]
    pub fn new(id: Uuid, plugin_id: Option<Uuid>) -> Self {
        Self {
            id,
            plugin_id,
            status: None,
            url: None,
        }
    }
}

/// Current state of an operation as reported by the operations endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Operation identifier.
    pub id: Uuid,
    /// Plugin (subsystem) that owns the operation.
    #[serde(default)]
    pub plugin_id: Option<Uuid>,
    /// Current status.
    pub status: OperationStatus,
    /// Progress or failure detail.
    #[serde(default)]
    pub detailed_message: Option<String>,
    /// Final result text.
    #[serde(default)]
    pub result_message: Option<String>,
}

impl Operation {
    /// Build an operation document for a reference with the given status.
    #[must_use]
    pub fn new(reference: &OperationReference, status: OperationStatus) -> Self {
        Self {
            id: reference.id,
            plugin_id: reference.plugin_id,
            status,
            detailed_message: None,
            result_message: None,
        }
    }

    /// The most useful message the server gave for this operation.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.detailed_message
            .as_deref()
            .or(self.result_message.as_deref())
    }
}

/// Project visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible to organization members with access.
    #[default]
    Private,
    /// Visible to anyone.
    Public,
}

impl Visibility {
    /// Wire name of the visibility.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "public" => Ok(Self::Public),
            other => Err(Error::InvalidResponse(format!("unknown visibility {other:?}"))),
        }
    }
}

/// Version control system of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VersionControl {
    /// Git repositories.
    #[default]
    Git,
    /// Team Foundation Version Control.
    Tfvc,
}

impl VersionControl {
    /// Wire name used in the `versioncontrol` capability.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Git => "Git",
            Self::Tfvc => "Tfvc",
        }
    }
}

impl fmt::Display for VersionControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VersionControl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "git" => Ok(Self::Git),
            "tfvc" => Ok(Self::Tfvc),
            other => Err(Error::InvalidResponse(format!(
                "unknown version control type {other:?}"
            ))),
        }
    }
}

/// A process template from the organization catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    /// Template identifier.
    pub id: Uuid,
    /// Display name, e.g. "Agile".
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether new projects get this template when none is given.
    #[serde(default)]
    pub is_default: bool,
}

impl Process {
    /// Create a process entry.
    #[must_use]
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            is_default: false,
        }
    }
}

/// Capability maps keyed by group, then by setting.
pub type Capabilities = BTreeMap<String, BTreeMap<String, String>>;

/// Wire-level project representation.
///
/// Every field is optional: `None` fields are omitted from the JSON body,
/// which is how an update leaves a field untouched remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamProject {
    /// Project identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Project name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Visibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    /// Version control and process template settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,
    /// Lifecycle state ("wellFormed", "createPending", ...). Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Revision. Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
}

impl TeamProject {
    /// Look up a capability value.
    #[must_use]
    pub fn capability(&self, group: &str, key: &str) -> Option<&str> {
        self.capabilities
            .as_ref()?
            .get(group)?
            .get(key)
            .map(String::as_str)
    }
}

/// Short project entry returned by the project listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReference {
    /// Project identifier.
    pub id: Uuid,
    /// Project name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Lifecycle state.
    #[serde(default)]
    pub state: Option<String>,
    /// Visibility.
    #[serde(default)]
    pub visibility: Option<Visibility>,
}

fn default_template() -> String {
    DEFAULT_WORK_ITEM_TEMPLATE.to_string()
}

/// Process template used when a record names none.
pub const DEFAULT_WORK_ITEM_TEMPLATE: &str = "Agile";

/// Declarative project record.
///
/// Callers fill in the desired fields; the reconciler fills in `id` and
/// `process_template_id` once the remote project exists. `id` stays `None`
/// until a create is confirmed by a read and never changes afterwards.
///
/// # Example
///
/// ```
/// use azdokit::{Project, Visibility, VersionControl};
///
/// let project = Project::new("Proj1")
///     .description("Demo project")
///     .visibility(Visibility::Public);
///
/// assert!(project.id.is_none());
/// assert_eq!(project.version_control, VersionControl::Git);
/// assert_eq!(project.work_item_template, "Agile");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Remote identifier, assigned on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Project name.
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Visibility.
    #[serde(default)]
    pub visibility: Visibility,
    /// Version control type. Fixed at creation.
    #[serde(default)]
    pub version_control: VersionControl,
    /// Process template name. Fixed at creation.
    #[serde(default = "default_template")]
    pub work_item_template: String,
    /// Resolved process template id. Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_template_id: Option<Uuid>,
}

impl Project {
    /// Create a record with defaults for everything but the name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            visibility: Visibility::default(),
            version_control: VersionControl::default(),
            work_item_template: default_template(),
            process_template_id: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the visibility.
    #[must_use]
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the version control type.
    #[must_use]
    pub fn version_control(mut self, version_control: VersionControl) -> Self {
        self.version_control = version_control;
        self
    }

    /// Set the process template name.
    #[must_use]
    pub fn work_item_template(mut self, template: impl Into<String>) -> Self {
        self.work_item_template = template.into();
        self
    }

    /// Identifier used for remote lookups: the id when known, else the name.
    #[must_use]
    pub fn lookup_key(&self) -> String {
        self.id
            .map_or_else(|| self.name.clone(), |id| id.to_string())
    }
}

/// Shortest wait the poller allows between two status queries.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Polling cadence for one kind of operation.
///
/// # Example
///
/// ```
/// use azdokit::PollConfig;
/// use std::time::Duration;
///
/// let config = PollConfig::create().timeout(Duration::from_secs(120));
/// assert_eq!(config.min_timeout, Duration::from_secs(5));
/// assert_eq!(config.timeout, Duration::from_secs(120));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Wait before the first status query.
    pub min_timeout: Duration,
    /// Wait between subsequent queries.
    pub poll_interval: Duration,
    /// Overall budget for the wait.
    pub timeout: Duration,
}

impl PollConfig {
    /// Default cadence for project creation.
    #[must_use]
    pub fn create() -> Self {
        Self {
            min_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(10 * 60),
        }
    }

    /// Default cadence for project updates.
    #[must_use]
    pub fn update() -> Self {
        Self {
            min_timeout: Duration::from_secs(10),
            ..Self::create()
        }
    }

    /// Default cadence for awaited deletes.
    #[must_use]
    pub fn delete() -> Self {
        Self::update()
    }

    /// Set the overall timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the interval between queries, raised to [`MIN_POLL_INTERVAL`]
    /// when shorter.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Set the wait before the first query.
    #[must_use]
    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }
}

/// Options for the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Cadence for create.
    pub create: PollConfig,
    /// Cadence for update.
    pub update: PollConfig,
    /// Cadence for delete, used only when `await_delete` is set.
    pub delete: PollConfig,
    /// Poll the delete operation to a terminal status instead of returning
    /// as soon as the delete is queued.
    pub await_delete: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            create: PollConfig::create(),
            update: PollConfig::update(),
            delete: PollConfig::delete(),
            await_delete: false,
        }
    }
}

/// What an update did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No mutable field changed; nothing was sent.
    Unchanged,
    /// The listed fields were sent and the operation succeeded.
    Updated {
        /// Names of the fields that went on the wire.
        fields: Vec<&'static str>,
        /// Terminal operation document.
        operation: Operation,
    },
}

impl UpdateOutcome {
    /// Check if the update changed anything.
    #[must_use]
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

/// What a delete did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The delete was accepted; completion was not awaited.
    Queued(OperationReference),
    /// The delete operation was polled to success.
    Completed(Operation),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_sets() {
        for status in OperationStatus::PENDING {
            assert!(!status.is_terminal());
        }
        for status in OperationStatus::TERMINAL {
            assert!(status.is_terminal());
        }
        assert!(OperationStatus::Succeeded.is_success());
        assert!(!OperationStatus::Failed.is_success());
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&OperationStatus::InProgress).unwrap();
        assert_eq!(json, "\"inProgress\"");
        let parsed: OperationStatus = serde_json::from_str("\"notSet\"").unwrap();
        assert_eq!(parsed, OperationStatus::NotSet);
        assert_eq!(OperationStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_operation_deserialize() {
        let json = r#"{
            "id": "6f5b9c2e-2f0b-4d0c-9d47-1f7f6a4f0b11",
            "pluginId": "00000000-0000-0000-0000-000000000000",
            "status": "failed",
            "detailedMessage": "Process template not found",
            "url": "https://dev.azure.com/acme/_apis/operations/6f5b9c2e"
        }"#;
        let op: Operation = serde_json::from_str(json).unwrap();
        assert_eq!(op.status, OperationStatus::Failed);
        assert_eq!(op.plugin_id, Some(Uuid::nil()));
        assert_eq!(op.message(), Some("Process template not found"));
    }

    #[test]
    fn test_team_project_omits_absent_fields() {
        let project = TeamProject {
            description: Some(String::new()),
            ..Default::default()
        };
        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json, serde_json::json!({ "description": "" }));
    }

    #[test]
    fn test_team_project_capability() {
        let json = r#"{
            "id": "3d3b2d52-8f43-4f4f-a6d3-8a1b9f3c2a10",
            "name": "Proj1",
            "visibility": "private",
            "state": "wellFormed",
            "revision": 12,
            "capabilities": {
                "versioncontrol": { "sourceControlType": "Git" },
                "processTemplate": { "templateName": "Agile", "templateTypeId": "adcc42ab-9882-485e-a3ed-7678f01f66bc" }
            }
        }"#;
        let project: TeamProject = serde_json::from_str(json).unwrap();
        assert_eq!(project.capability("versioncontrol", "sourceControlType"), Some("Git"));
        assert_eq!(
            project.capability("processTemplate", "templateTypeId"),
            Some("adcc42ab-9882-485e-a3ed-7678f01f66bc")
        );
        assert_eq!(project.capability("processTemplate", "missing"), None);
        assert_eq!(project.visibility, Some(Visibility::Private));
    }

    #[test]
    fn test_poll_interval_has_a_floor() {
        let config = PollConfig::create().poll_interval(Duration::ZERO);
        assert_eq!(config.poll_interval, MIN_POLL_INTERVAL);
        let config = PollConfig::create().poll_interval(Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("Public".parse::<Visibility>().unwrap(), Visibility::Public);
        assert_eq!("git".parse::<VersionControl>().unwrap(), VersionControl::Git);
        assert_eq!("Tfvc".parse::<VersionControl>().unwrap(), VersionControl::Tfvc);
        assert!("svn".parse::<VersionControl>().is_err());
        assert!("internal".parse::<Visibility>().is_err());
    }

    #[test]
    fn test_project_defaults_from_toml_like_input() {
        let project: Project = serde_json::from_str(r#"{ "name": "Proj1" }"#).unwrap();
        assert_eq!(project, Project::new("Proj1"));
        assert_eq!(project.lookup_key(), "Proj1");
    }

    #[test]
    fn test_project_lookup_key_prefers_id() {
        let mut project = Project::new("Proj1");
        let id = Uuid::new_v4();
        project.id = Some(id);
        assert_eq!(project.lookup_key(), id.to_string());
    }

    #[test]
    fn test_poll_config_defaults() {
        let create = PollConfig::create();
        let update = PollConfig::update();
        assert_eq!(create.min_timeout, Duration::from_secs(5));
        assert_eq!(update.min_timeout, Duration::from_secs(10));
        assert_eq!(create.poll_interval, Duration::from_secs(10));
        assert_eq!(update.timeout, Duration::from_secs(600));
        assert!(!ReconcileOptions::default().await_delete);
    }
}
