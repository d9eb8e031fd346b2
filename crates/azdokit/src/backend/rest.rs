//! Azure DevOps REST backend.
//!
//! This module provides [`RestBackend`], a blocking HTTP implementation of
//! [`Backend`] against the Azure DevOps REST API (version 6.0), authenticated
//! with a personal access token.
//!
//! # Authentication
//!
//! Requests carry HTTP Basic credentials with an empty user name and the
//! personal access token as the password, which is what Azure DevOps
//! expects for PATs.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{Operation, OperationReference, Process, ProjectReference, TeamProject};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

/// REST API version sent with every request.
pub const API_VERSION: &str = "6.0";

/// Upper bound for a single HTTP exchange.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Validated connection settings.
///
/// Construction fails fast when the organization URL or the access token
/// is missing, so a misconfigured client never reaches the network.
///
/// # Example
///
/// ```
/// use azdokit::ConnectionConfig;
///
/// let config = ConnectionConfig::new("https://dev.azure.com/acme/", "secret").unwrap();
/// assert_eq!(config.organization_url(), "https://dev.azure.com/acme");
///
/// assert!(ConnectionConfig::new("https://dev.azure.com/acme", "  ").is_err());
/// assert!(ConnectionConfig::new("", "secret").is_err());
/// ```
#[derive(Clone)]
pub struct ConnectionConfig {
    organization_url: String,
    personal_access_token: String,
}

impl ConnectionConfig {
    /// Validate and build connection settings.
    pub fn new(organization_url: &str, personal_access_token: &str) -> Result<Self> {
        let personal_access_token = personal_access_token.trim();
        if personal_access_token.is_empty() {
            return Err(Error::InvalidConfig(
                "the personal access token is required".to_string(),
            ));
        }

        let organization_url = organization_url.trim().trim_end_matches('/');
        if organization_url.is_empty() {
            return Err(Error::InvalidConfig(
                "the url of the Azure DevOps organization is required".to_string(),
            ));
        }
        if !(organization_url.starts_with("https://") || organization_url.starts_with("http://"))
        {
            return Err(Error::InvalidConfig(format!(
                "the organization url must start with https:// (got {organization_url:?})"
            )));
        }

        Ok(Self {
            organization_url: organization_url.to_string(),
            personal_access_token: personal_access_token.to_string(),
        })
    }

    /// Organization URL without a trailing slash.
    #[must_use]
    pub fn organization_url(&self) -> &str {
        &self.organization_url
    }

    fn authorization(&self) -> String {
        let credentials = format!(":{}", self.personal_access_token);
        format!("Basic {}", STANDARD.encode(credentials))
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("organization_url", &self.organization_url)
            .field("personal_access_token", &"***")
            .finish()
    }
}

/// Blocking REST backend.
///
/// One agent is shared by all calls; the backend is `Send + Sync` and can
/// serve several reconciliations at once.
///
/// # Example
///
/// ```no_run
/// use azdokit::backend::rest::RestBackend;
/// use azdokit::backend::Backend;
/// use azdokit::ConnectionConfig;
///
/// let config = ConnectionConfig::new("https://dev.azure.com/acme", "token").unwrap();
/// let backend = RestBackend::new(&config);
/// for process in backend.get_processes().unwrap() {
///     println!("{} {}", process.id, process.name);
/// }
/// ```
pub struct RestBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Organization URL.
    base: String,
    /// Precomputed `Authorization` header value.
    authorization: String,
}

impl RestBackend {
    /// Create a backend for a validated connection.
    #[must_use]
    pub fn new(config: &ConnectionConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();
        Self {
            agent,
            base: config.organization_url().to_string(),
            authorization: config.authorization(),
        }
    }

    /// Get the organization URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn projects_url(&self) -> String {
        format!("{}/_apis/projects", self.base)
    }

    fn project_url(&self, id_or_name: &str) -> String {
        format!(
            "{}/_apis/projects/{}",
            self.base,
            urlencoding::encode(id_or_name)
        )
    }

    fn operation_url(&self, operation_id: Uuid) -> String {
        format!("{}/_apis/operations/{}", self.base, operation_id)
    }

    fn processes_url(&self) -> String {
        format!("{}/_apis/process/processes", self.base)
    }

    fn process_url(&self, id: Uuid) -> String {
        format!("{}/_apis/process/processes/{}", self.base, id)
    }

    fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> std::result::Result<T, ureq::Error> {
        log::debug!("GET {url}");
        let mut request = self
            .agent
            .get(url)
            .header("Authorization", self.authorization.as_str())
            .header("Accept", "application/json")
            .query("api-version", API_VERSION);
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        request.call()?.body_mut().read_json()
    }
}

/// Map a failed call, turning HTTP 404 into [`Error::NotFound`].
fn not_found_or<T>(
    result: std::result::Result<T, ureq::Error>,
    what: &'static str,
    key: &str,
) -> Result<T> {
    result.map_err(|err| match err {
        ureq::Error::StatusCode(404) => Error::NotFound {
            what,
            key: key.to_string(),
            source: Some(Box::new(Error::http("HTTP 404", Some(404)))),
        },
        other => other.into(),
    })
}

impl Backend for RestBackend {
    fn create_project(&self, project: &TeamProject) -> Result<OperationReference> {
        let url = self.projects_url();
        log::debug!("POST {url}");

        let reference: OperationReference = self
            .agent
            .post(&url)
            .header("Authorization", self.authorization.as_str())
            .header("Accept", "application/json")
            .query("api-version", API_VERSION)
            .send_json(project)?
            .body_mut()
            .read_json()?;

        Ok(reference)
    }

    fn get_project(
        &self,
        id_or_name: &str,
        include_capabilities: bool,
        include_history: bool,
    ) -> Result<TeamProject> {
        let capabilities = include_capabilities.to_string();
        let history = include_history.to_string();
        not_found_or(
            self.get(
                &self.project_url(id_or_name),
                &[
                    ("includeCapabilities", capabilities.as_str()),
                    ("includeHistory", history.as_str()),
                ],
            ),
            "project",
            id_or_name,
        )
    }

    fn list_projects(&self) -> Result<Vec<ProjectReference>> {
        let response: ListResponse<ProjectReference> = self.get(&self.projects_url(), &[])?;
        Ok(response.value)
    }

    fn update_project(&self, id: Uuid, project: &TeamProject) -> Result<OperationReference> {
        let url = self.project_url(&id.to_string());
        log::debug!("PATCH {url}");

        let result = self
            .agent
            .patch(&url)
            .header("Authorization", self.authorization.as_str())
            .header("Accept", "application/json")
            .query("api-version", API_VERSION)
            .send_json(project)
            .and_then(|mut response| response.body_mut().read_json());

        not_found_or(result, "project", &id.to_string())
    }

    fn delete_project(&self, id: Uuid) -> Result<OperationReference> {
        let url = self.project_url(&id.to_string());
        log::debug!("DELETE {url}");

        let result = self
            .agent
            .delete(&url)
            .header("Authorization", self.authorization.as_str())
            .header("Accept", "application/json")
            .query("api-version", API_VERSION)
            .call()
            .and_then(|mut response| response.body_mut().read_json());

        not_found_or(result, "project", &id.to_string())
    }

    fn get_operation(&self, operation_id: Uuid, plugin_id: Option<Uuid>) -> Result<Operation> {
        let plugin = plugin_id.map(|id| id.to_string());
        let query: Vec<(&str, &str)> = plugin
            .as_deref()
            .map(|plugin| vec![("pluginId", plugin)])
            .unwrap_or_default();

        not_found_or(
            self.get(&self.operation_url(operation_id), &query),
            "operation",
            &operation_id.to_string(),
        )
    }

    fn get_processes(&self) -> Result<Vec<Process>> {
        let response: ListResponse<Process> = self.get(&self.processes_url(), &[])?;
        Ok(response.value)
    }

    fn get_process_by_id(&self, id: Uuid) -> Result<Process> {
        not_found_or(
            self.get(&self.process_url(id), &[]),
            "process template",
            &id.to_string(),
        )
    }
}

// =============================================================================
// Azure DevOps API response types
// =============================================================================

/// Collection envelope used by list endpoints.
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> RestBackend {
        let config = ConnectionConfig::new("https://dev.azure.com/acme/", "pat").unwrap();
        RestBackend::new(&config)
    }

    #[test]
    fn test_connection_config_requires_token() {
        let err = ConnectionConfig::new("https://dev.azure.com/acme", "").unwrap_err();
        assert!(err.to_string().contains("personal access token"));
    }

    #[test]
    fn test_connection_config_requires_url() {
        let err = ConnectionConfig::new("   ", "pat").unwrap_err();
        assert!(err.to_string().contains("url"));
        assert!(ConnectionConfig::new("dev.azure.com/acme", "pat").is_err());
    }

    #[test]
    fn test_connection_config_debug_masks_token() {
        let config = ConnectionConfig::new("https://dev.azure.com/acme", "topsecret").unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("topsecret"));
        assert!(debug.contains("dev.azure.com/acme"));
    }

    #[test]
    fn test_authorization_header() {
        let config = ConnectionConfig::new("https://dev.azure.com/acme", "pat").unwrap();
        // base64(":pat")
        assert_eq!(config.authorization(), "Basic OnBhdA==");
    }

    #[test]
    fn test_urls() {
        let backend = backend();
        assert_eq!(backend.base_url(), "https://dev.azure.com/acme");
        assert_eq!(
            backend.projects_url(),
            "https://dev.azure.com/acme/_apis/projects"
        );
        assert_eq!(
            backend.processes_url(),
            "https://dev.azure.com/acme/_apis/process/processes"
        );
        assert_eq!(
            backend.operation_url(Uuid::nil()),
            "https://dev.azure.com/acme/_apis/operations/00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_project_url_encodes_names() {
        let backend = backend();
        assert_eq!(
            backend.project_url("My Project"),
            "https://dev.azure.com/acme/_apis/projects/My%20Project"
        );
    }

    #[test]
    fn test_list_response_envelope() {
        let json = r#"{
            "count": 1,
            "value": [{ "id": "adcc42ab-9882-485e-a3ed-7678f01f66bc", "name": "Agile", "isDefault": true }]
        }"#;
        let response: ListResponse<Process> = serde_json::from_str(json).unwrap();
        assert_eq!(response.value.len(), 1);
        assert!(response.value[0].is_default);
    }

    #[test]
    fn test_not_found_mapping() {
        let result: std::result::Result<(), ureq::Error> = Err(ureq::Error::StatusCode(404));
        let err = not_found_or(result, "project", "Proj1").unwrap_err();
        assert!(matches!(err, Error::NotFound { what: "project", .. }));

        let result: std::result::Result<(), ureq::Error> = Err(ureq::Error::StatusCode(401));
        let err = not_found_or(result, "project", "Proj1").unwrap_err();
        assert!(matches!(err, Error::HttpError { status: Some(401), .. }));
    }
}
