//! Process template lookups.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::Process;
use uuid::Uuid;

/// Resolves process templates against the organization catalog.
///
/// Nothing is cached: every lookup asks the backend.
pub struct TemplateResolver<'a> {
    backend: &'a dyn Backend,
}

impl<'a> TemplateResolver<'a> {
    /// Create a resolver.
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// List the catalog.
    pub fn list(&self) -> Result<Vec<Process>> {
        self.backend.get_processes()
    }

    /// Id of the first template whose name matches exactly (case-sensitive).
    ///
    /// # Errors
    ///
    /// `NotFound` when no template has that name, or the catalog error.
    pub fn resolve_id_by_name(&self, name: &str) -> Result<Uuid> {
        self.backend
            .get_processes()?
            .into_iter()
            .find(|process| process.name == name)
            .map(|process| process.id)
            .ok_or_else(|| Error::not_found("process template", name))
    }

    /// Display name of a template id.
    ///
    /// # Errors
    ///
    /// `InvalidId` when `id` is not a GUID; `NotFound` wrapping the remote
    /// error when the lookup fails.
    pub fn resolve_name_by_id(&self, id: &str) -> Result<String> {
        let parsed = Uuid::parse_str(id).map_err(|_| Error::InvalidId {
            kind: "process template",
            value: id.to_string(),
        })?;

        self.backend
            .get_process_by_id(parsed)
            .map(|process| process.name)
            .map_err(|err| Error::NotFound {
                what: "process template",
                key: id.to_string(),
                source: Some(Box::new(err)),
            })
    }
}
