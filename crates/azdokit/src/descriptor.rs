//! Mapping declarative records to wire-level projects.
//!
//! Create sends every field plus the capabilities map. Update sends only
//! the mutable fields that changed and never sends capabilities; a `None`
//! field is left out of the body and so left untouched remotely.

use crate::error::Result;
use crate::templates::TemplateResolver;
use crate::types::{Capabilities, Project, TeamProject};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Capability group for version control.
pub const VERSION_CONTROL_GROUP: &str = "versioncontrol";
/// Key of the source control type inside [`VERSION_CONTROL_GROUP`].
pub const SOURCE_CONTROL_TYPE: &str = "sourceControlType";
/// Capability group for the process template.
pub const PROCESS_TEMPLATE_GROUP: &str = "processTemplate";
/// Key of the template id inside [`PROCESS_TEMPLATE_GROUP`].
pub const TEMPLATE_TYPE_ID: &str = "templateTypeId";

/// Full descriptor for a create, resolving the template name first.
pub fn build_create(resolver: &TemplateResolver<'_>, project: &Project) -> Result<TeamProject> {
    let template_id = resolver.resolve_id_by_name(&project.work_item_template)?;
    Ok(for_create(project, template_id))
}

/// Full descriptor for a create with an already resolved template id.
#[must_use]
pub fn for_create(project: &Project, template_id: Uuid) -> TeamProject {
    let mut capabilities = Capabilities::new();
    capabilities.insert(
        VERSION_CONTROL_GROUP.to_string(),
        BTreeMap::from([(
            SOURCE_CONTROL_TYPE.to_string(),
            project.version_control.as_str().to_string(),
        )]),
    );
    capabilities.insert(
        PROCESS_TEMPLATE_GROUP.to_string(),
        BTreeMap::from([(TEMPLATE_TYPE_ID.to_string(), template_id.to_string())]),
    );

    TeamProject {
        id: None,
        name: Some(project.name.clone()),
        description: Some(project.description.clone().unwrap_or_default()),
        visibility: Some(project.visibility),
        capabilities: Some(capabilities),
        ..Default::default()
    }
}

/// Names of the mutable fields that differ between `prior` and `desired`.
#[must_use]
pub fn changed_fields(prior: &Project, desired: &Project) -> Vec<&'static str> {
    diff(prior, desired).0
}

/// Patch descriptor for an update, or `None` when nothing mutable changed.
///
/// A description removed from the desired record is sent as an empty
/// string, which clears it; an unchanged description is not sent at all.
#[must_use]
pub fn for_update(prior: &Project, desired: &Project) -> Option<TeamProject> {
    let (fields, patch) = diff(prior, desired);
    (!fields.is_empty()).then_some(patch)
}

fn diff(prior: &Project, desired: &Project) -> (Vec<&'static str>, TeamProject) {
    let mut fields = Vec::new();
    let mut patch = TeamProject::default();

    if prior.name != desired.name {
        fields.push("name");
        patch.name = Some(desired.name.clone());
    }

    let description = desired.description.as_deref().unwrap_or_default();
    if prior.description.as_deref().unwrap_or_default() != description {
        fields.push("description");
        patch.description = Some(description.to_string());
    }

    if prior.visibility != desired.visibility {
        fields.push("visibility");
        patch.visibility = Some(desired.visibility);
    }

    (fields, patch)
}
