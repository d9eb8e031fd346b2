//! Desired-state manifest (`azdo.toml`).

use anyhow::{Context, Result, bail};
use azdokit::Project;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// The set of projects that should exist.
#[derive(Debug, Default)]
pub struct Manifest {
    pub projects: Vec<Project>,
    /// Current name -> name the project was last applied under
    pub previous_names: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default, rename = "project")]
    projects: Vec<RawProject>,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    /// Set when renaming, so the existing project is updated rather than replaced
    #[serde(default)]
    previous_name: Option<String>,
    #[serde(flatten)]
    project: Project,
}

impl Manifest {
    /// Load and validate a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    /// Parse and validate manifest content
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content)?;
        let mut manifest = Self::default();

        for entry in raw.projects {
            let mut project = entry.project;
            project.name = project.name.trim().to_string();
            if let Some(previous) = entry.previous_name {
                let previous = previous.trim();
                if previous.is_empty() {
                    bail!("project {}: previous_name cannot be empty", project.name);
                }
                if previous != project.name {
                    manifest
                        .previous_names
                        .insert(project.name.clone(), previous.to_string());
                }
            }
            manifest.projects.push(project);
        }

        manifest.validate()?;
        Ok(manifest)
    }

    /// Name a project was previously applied under, when it is being renamed
    pub fn previous_name(&self, name: &str) -> Option<&str> {
        self.previous_names.get(name).map(String::as_str)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for project in &self.projects {
            let name = project.name.trim();
            if name.is_empty() {
                bail!("project name cannot be empty");
            }
            if project.id.is_some() || project.process_template_id.is_some() {
                bail!("project {name}: id and process_template_id are assigned by Azure DevOps");
            }
            if !seen.insert(name.to_lowercase()) {
                bail!("project {name} is declared more than once");
            }
        }

        for (name, previous) in &self.previous_names {
            if seen.contains(&previous.to_lowercase()) {
                bail!("project {name}: previous_name {previous} is still declared in the manifest");
            }
        }
        Ok(())
    }
}
