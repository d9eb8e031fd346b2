use anyhow::{Context, Result};
use azdokit::Project;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// State Structures
// ============================================================================

/// Observed state of every project azdo manages, keyed by project name
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AzdoState {
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectState>,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,
}

/// Last record read back for one project
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProjectState {
    /// Last time apply confirmed this record
    pub last_applied: DateTime<Utc>,

    pub record: Project,
}

// ============================================================================
// AzdoState Implementation
// ============================================================================

impl AzdoState {
    /// Get the state directory path (~/.local/state/azdo)
    pub fn state_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".local").join("state").join("azdo"))
    }

    /// Get the state file path
    pub fn state_file() -> Result<PathBuf> {
        Ok(Self::state_dir()?.join("state.toml"))
    }

    /// Load state from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::state_file()?)
    }

    /// Load state from disk, or return default if file doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to the default location
    pub fn save(&mut self) -> Result<()> {
        self.save_to(&Self::state_file()?)
    }

    /// Update the timestamp and save state to disk
    pub fn save_to(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        self.last_updated = Utc::now();
        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    // ========================================================================
    // Project State Helpers
    // ========================================================================

    /// Recorded state of a project
    pub fn record(&self, name: &str) -> Option<&Project> {
        self.projects.get(name).map(|state| &state.record)
    }

    /// Record a project under `name` (the manifest name it was applied for)
    pub fn upsert(&mut self, name: &str, record: Project) {
        self.projects.insert(
            name.to_string(),
            ProjectState {
                last_applied: Utc::now(),
                record,
            },
        );
    }

    /// Forget a project
    pub fn remove(&mut self, name: &str) -> Option<Project> {
        self.projects.remove(name).map(|state| state.record)
    }
}

impl Default for AzdoState {
    fn default() -> Self {
        Self {
            projects: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
