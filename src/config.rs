use anyhow::{Context, Result, bail};
use azdokit::{ConnectionConfig, MIN_POLL_INTERVAL, PollConfig, ReconcileOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path (~/.config/azdo)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("azdo"))
}

/// Get the default config file path
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Expand `~` in a user-supplied path
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

// ============================================================================
// Config File
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AzdoConfig {
    #[serde(default)]
    pub org_service_url: Option<String>,
    #[serde(default)]
    pub personal_access_token: Option<String>,
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_timeout")]
    pub create_timeout_secs: u64,
    #[serde(default = "default_timeout")]
    pub update_timeout_secs: u64,
    #[serde(default = "default_timeout")]
    pub delete_timeout_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub await_delete: bool,
}

fn default_timeout() -> u64 {
    600
}

fn default_poll_interval() -> u64 {
    10
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            create_timeout_secs: default_timeout(),
            update_timeout_secs: default_timeout(),
            delete_timeout_secs: default_timeout(),
            poll_interval_secs: default_poll_interval(),
            await_delete: false,
        }
    }
}

/// Longest operation timeout the config accepts (one day)
const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

impl PollingConfig {
    /// Reject timeouts and intervals the poller cannot honor
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("create_timeout_secs", self.create_timeout_secs),
            ("update_timeout_secs", self.update_timeout_secs),
            ("delete_timeout_secs", self.delete_timeout_secs),
        ];
        for (key, secs) in timeouts {
            if secs == 0 || secs > MAX_TIMEOUT_SECS {
                bail!("polling.{key} must be between 1 and {MAX_TIMEOUT_SECS}, got {secs}");
            }
        }

        let min_interval = MIN_POLL_INTERVAL.as_secs();
        if self.poll_interval_secs < min_interval || self.poll_interval_secs > MAX_TIMEOUT_SECS {
            bail!(
                "polling.poll_interval_secs must be between {min_interval} and {MAX_TIMEOUT_SECS}, got {}",
                self.poll_interval_secs
            );
        }
        Ok(())
    }

    /// Reconcile options with these timeouts applied over the defaults
    pub fn reconcile_options(&self) -> Result<ReconcileOptions> {
        self.validate()?;

        let interval = Duration::from_secs(self.poll_interval_secs);
        let cadence = |base: PollConfig, timeout: u64| {
            base.poll_interval(interval)
                .timeout(Duration::from_secs(timeout))
        };

        Ok(ReconcileOptions {
            create: cadence(PollConfig::create(), self.create_timeout_secs),
            update: cadence(PollConfig::update(), self.update_timeout_secs),
            delete: cadence(PollConfig::delete(), self.delete_timeout_secs),
            await_delete: self.await_delete,
        })
    }
}

impl AzdoConfig {
    /// Resolve the config file path, honoring an explicit `--config`
    pub fn path(explicit: Option<&Path>) -> Result<PathBuf> {
        match explicit {
            Some(path) => Ok(expand_path(path)),
            None => default_config_path(),
        }
    }

    /// Load the config file; a missing default file yields an empty config
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = Self::path(explicit)?;

        if !path.exists() {
            if explicit.is_some() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            log::debug!("Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        config
            .polling
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Organization URL: the flag/env value wins over the file
    pub fn org_url<'a>(&'a self, cli: Option<&'a str>) -> Option<&'a str> {
        cli.or(self.org_service_url.as_deref())
    }

    /// Access token: the flag/env value wins over the file
    pub fn token<'a>(&'a self, cli: Option<&'a str>) -> Option<&'a str> {
        cli.or(self.personal_access_token.as_deref())
    }

    /// Validated connection settings
    pub fn connection(&self, org_url: Option<&str>, token: Option<&str>) -> Result<ConnectionConfig> {
        let org_url = self.org_url(org_url).unwrap_or_default();
        let token = self.token(token).unwrap_or_default();
        ConnectionConfig::new(org_url, token).context(
            "Set --org-url/--token, AZDO_ORG_SERVICE_URL/AZDO_PERSONAL_ACCESS_TOKEN, or the config file",
        )
    }
}
