//! Configuration management for Waymark.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

static ISSUE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").unwrap());

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Planning document layout
    pub workflow: WorkflowConfig,

    /// Verification session settings
    pub verify: VerifyConfig,
}

/// Where the planning documents live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Planning directory, relative to the project root
    pub planning_dir: String,

    /// Directory holding one sub-directory per phase
    pub phases_dir: String,

    /// File recording the id of an interrupted agent run
    pub agent_id_file: String,
}

/// Verification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Prefix for recorded issue ids (`UAT-001`)
    pub issue_prefix: String,

    /// Override for where sessions are stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.waymark.toml` in current directory
    /// 2. `~/.config/waymark/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(".waymark.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = ?path, "Loaded configuration");
        Ok(config)
    }

    /// Reject values the ledger format cannot carry.
    pub fn validate(&self) -> anyhow::Result<()> {
        let prefix = &self.verify.issue_prefix;
        if !ISSUE_PREFIX.is_match(prefix) || prefix.ends_with('-') {
            anyhow::bail!(
                "Invalid issue_prefix '{prefix}': use letters, digits, '_' or '-', starting with a letter"
            );
        }
        Ok(())
    }

    /// Save configuration to the global config file.
    pub fn save(&self) -> anyhow::Result<()> {
        let config_dir = Self::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        std::fs::create_dir_all(&config_dir)?;

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_dir.join("config.toml"), content)?;

        Ok(())
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("waymark"))
    }

    /// Get the data directory path (for sessions).
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("waymark"))
    }

    /// Directory for persisted verification sessions.
    ///
    /// Uses the configured override. Otherwise sessions live in a
    /// per-project directory under the data directory, falling back to
    /// `<planning dir>/.sessions` under `root`.
    pub fn sessions_dir(&self, root: &Path) -> PathBuf {
        if let Some(dir) = &self.verify.sessions_dir {
            return dir.clone();
        }
        match Self::data_dir() {
            Some(data) => data.join("sessions").join(project_slug(root)),
            None => root.join(&self.workflow.planning_dir).join(".sessions"),
        }
    }
}

/// `<dir name>-<hash of canonical root>`, stable for one project checkout.
fn project_slug(root: &Path) -> String {
    let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let name: String = root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("project")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(root.to_string_lossy().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{name}-{}", &digest[..12])
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            planning_dir: ".planning".to_string(),
            phases_dir: "phases".to_string(),
            agent_id_file: "current-agent-id.txt".to_string(),
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self { issue_prefix: "UAT".to_string(), sessions_dir: None }
    }
}
