//! Configuration loading and root folder resolution

use crate::answer::AnswerPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "HUNT_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "hunt.db";

/// Configuration file name inside the root folder
pub const CONFIG_FILE: &str = "hunt.toml";

/// Default budget for waiting out SQLite lock contention
pub const DEFAULT_LOCK_WAIT_MS: u64 = 5000;

/// Tunables for the coordination core
///
/// Every field has a default, so a missing or partial `hunt.toml` is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuntConfig {
    /// Maximum members per team
    pub max_participants: u32,
    /// Length of generated team codes
    pub code_length: usize,
    /// Regeneration attempts when a team code collides
    pub max_code_attempts: u32,
    /// How submitted answers are normalized before hashing
    pub answer_policy: AnswerPolicy,
    /// E-mail addresses allowed to run administrative operations
    pub admin_emails: Vec<String>,
    /// Upper bound on time spent retrying a transaction under lock contention
    pub max_lock_wait_ms: u64,
    /// Directory holding question batch files for republish
    pub feed_dir: Option<PathBuf>,
}

impl Default for HuntConfig {
    fn default() -> Self {
        Self {
            max_participants: 4,
            code_length: 6,
            max_code_attempts: 8,
            answer_policy: AnswerPolicy::CaseInsensitive,
            admin_emails: Vec::new(),
            max_lock_wait_ms: DEFAULT_LOCK_WAIT_MS,
            feed_dir: None,
        }
    }
}

impl HuntConfig {
    /// Load `hunt.toml` from the root folder, falling back to defaults when absent
    pub fn load(root_folder: &Path) -> Result<Self> {
        let path = root_folder.join(CONFIG_FILE);
        if !path.exists() {
            tracing::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid hunt.toml: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_participants == 0 {
            return Err(Error::Config("max_participants must be at least 1".to_string()));
        }
        if self.code_length < 4 {
            return Err(Error::Config(format!(
                "code_length {} is too short (minimum 4)",
                self.code_length
            )));
        }
        if self.max_code_attempts == 0 {
            return Err(Error::Config("max_code_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Feed directory, defaulting to `<root>/questions`
    pub fn feed_dir(&self, root_folder: &Path) -> PathBuf {
        self.feed_dir
            .clone()
            .unwrap_or_else(|| root_folder.join("questions"))
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email.trim()))
    }
}

/// Pick the folder that holds `hunt.db` and `hunt.toml`
///
/// First match wins: `--root-folder`, then `env_var_name`, then the
/// `root_folder` key of the user or system `config.toml`, then the platform
/// data directory.
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    match std::env::var(env_var_name) {
        Ok(path) if !path.is_empty() => return PathBuf::from(path),
        _ => {}
    }

    if let Some(path) = root_folder_from_config_file() {
        return path;
    }

    default_root_folder()
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

fn root_folder_from_config_file() -> Option<PathBuf> {
    let path = locate_config_file().ok()?;
    let content = std::fs::read_to_string(&path).ok()?;
    let value = toml::from_str::<toml::Value>(&content).ok()?;
    let root = value.get("root_folder")?.as_str()?;
    tracing::debug!("root_folder taken from {}", path.display());
    Some(PathBuf::from(root))
}

/// First existing machine-level config file
///
/// On Linux a per-user file shadows `/etc/hunt/config.toml`; elsewhere only
/// the per-user location is consulted.
fn locate_config_file() -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = dirs::config_dir()
        .map(|d| d.join("hunt").join("config.toml"))
        .into_iter()
        .collect();
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc/hunt/config.toml"));
    }

    candidates
        .into_iter()
        .find(|path| path.exists())
        .ok_or_else(|| Error::Config("no machine-level hunt config.toml found".to_string()))
}

fn default_root_folder() -> PathBuf {
    let (base, fallback) = if cfg!(target_os = "macos") {
        (dirs::data_dir(), "/Library/Application Support/hunt")
    } else if cfg!(target_os = "windows") {
        (dirs::data_local_dir(), "C:\\ProgramData\\hunt")
    } else {
        (dirs::data_local_dir(), "/var/lib/hunt")
    };

    base.map(|d| d.join("hunt"))
        .unwrap_or_else(|| PathBuf::from(fallback))
}
