//! Configuration management for integr.
//!
//! Handles loading configuration from TOML files and applying environment
//! overrides.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable overriding the work directory.
pub const ENV_WORK_DIR: &str = "INTEGR_WORK_DIR";

/// Environment variable overriding the logs root.
pub const ENV_LOGS_ROOT: &str = "INTEGR_LOGS_ROOT";

/// Environment variable toggling dry-run mode.
pub const ENV_DRY_RUN: &str = "INTEGR_DRY_RUN";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory repositories are cloned into and built under
    pub work_dir: PathBuf,

    /// Directory run status files and logs are written under
    pub logs_root: PathBuf,

    /// Describe step effects without performing them
    pub dry_run: bool,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// Looks for config in:
    /// 1. `.integr.toml` in current directory
    /// 2. `~/.config/integr/config.toml`
    /// 3. Falls back to defaults
    ///
    /// `INTEGR_WORK_DIR`, `INTEGR_LOGS_ROOT` and `INTEGR_DRY_RUN` override
    /// whatever the files provide.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_files()?;
        config.apply_env();
        Ok(config)
    }

    fn load_files() -> anyhow::Result<Self> {
        // Try local config first
        let local_config = PathBuf::from(".integr.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        // Try global config
        if let Some(config_dir) = dirs::config_dir() {
            let global_config = config_dir.join("integr").join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        // Return defaults
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `INTEGR_*` environment overrides on top of file values.
    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(ENV_WORK_DIR) {
            if !dir.is_empty() {
                self.work_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var(ENV_LOGS_ROOT) {
            if !dir.is_empty() {
                self.logs_root = PathBuf::from(dir);
            }
        }
        if let Ok(flag) = std::env::var(ENV_DRY_RUN) {
            self.dry_run = truthy(&flag);
        }
    }

    /// Expand `~` and anchor both directories to the current working
    /// directory, so later path resolution never depends on where a step
    /// happens to run.
    pub fn normalize(&mut self) -> std::io::Result<()> {
        self.work_dir = absolutize(&self.work_dir)?;
        self.logs_root = absolutize(&self.logs_root)?;
        Ok(())
    }

    /// Get the global config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("integr"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { work_dir: PathBuf::from("work"), logs_root: PathBuf::from("logs"), dry_run: false }
    }
}

fn truthy(value: &str) -> bool {
    !matches!(value.trim().to_lowercase().as_str(), "" | "0" | "false" | "no")
}

fn absolutize(path: &PathBuf) -> std::io::Result<PathBuf> {
    let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned());
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(std::env::current_dir()?.join(expanded))
    }
}
