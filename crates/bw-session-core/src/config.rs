//! Settings file for bw-session.
//!
//! Read from `~/.config/bw-session/config.toml`. A missing file means
//! defaults; a file that exists but cannot be read, parsed or validated is
//! an error, so a typo never silently falls back to defaults.
//!
//! ```toml
//! [session]
//! username = "user@example.com"
//! executable = "/usr/local/bin/bw"   # default: `bw` found on PATH
//! timeout = 40                       # seconds per bw invocation
//!
//! [prompt]
//! description = "Enter your Bitwarden Password"
//! prompt = ">"
//! ```
//!
//! The master password is never read from this file.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::types::PromptConfig;

/// Default time allowed for one `bw` invocation, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 40;

/// Errors from loading `config.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML or has values of the wrong type.
    #[error("invalid TOML in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid setting in {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },
}

/// Contents of `config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `[session]` table.
    pub session: SessionConfig,
    /// `[prompt]` table.
    pub prompt: PromptSection,
}

/// `[session]`: who logs in and how `bw` is run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Account email passed to `bw login`.
    pub username: Option<String>,
    /// Explicit path to `bw`; when unset the executable is looked up on PATH.
    pub executable: Option<PathBuf>,
    /// Seconds allowed per invocation.
    pub timeout: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            username: None,
            executable: None,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// `[prompt]`: text of the interactive password prompt.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptSection {
    /// Line shown above the input.
    pub description: String,
    /// Marker shown before the input.
    pub prompt: String,
}

impl Default for PromptSection {
    fn default() -> Self {
        let PromptConfig {
            description,
            prompt_text,
        } = PromptConfig::default();
        Self {
            description,
            prompt: prompt_text,
        }
    }
}

impl Config {
    /// `<config dir>/bw-session/config.toml`, if the platform has a config
    /// directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("bw-session").join("config.toml"))
    }

    /// Load from [`Config::default_path`], or defaults if there is no file.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load and validate the file at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if config.session.timeout == 0 {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: "session.timeout must be at least 1 second".to_string(),
            });
        }
        Ok(config)
    }

    /// `session.timeout` as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.session.timeout)
    }

    /// The `[prompt]` table as a [`PromptConfig`].
    pub fn prompt_config(&self) -> PromptConfig {
        PromptConfig {
            description: self.prompt.description.clone(),
            prompt_text: self.prompt.prompt.clone(),
        }
    }
}
