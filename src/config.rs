//! Driver configuration.
//!
//! Loaded from a TOML file when present; every field has a default so an
//! absent config file is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Error type for configuration loading.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Driver settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Build tool binary name or path.
    pub binary: String,
    /// Startup flags passed before the command verb.
    pub startup_flags: Vec<String>,
    /// Flags passed to every build command.
    pub build_flags: Vec<String>,
    /// How often the live reader polls the event file for new bytes.
    pub poll_interval_ms: u64,
    /// How long the live reader gets to drain remaining events after the
    /// process exits.
    pub drain_grace_ms: u64,
    /// How long a cancelled process gets to exit after SIGTERM before it is
    /// killed.
    pub terminate_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            binary: "bazel".to_string(),
            startup_flags: Vec::new(),
            build_flags: Vec::new(),
            poll_interval_ms: 10,
            drain_grace_ms: 1000,
            terminate_timeout_ms: 5000,
        }
    }
}

impl DriverConfig {
    /// Load configuration from `path`, or from the default location when no
    /// path is given. A missing default config file yields the defaults; an
    /// explicitly-named file must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        let config: Self =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })?;
        Ok(config)
    }

    /// Default config file location under the platform config directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("bep-driver").join("config.toml"))
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    #[must_use]
    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }
}
