//! Download settings and their TOML file representation.
//!
//! ```toml
//! timeout_ms = 4000
//! polling_interval_ms = 200
//! archive_root = "build/downloads"
//! ```
//!
//! Every key is optional; missing keys keep their defaults.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Default wait budget for a download (4 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);

/// Default polling interval of the wait loop.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(200);

/// Default root folder for archived downloads.
pub const DEFAULT_ARCHIVE_ROOT: &str = "build/downloads";

const MAX_TIMEOUT_MS: u64 = 3_600_000;
const MAX_POLLING_INTERVAL_MS: u64 = 60_000;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has unknown keys.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config value for `{field}`: {value}. Expected range: {expected}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// Offending value.
        value: u64,
        /// Accepted range.
        expected: &'static str,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    timeout_ms: Option<u64>,
    polling_interval_ms: Option<u64>,
    archive_root: Option<PathBuf>,
}

/// Settings of the download coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Default wait budget when a caller does not pass one.
    pub timeout: Duration,
    /// Polling interval of the wait loop, floored at 100ms when used.
    pub polling_interval: Duration,
    /// Root folder for archived downloads.
    pub archive_root: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            polling_interval: DEFAULT_POLLING_INTERVAL,
            archive_root: PathBuf::from(DEFAULT_ARCHIVE_ROOT),
        }
    }
}

/// Config plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path, if a base directory is known.
    pub path: Option<PathBuf>,
    /// Effective configuration.
    pub config: DownloadConfig,
    /// Whether a file was found and read.
    pub loaded_from_file: bool,
}

impl DownloadConfig {
    /// Returns a copy with a different default timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns a copy with a different polling interval.
    #[must_use]
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    /// Returns a copy with a different archive root.
    #[must_use]
    pub fn with_archive_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.archive_root = root.into();
        self
    }

    /// Parses a TOML document on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(raw)?;
        let mut config = Self::default();
        if let Some(timeout_ms) = file.timeout_ms {
            config.timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(polling_ms) = file.polling_interval_ms {
            config.polling_interval = Duration::from_millis(polling_ms);
        }
        if let Some(root) = file.archive_root {
            config.archive_root = root;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise as
    /// [`DownloadConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Loads the config from the default path, falling back to defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns an error only if a file exists and cannot be read or parsed.
    pub fn load_default() -> Result<LoadedConfig, ConfigError> {
        let path = resolve_default_config_path();
        let Some(existing) = path.as_deref().filter(|p| p.exists()) else {
            debug!(path = ?path, "no config file, using defaults");
            return Ok(LoadedConfig {
                path,
                config: Self::default(),
                loaded_from_file: false,
            });
        };

        let config = Self::load(existing)?;
        debug!(path = %existing.display(), "loaded config file");
        Ok(LoadedConfig {
            path,
            config,
            loaded_from_file: true,
        })
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first out-of-range field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_millis(
            "timeout_ms",
            self.timeout,
            MAX_TIMEOUT_MS,
            "1..=3600000",
        )?;
        validate_millis(
            "polling_interval_ms",
            self.polling_interval,
            MAX_POLLING_INTERVAL_MS,
            "1..=60000",
        )?;
        Ok(())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn validate_millis(
    field: &'static str,
    value: Duration,
    max: u64,
    expected: &'static str,
) -> Result<(), ConfigError> {
    let millis = value.as_millis().min(u128::from(u64::MAX)) as u64;
    if !(1..=max).contains(&millis) {
        return Err(ConfigError::Invalid {
            field,
            value: millis,
            expected,
        });
    }
    Ok(())
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/cdp-download/config.toml`
/// 2. `$HOME/.config/cdp-download/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    config_path_from(env_var_non_empty_os("XDG_CONFIG_HOME"), env_var_non_empty_os("HOME"))
}

fn config_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg) = xdg_config_home {
        return Some(PathBuf::from(xdg).join("cdp-download").join("config.toml"));
    }
    let home = home?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("cdp-download")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}
