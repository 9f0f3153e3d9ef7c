//! Tool configuration, stored as [ron].
//!
//! ```text
//! (
//!     host_path: Some("host_control/win32/xvf_host.exe"),
//!     timeout_ms: 5000,
//!     refresh_interval_ms: 1000,
//! )
//! ```
//!
//! Every field is optional in the file; missing ones take their defaults.

use log::info;
use serde::{Deserialize, Serialize};
use std::{
    borrow::Cow,
    fmt, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

/// Looked for in the working directory when no file is given explicitly.
pub const DEFAULT_CONFIG_FILE: &str = "xvfdiag.ron";

/// Settings shared by both binaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagConfig {
    /// Path of the `xvf_host` executable; searched for when `None`
    pub host_path: Option<PathBuf>,
    /// Longest a single invocation may take
    pub timeout_ms: u64,
    /// Period of the AEC auto-refresh
    pub refresh_interval_ms: u64,
    /// Number of AEC samples kept for display
    pub history_len: usize,
    /// Bins used by `analyze`
    pub histogram_bins: usize,
    /// Samples per RMS envelope window used by `analyze`
    pub envelope_window: usize,
}

impl Default for DiagConfig {
    fn default() -> Self {
        Self {
            host_path: None,
            timeout_ms: 5000,
            refresh_interval_ms: 1000,
            history_len: 100,
            histogram_bins: 50,
            envelope_window: 1000,
        }
    }
}

/// Why a configuration file could not be read or written.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be opened, read or written.
    IoError(io::Error),
    /// Serialising the configuration failed.
    RonError(ron::Error),
    /// The file is not valid configuration RON.
    RonSpannedError(ron::de::SpannedError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ConfigError::IoError(error) => Cow::from(format!("io error: {}", error)),
            ConfigError::RonError(error) => Cow::from(format!("ron error: {}", error)),
            ConfigError::RonSpannedError(error) => {
                Cow::from(format!("config syntax error: {}", error))
            }
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for ConfigError {}

impl DiagConfig {
    /// Reads a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(ConfigError::IoError)?;
        ron::de::from_str(&text).map_err(ConfigError::RonSpannedError)
    }

    /// Writes the configuration, pretty-printed.
    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(ConfigError::RonError)?;
        fs::write(path, text).map_err(ConfigError::IoError)
    }

    /// Loads `explicit` if given (it must exist), else [`DEFAULT_CONFIG_FILE`]
    /// if present, else the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => {
                info!("loading config from {}", path.display());
                Self::from_path(path)
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                info!("loading config from {}", DEFAULT_CONFIG_FILE);
                Self::from_path(DEFAULT_CONFIG_FILE)
            }
            None => Ok(Self::default()),
        }
    }

    /// [`timeout_ms`](Self::timeout_ms) as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// [`refresh_interval_ms`](Self::refresh_interval_ms) as a [`Duration`].
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: DiagConfig = ron::de::from_str("(timeout_ms: 250)").unwrap();
        assert_eq!(cfg.timeout(), Duration::from_millis(250));
        assert_eq!(cfg.refresh_interval_ms, 1000);
        assert_eq!(cfg.host_path, None);
    }

    #[test]
    fn round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xvfdiag.ron");
        let cfg = DiagConfig {
            host_path: Some(PathBuf::from("host_control/linux/xvf_host")),
            history_len: 20,
            ..DiagConfig::default()
        };

        cfg.to_path(&path).unwrap();
        assert_eq!(DiagConfig::load(Some(&path)).unwrap(), cfg);
    }

    #[test]
    fn explicit_file_must_exist() {
        let res = DiagConfig::load(Some(Path::new("/nonexistent/xvfdiag.ron")));
        assert!(matches!(res, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn bad_syntax_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ron");
        fs::write(&path, "(timeout_ms: \"soon\")").unwrap();
        assert!(matches!(
            DiagConfig::from_path(&path),
            Err(ConfigError::RonSpannedError(_))
        ));
    }
}
