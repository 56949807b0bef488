//! Configuration management for Lodstat.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/lodstat/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Statistical secret settings
    pub secret: SecretConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML or fail validation
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path.
    ///
    /// Unlike [`AppConfig::load`], a missing file is an error here.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to an already loaded config.
    ///
    /// Supports the following environment variables:
    /// - `LODSTAT_THRESHOLD`: Override the default suppression threshold
    /// - `LODSTAT_DEBUG`: Override debug annotations (true/false)
    /// - `LODSTAT_LOG`: Override the log filter directive
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        if let Ok(val) = std::env::var("LODSTAT_THRESHOLD") {
            if let Ok(threshold) = val.parse() {
                self.secret.default_threshold = threshold;
                tracing::debug!("Override secret.default_threshold from env: {}", threshold);
            }
        }

        if let Ok(val) = std::env::var("LODSTAT_DEBUG") {
            if let Ok(flag) = val.parse() {
                self.secret.debug = flag;
                tracing::debug!("Override secret.debug from env: {}", flag);
            }
        }

        if let Ok(val) = std::env::var("LODSTAT_LOG") {
            tracing::debug!("Override logging.filter from env: {}", val);
            self.logging.filter = val;
        }

        self.validate()
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env()?;
        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/lodstat/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("org", "lodstat", "lodstat").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Check values that would make the engine misbehave.
    pub fn validate(&self) -> ConfigResult<()> {
        let threshold = self.secret.default_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "secret.default_threshold".to_string(),
                reason: format!("must be a positive number, got {threshold}"),
            });
        }

        if self.secret.marker.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "secret.marker".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        for range in &self.secret.class_ranges {
            if range.from.is_none() && range.to.is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "secret.class_ranges".to_string(),
                    reason: "a class range needs at least one bound".to_string(),
                });
            }
            if let (Some(from), Some(to)) = (range.from, range.to) {
                if from > to {
                    return Err(ConfigError::InvalidValue {
                        field: "secret.class_ranges".to_string(),
                        reason: format!("lower bound {from} is above upper bound {to}"),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Statistical secret settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretConfig {
    /// Threshold used when no column declares one
    pub default_threshold: f64,
    /// Label of the margin row and column
    pub total_label: String,
    /// Marker rendered in place of a suppressed value
    pub marker: String,
    /// Annotate suppressed cells with their original value and reason
    pub debug: bool,
    /// Classes used to publish constraint-suppressed cells as ranges
    pub class_ranges: Vec<ClassRange>,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            default_threshold: 3.0,
            total_label: "Total".to_string(),
            marker: "*".to_string(),
            debug: false,
            class_ranges: Vec::new(),
        }
    }
}

/// A published value class. An open bound extends to infinity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassRange {
    /// Inclusive lower bound
    #[serde(default)]
    pub from: Option<f64>,
    /// Inclusive upper bound
    #[serde(default)]
    pub to: Option<f64>,
}

impl ClassRange {
    /// Whether `value` falls inside this class.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        match (self.from, self.to) {
            (Some(from), Some(to)) => from <= value && value <= to,
            (None, Some(to)) => value <= to,
            (Some(from), None) => value >= from,
            (None, None) => false,
        }
    }

    /// Display label: `<to`, `from-to` or `>from`.
    #[must_use]
    pub fn label(&self) -> String {
        match (self.from, self.to) {
            (None, Some(to)) => format!("<{to}"),
            (Some(from), None) => format!(">{from}"),
            (Some(from), Some(to)) => format!("{from}-{to}"),
            (None, None) => String::new(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,lodstat=debug".to_string(),
        }
    }
}
