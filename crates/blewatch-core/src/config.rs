//! Application configuration management.
//!
//! Configuration is layered with the `config` crate:
//!
//! 1. built-in defaults,
//! 2. an optional TOML file (`~/.config/blewatch/config.toml` unless overridden),
//! 3. `BLEWATCH_*` environment variables, with `__` separating nested keys
//!    (`BLEWATCH_LOG__LEVEL=debug`).
//!
//! ```toml
//! registry_path = "/usr/share/blewatch/company_identifiers.json"
//! data_dir = "/var/lib/blewatch"
//! render_interval_secs = 10
//!
//! [log]
//! level = "info"
//! production = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::ManufacturerRegistry;
use crate::settings::{JsonFileSettings, SettingsResult};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "BLEWATCH";

/// Errors from loading, validating or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The layered sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// The configuration could not be written as TOML.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Writing the configuration file failed.
    #[error("Failed to write {}: {source}", path.display())]
    WriteError {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A value is out of range.
    #[error("Invalid value for '{field}': {message}")]
    Validation {
        /// Offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,

    /// JSON logs to rolling files instead of pretty stderr.
    pub production: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            production: false,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Manufacturer table to load instead of the bundled one.
    #[serde(default)]
    pub registry_path: Option<PathBuf>,

    /// Directory for saved devices. Defaults to the platform data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Minimum seconds between two renders of the device list.
    pub render_interval_secs: u64,

    /// Logging settings.
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_path: None,
            data_dir: None,
            render_interval_secs: 10,
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Load defaults, the config file and environment overrides.
    ///
    /// With `path` set the file must exist; otherwise the platform default path is
    /// used if present.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing, a source cannot be parsed, or
    /// the result fails validation.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let file = match path {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };

        let mut builder = defaults()?;
        if let Some(file) = file {
            builder = builder.add_source(File::from(file).format(FileFormat::Toml));
        }
        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document layered over the defaults. Environment is not consulted.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or fails validation.
    pub fn from_toml_str(toml: &str) -> ConfigResult<Self> {
        let config: Self = defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for the first invalid field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.render_interval_secs == 0 {
            return Err(ConfigError::Validation {
                field: "render_interval_secs".to_string(),
                message: "must be at least 1 second".to_string(),
            });
        }
        if self.log.level.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "log.level".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| ConfigError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the manufacturer registry this configuration points at.
    ///
    /// A configured but unreadable table yields an empty registry.
    #[must_use]
    pub fn registry(&self) -> ManufacturerRegistry {
        self.registry_path
            .as_ref()
            .map_or_else(ManufacturerRegistry::bundled, ManufacturerRegistry::load)
    }

    /// File-backed settings in the configured or platform data directory.
    ///
    /// # Errors
    ///
    /// Returns an error when no data directory is configured and none can be determined.
    pub fn settings(&self) -> SettingsResult<JsonFileSettings> {
        match &self.data_dir {
            Some(dir) => Ok(JsonFileSettings::new(dir)),
            None => JsonFileSettings::platform_default(),
        }
    }

    /// Render throttle interval.
    #[must_use]
    pub const fn render_interval(&self) -> Duration {
        Duration::from_secs(self.render_interval_secs)
    }
}

/// Default location of the config file, e.g. `~/.config/blewatch/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "blewatch")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn defaults() -> ConfigResult<config::ConfigBuilder<config::builder::DefaultState>> {
    let defaults = Config::default();
    Ok(config::Config::builder()
        .set_default("render_interval_secs", defaults.render_interval_secs)?
        .set_default("log.level", defaults.log.level)?
        .set_default("log.production", defaults.log.production)?)
}
