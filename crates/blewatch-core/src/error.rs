//! Unified error types for the blewatch core library.
//!
//! Each module has its own specific error type ([`ConfigError`], [`SettingsError`],
//! [`AdvertisementError`]) and they all convert into [`BlewatchError`].
//!
//! Most core operations never surface these errors to a user. Loading the manufacturer
//! table, loading saved devices and persisting bookmarks all degrade to a safe default
//! and log a warning instead. The errors exist for the layers that *do* want to know,
//! such as the command line reporting a bad config file.
//!
//! # Example
//!
//! ```rust
//! use blewatch_core::error::{BlewatchError, Result};
//!
//! fn require_id(id: &str) -> Result<&str> {
//!     if id.is_empty() {
//!         return Err(BlewatchError::InvalidPeripheralId(id.to_string()));
//!     }
//!     Ok(id)
//! }
//! # assert!(require_id("").is_err());
//! ```

use std::path::PathBuf;

use thiserror::Error;

pub use crate::advertisement::AdvertisementError;
pub use crate::config::ConfigError;
pub use crate::settings::SettingsError;

/// The unified error type for all blewatch operations.
#[derive(Debug, Error)]
pub enum BlewatchError {
    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // ADVERTISEMENT ERRORS
    // =========================================================================
    /// Manufacturer data given as text was not valid hexadecimal.
    #[error("Invalid hex payload: '{0}'")]
    InvalidHex(String),

    /// A peripheral identifier was empty.
    #[error("Invalid peripheral identifier: '{0}'")]
    InvalidPeripheralId(String),

    // =========================================================================
    // TRACKER ERRORS
    // =========================================================================
    /// The tracker worker task has stopped and no longer accepts commands.
    #[error("Device tracker worker has stopped")]
    TrackerStopped,

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// An error occurred while persisting or reading settings.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// Saved data could not be encoded.
    #[error("Serialization error: {0}")]
    SerializeError(#[from] serde_json::Error),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for blewatch operations.
pub type Result<T> = std::result::Result<T, BlewatchError>;

impl BlewatchError {
    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error came from malformed scan input.
    #[inline]
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidHex(_) | Self::InvalidPeripheralId(_))
    }

    /// Returns `true` if this error is related to I/O or persistence.
    #[inline]
    #[must_use]
    pub const fn is_io_error(&self) -> bool {
        matches!(
            self,
            Self::PersistenceError(_) | Self::SerializeError(_) | Self::IoError(_)
        )
    }

    /// Returns a machine-readable error code.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::InvalidHex(_) => "INVALID_HEX",
            Self::InvalidPeripheralId(_) => "INVALID_PERIPHERAL_ID",
            Self::TrackerStopped => "TRACKER_STOPPED",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::SerializeError(_) => "SERIALIZE_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<ConfigError> for BlewatchError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path),
            ConfigError::Load(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::Serialize(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::WriteError { path, source } => {
                Self::PersistenceError(format!("Failed to write {}: {}", path.display(), source))
            }
            ConfigError::Validation { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
        }
    }
}

impl From<SettingsError> for BlewatchError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::ReadError { path, source } => {
                Self::PersistenceError(format!("Failed to read {}: {}", path.display(), source))
            }
            SettingsError::WriteError { path, source } => {
                Self::PersistenceError(format!("Failed to write {}: {}", path.display(), source))
            }
            SettingsError::CreateDirError { path, source } => Self::PersistenceError(format!(
                "Failed to create directory {}: {}",
                path.display(),
                source
            )),
            SettingsError::NoDataDir => {
                Self::PersistenceError("Cannot determine data directory".to_string())
            }
            SettingsError::Unavailable { key } => {
                Self::PersistenceError(format!("Settings store rejected write of '{key}'"))
            }
        }
    }
}

impl From<AdvertisementError> for BlewatchError {
    fn from(err: AdvertisementError) -> Self {
        match err {
            AdvertisementError::InvalidHex { input, .. } => Self::InvalidHex(input),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoErr, ErrorKind};

    #[test]
    fn test_config_error_classification() {
        assert!(BlewatchError::ConfigNotFound(PathBuf::from("/test")).is_config_error());
        assert!(BlewatchError::ConfigParseError("syntax error".into()).is_config_error());
        assert!(BlewatchError::ConfigValidationError("bad".into()).is_config_error());

        assert!(!BlewatchError::InvalidHex("zz".into()).is_config_error());
    }

    #[test]
    fn test_io_error_classification() {
        assert!(BlewatchError::PersistenceError("disk full".into()).is_io_error());
        assert!(BlewatchError::IoError(IoErr::new(ErrorKind::NotFound, "test")).is_io_error());

        assert!(!BlewatchError::InvalidPeripheralId(String::new()).is_io_error());
    }

    #[test]
    fn test_input_error_classification() {
        assert!(BlewatchError::InvalidHex("zz".into()).is_input_error());
        assert!(BlewatchError::InvalidPeripheralId(String::new()).is_input_error());
        assert!(!BlewatchError::PersistenceError("x".into()).is_input_error());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            BlewatchError::ConfigNotFound(PathBuf::new()).error_code(),
            "CONFIG_NOT_FOUND"
        );
        assert_eq!(BlewatchError::InvalidHex("q".into()).error_code(), "INVALID_HEX");
        assert_eq!(BlewatchError::TrackerStopped.error_code(), "TRACKER_STOPPED");
    }

    #[test]
    fn test_from_settings_error() {
        let err: BlewatchError = SettingsError::Unavailable {
            key: "savedDevices".into(),
        }
        .into();
        assert!(err.is_io_error());
        assert!(err.to_string().contains("savedDevices"));
    }

    #[test]
    fn test_from_config_validation_error() {
        let err: BlewatchError = ConfigError::Validation {
            field: "render_interval_secs".into(),
            message: "must be positive".into(),
        }
        .into();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("render_interval_secs"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoErr::new(ErrorKind::NotFound, "file not found");
        let err: BlewatchError = io_err.into();
        assert!(matches!(err, BlewatchError::IoError(_)));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<BlewatchError>();
        assert_sync::<BlewatchError>();
    }
}
