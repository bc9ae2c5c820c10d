//! Key/value settings persistence.
//!
//! Bookmarks are stored as a single string value under [`SAVED_DEVICES_KEY`]. The file
//! backend writes one JSON file per key inside a data directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Fixed key the saved-device list lives under.
pub const SAVED_DEVICES_KEY: &str = "savedDevices";

/// Errors from a settings backend.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading a value failed.
    #[error("Failed to read {}: {source}", path.display())]
    ReadError {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing a value failed.
    #[error("Failed to write {}: {source}", path.display())]
    WriteError {
        /// File that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The data directory could not be created.
    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDirError {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No platform data directory is available.
    #[error("Cannot determine data directory")]
    NoDataDir,

    /// The backend refused the write.
    #[error("Settings store rejected write of '{key}'")]
    Unavailable {
        /// Key being written.
        key: String,
    },
}

/// Result alias for settings operations.
pub type SettingsResult<T> = std::result::Result<T, SettingsError>;

/// A string-valued key/value store.
pub trait SettingsStore: Send {
    /// Read the value stored under `key`, `None` if never written.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn load(&self, key: &str) -> SettingsResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn store(&mut self, key: &str, value: &str) -> SettingsResult<()>;
}

/// File-backed settings: `<data_dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileSettings {
    data_dir: PathBuf,
}

impl JsonFileSettings {
    /// Settings stored under `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Settings in the platform data directory, e.g. `~/.local/share/blewatch/`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::NoDataDir`] when no home directory can be determined.
    pub fn platform_default() -> SettingsResult<Self> {
        default_data_dir().map(Self::new)
    }

    /// Directory holding the settings files.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

impl SettingsStore for JsonFileSettings {
    fn load(&self, key: &str) -> SettingsResult<Option<String>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| SettingsError::ReadError { path, source })
    }

    fn store(&mut self, key: &str, value: &str) -> SettingsResult<()> {
        std::fs::create_dir_all(&self.data_dir).map_err(|source| {
            SettingsError::CreateDirError {
                path: self.data_dir.clone(),
                source,
            }
        })?;
        let path = self.key_path(key);
        std::fs::write(&path, value).map_err(|source| SettingsError::WriteError { path, source })
    }
}

/// In-memory settings, optionally failing every write.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: HashMap<String, String>,
    fail_writes: bool,
}

impl MemorySettings {
    /// Empty store that accepts writes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with one value.
    #[must_use]
    pub fn with_value(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    /// Make every subsequent write fail, as a full disk would.
    #[must_use]
    pub const fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Current value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl SettingsStore for MemorySettings {
    fn load(&self, key: &str) -> SettingsResult<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn store(&mut self, key: &str, value: &str) -> SettingsResult<()> {
        if self.fail_writes {
            return Err(SettingsError::Unavailable {
                key: key.to_string(),
            });
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl<S: SettingsStore + ?Sized> SettingsStore for Box<S> {
    fn load(&self, key: &str) -> SettingsResult<Option<String>> {
        (**self).load(key)
    }

    fn store(&mut self, key: &str, value: &str) -> SettingsResult<()> {
        (**self).store(key, value)
    }
}

/// Platform data directory for blewatch.
///
/// # Errors
///
/// Returns [`SettingsError::NoDataDir`] when it cannot be determined.
pub fn default_data_dir() -> SettingsResult<PathBuf> {
    directories::ProjectDirs::from("", "", "blewatch")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(SettingsError::NoDataDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = JsonFileSettings::new(dir.path().join("nested"));

        assert_eq!(settings.load(SAVED_DEVICES_KEY).unwrap(), None);
        settings.store(SAVED_DEVICES_KEY, "[]").unwrap();
        assert_eq!(
            settings.load(SAVED_DEVICES_KEY).unwrap().as_deref(),
            Some("[]")
        );
        assert!(dir.path().join("nested/savedDevices.json").exists());
    }

    #[test]
    fn test_file_settings_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = JsonFileSettings::new(dir.path());
        settings.store("k", "one").unwrap();
        settings.store("k", "two").unwrap();
        assert_eq!(settings.load("k").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn test_file_settings_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        // data dir path is an existing regular file
        let mut settings = JsonFileSettings::new(&blocker);
        assert!(matches!(
            settings.store("k", "v"),
            Err(SettingsError::CreateDirError { .. })
        ));
    }

    #[test]
    fn test_memory_settings() {
        let mut settings = MemorySettings::new().with_value("a", "1");
        assert_eq!(settings.load("a").unwrap().as_deref(), Some("1"));
        settings.store("b", "2").unwrap();
        assert_eq!(settings.get("b"), Some("2"));
    }

    #[test]
    fn test_memory_settings_failing_writes() {
        let mut settings = MemorySettings::new().failing_writes();
        assert!(matches!(
            settings.store("a", "1"),
            Err(SettingsError::Unavailable { .. })
        ));
        assert_eq!(settings.get("a"), None);
    }

    #[test]
    fn test_boxed_store_delegates() {
        let mut settings: Box<dyn SettingsStore> = Box::new(MemorySettings::new());
        settings.store("k", "v").unwrap();
        assert_eq!(settings.load("k").unwrap().as_deref(), Some("v"));
    }
}
