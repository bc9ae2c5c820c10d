//! Bluetooth SIG company identifier lookup.
//!
//! The table maps the 16-bit company identifier found at the start of manufacturer
//! specific advertisement data to a vendor name. It is built once at process start and
//! is read-only afterwards, so it is shared as an `Arc<ManufacturerRegistry>` and read
//! without locking.
//!
//! The source is a JSON object keyed by hexadecimal company id strings:
//!
//! ```json
//! { "004C": "Apple, Inc.", "0075": "Samsung Electronics Co. Ltd." }
//! ```
//!
//! Building a registry never fails. A missing file or malformed JSON yields an empty
//! registry, and individual keys that are not 16-bit hex values are skipped.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

/// Company identifier table shipped with the crate.
///
/// A sample of common assignments. Point `registry_path` at a conversion of the full
/// Bluetooth SIG list for complete coverage.
const BUNDLED_TABLE: &str = include_str!("../data/company_identifiers.json");

/// Read-only mapping from company identifier to vendor name.
#[derive(Debug, Clone, Default)]
pub struct ManufacturerRegistry {
    companies: HashMap<u16, String>,
}

impl ManufacturerRegistry {
    /// Create an empty registry. Every lookup returns `None`.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry from already-decoded entries.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (u16, S)>,
        S: Into<String>,
    {
        Self {
            companies: entries
                .into_iter()
                .map(|(id, name)| (id, name.into()))
                .collect(),
        }
    }

    /// Parse a JSON object of hex company ids to vendor names.
    ///
    /// Malformed JSON degrades to an empty registry.
    #[must_use]
    pub fn from_json_str(json: &str) -> Self {
        let raw: HashMap<String, String> = match serde_json::from_str(json) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Manufacturer table is malformed; using empty registry");
                return Self::empty();
            }
        };

        let companies: HashMap<u16, String> = raw
            .into_iter()
            .filter_map(|(key, name)| parse_company_id(&key).map(|id| (id, name)))
            .collect();

        debug!(entries = companies.len(), "Loaded manufacturer table");
        Self { companies }
    }

    /// Load the registry from a JSON file.
    ///
    /// A missing or unreadable file degrades to an empty registry.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_json_str(&content),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Cannot read manufacturer table; using empty registry"
                );
                Self::empty()
            }
        }
    }

    /// The table embedded in the crate at build time.
    #[must_use]
    pub fn bundled() -> Self {
        Self::from_json_str(BUNDLED_TABLE)
    }

    /// Look up the vendor name for a company identifier.
    #[must_use]
    pub fn lookup(&self, company_id: u16) -> Option<&str> {
        self.companies.get(&company_id).map(String::as_str)
    }

    /// Number of known company identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.companies.len()
    }

    /// Whether the registry has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }
}

/// Parse `"004C"` or `"0x004C"` into a company id.
fn parse_company_id(key: &str) -> Option<u16> {
    let digits = key
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    u16::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_lookup_known_and_unknown() {
        let registry = ManufacturerRegistry::from_json_str(r#"{"004C": "Apple, Inc."}"#);
        assert_eq!(registry.lookup(0x004C), Some("Apple, Inc."));
        assert_eq!(registry.lookup(0xFFFF), None);
    }

    #[test]
    fn test_unparsable_keys_are_skipped() {
        let registry = ManufacturerRegistry::from_json_str(
            r#"{"0075": "Samsung", "not-hex": "Bogus", "12345": "Too wide", "0x00E0": "Google"}"#,
        );
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup(0x0075), Some("Samsung"));
        assert_eq!(registry.lookup(0x00E0), Some("Google"));
    }

    #[test]
    fn test_malformed_json_degrades_to_empty() {
        let registry = ManufacturerRegistry::from_json_str("[1, 2, 3");
        assert!(registry.is_empty());
        assert_eq!(registry.lookup(0x004C), None);
    }

    #[test]
    fn test_non_string_values_degrade_to_empty() {
        let registry = ManufacturerRegistry::from_json_str(r#"{"004C": 76}"#);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ManufacturerRegistry::load(dir.path().join("absent.json"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"0059": "Nordic Semiconductor ASA"}}"#).unwrap();

        let registry = ManufacturerRegistry::load(file.path());
        assert_eq!(registry.lookup(0x0059), Some("Nordic Semiconductor ASA"));
    }

    #[test]
    fn test_bundled_table_contains_apple() {
        let registry = ManufacturerRegistry::bundled();
        assert!(!registry.is_empty());
        assert_eq!(registry.lookup(0x004C), Some("Apple, Inc."));
    }

    #[test]
    fn test_every_bundled_entry_loads() {
        let raw: HashMap<String, String> = serde_json::from_str(BUNDLED_TABLE).unwrap();
        let registry = ManufacturerRegistry::bundled();
        assert_eq!(registry.len(), raw.len());
        for (key, name) in &raw {
            let id = u16::from_str_radix(key, 16).unwrap();
            assert_eq!(registry.lookup(id), Some(name.as_str()));
        }
    }

    #[test]
    fn test_registry_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ManufacturerRegistry>();
    }
}
