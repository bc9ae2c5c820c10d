//! Bookmarked devices and their persisted form.
//!
//! Saved devices are keyed by peripheral identifier, never by display name: distinct
//! devices can share a name and a device's advertised name can change. The list is
//! stored as a JSON array of
//! `{"id", "name", "addedDate", "lastSeenDate"?}` records with RFC 3339 timestamps.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// A device the user bookmarked for tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDevice {
    /// Peripheral identifier at save time.
    pub id: String,
    /// Display name resolved at save time. Never updated afterwards.
    pub name: String,
    /// When the device was bookmarked.
    pub added_date: DateTime<Utc>,
    /// Most recent live sighting while bookmarked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_date: Option<DateTime<Utc>>,
}

impl SavedDevice {
    /// Bookmark `id` now, never seen yet.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::added_at(id, name, Utc::now())
    }

    /// Bookmark `id` with an explicit timestamp.
    pub fn added_at(id: impl Into<String>, name: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            added_date: at,
            last_seen_date: None,
        }
    }

    /// Record a live sighting.
    pub fn mark_seen(&mut self, at: DateTime<Utc>) {
        self.last_seen_date = Some(at);
    }
}

/// Serialize a saved-device list.
///
/// # Errors
///
/// Returns an error if JSON encoding fails.
pub fn encode(devices: &[SavedDevice]) -> Result<String> {
    Ok(serde_json::to_string(devices)?)
}

/// Deserialize a saved-device list.
///
/// Malformed input yields an empty list. A list is either loaded whole or not at all.
/// A list naming the same identifier twice counts as malformed.
#[must_use]
pub fn decode(json: &str) -> Vec<SavedDevice> {
    let devices: Vec<SavedDevice> = match serde_json::from_str(json) {
        Ok(devices) => devices,
        Err(e) => {
            warn!(error = %e, "Saved devices are malformed; starting with none");
            return Vec::new();
        }
    };

    let mut ids = HashSet::with_capacity(devices.len());
    if let Some(dup) = devices.iter().find(|d| !ids.insert(d.id.as_str())) {
        warn!(peripheral_id = %dup.id, "Saved devices repeat an identifier; starting with none");
        return Vec::new();
    }
    devices
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_round_trip_preserves_absent_last_seen() {
        let devices = vec![SavedDevice::added_at("A-1", "Keys", at(1_700_000_000))];

        let decoded = decode(&encode(&devices).unwrap());
        assert_eq!(decoded, devices);
        assert_eq!(decoded[0].last_seen_date, None);
    }

    #[test]
    fn test_round_trip_with_last_seen() {
        let mut device = SavedDevice::added_at("A-1", "Keys", at(1_700_000_000));
        device.mark_seen(at(1_700_000_500));
        let devices = vec![device];

        assert_eq!(decode(&encode(&devices).unwrap()), devices);
    }

    #[test]
    fn test_wire_format_field_names() {
        let device = SavedDevice::added_at("A-1", "Keys", at(1));
        let json = encode(&[device]).unwrap();
        assert_eq!(
            json,
            r#"[{"id":"A-1","name":"Keys","addedDate":"1970-01-01T00:00:01Z"}]"#
        );
    }

    #[test]
    fn test_null_last_seen_is_absent() {
        let json = r#"[{"id":"B","name":"Watch","addedDate":"2024-05-01T10:00:00Z","lastSeenDate":null}]"#;
        let devices = decode(json);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].last_seen_date, None);
    }

    #[test]
    fn test_malformed_input_loads_nothing() {
        assert!(decode("not json").is_empty());
        // one good record followed by a broken one: no partial load
        let json = r#"[{"id":"B","name":"W","addedDate":"2024-05-01T10:00:00Z"},{"id":5}]"#;
        assert!(decode(json).is_empty());
    }

    #[test]
    fn test_repeated_id_loads_nothing() {
        let json = concat!(
            r#"[{"id":"A","name":"Keys","addedDate":"2024-05-01T10:00:00Z"},"#,
            r#"{"id":"A","name":"Keys again","addedDate":"2024-05-02T10:00:00Z"}]"#,
        );
        assert!(decode(json).is_empty());

        let distinct = concat!(
            r#"[{"id":"A","name":"Keys","addedDate":"2024-05-01T10:00:00Z"},"#,
            r#"{"id":"a","name":"Other","addedDate":"2024-05-02T10:00:00Z"}]"#,
        );
        assert_eq!(decode(distinct).len(), 2);
    }

    #[test]
    fn test_mark_seen_keeps_added_date() {
        let mut device = SavedDevice::added_at("C", "Tag", at(10));
        device.mark_seen(at(20));
        assert_eq!(device.added_date, at(10));
        assert_eq!(device.last_seen_date, Some(at(20)));
    }
}
