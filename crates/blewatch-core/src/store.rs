//! Live observations and bookmarks.
//!
//! The store has a single owner (the device tracker) and is never mutated concurrently.
//! Two tables live here:
//!
//! - live observations keyed by peripheral identifier, overwritten on every sighting and
//!   dropped wholesale when the radio goes away;
//! - bookmarked devices, persisted through a [`SettingsStore`].
//!
//! Bookmark and unbookmark write through immediately. Last-seen updates from sightings
//! only mark the list dirty; [`ObservationStore::flush`] writes it once per batch.
//!
//! Persistence is best-effort. A failed write is logged and otherwise ignored, and the
//! in-memory tables stay authoritative for the rest of the session.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::advertisement::Advertisement;
use crate::saved::{self, SavedDevice};
use crate::settings::{SettingsStore, SAVED_DEVICES_KEY};

/// Most recent sighting of one peripheral.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedDevice {
    /// Signal strength of the latest sighting, in dBm.
    pub rssi: i16,
    /// Latest advertisement.
    pub advertisement: Advertisement,
    /// When the latest sighting was recorded.
    pub last_seen: DateTime<Utc>,
}

/// Owner of the live observation table and the bookmark list.
pub struct ObservationStore {
    live: HashMap<String, ObservedDevice>,
    saved: Vec<SavedDevice>,
    settings: Box<dyn SettingsStore>,
    dirty: bool,
}

impl std::fmt::Debug for ObservationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationStore")
            .field("live", &self.live.len())
            .field("saved", &self.saved)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl ObservationStore {
    /// Open the store, loading bookmarks from `settings`.
    ///
    /// Missing, unreadable or malformed bookmark data means no bookmarks.
    #[must_use]
    pub fn open(settings: Box<dyn SettingsStore>) -> Self {
        let saved = match settings.load(SAVED_DEVICES_KEY) {
            Ok(Some(json)) => saved::decode(&json),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Cannot read saved devices; starting with none");
                Vec::new()
            }
        };
        debug!(saved = saved.len(), "Opened observation store");

        Self {
            live: HashMap::new(),
            saved,
            settings,
            dirty: false,
        }
    }

    /// Record a sighting now. See [`Self::record_sighting_at`].
    pub fn record_sighting(&mut self, advertisement: Advertisement) -> bool {
        self.record_sighting_at(advertisement, Utc::now())
    }

    /// Upsert the live entry for the advertisement's peripheral.
    ///
    /// When that peripheral is bookmarked its last-seen time becomes `now` and the
    /// bookmarks are marked for the next [`Self::flush`]. Returns `true` if a bookmark was
    /// updated.
    pub fn record_sighting_at(
        &mut self,
        advertisement: Advertisement,
        now: DateTime<Utc>,
    ) -> bool {
        let id = advertisement.peripheral_id.clone();
        let rssi = advertisement.rssi;
        debug!(peripheral_id = %id, rssi, "Sighting");

        self.live.insert(
            id.clone(),
            ObservedDevice {
                rssi,
                advertisement,
                last_seen: now,
            },
        );

        let Some(device) = self.saved.iter_mut().find(|d| d.id == id) else {
            return false;
        };
        device.mark_seen(now);
        self.dirty = true;
        true
    }

    /// Drop every live observation. Bookmarks are untouched.
    pub fn clear_all(&mut self) {
        if !self.live.is_empty() {
            info!(cleared = self.live.len(), "Clearing live observations");
        }
        self.live.clear();
    }

    /// Bookmark a peripheral under `name`. No-op if it is already bookmarked.
    ///
    /// Returns `true` if a new bookmark was created.
    pub fn bookmark(&mut self, peripheral_id: &str, name: &str) -> bool {
        self.bookmark_at(peripheral_id, name, Utc::now())
    }

    /// [`Self::bookmark`] with an explicit creation time.
    pub fn bookmark_at(&mut self, peripheral_id: &str, name: &str, now: DateTime<Utc>) -> bool {
        if self.is_bookmarked(peripheral_id) {
            return false;
        }
        info!(peripheral_id, name, "Bookmarked device");
        self.saved.push(SavedDevice::added_at(peripheral_id, name, now));
        self.persist();
        true
    }

    /// Remove a bookmark. No-op if absent.
    ///
    /// Returns `true` if a bookmark was removed.
    pub fn unbookmark(&mut self, peripheral_id: &str) -> bool {
        let before = self.saved.len();
        self.saved.retain(|d| d.id != peripheral_id);
        if self.saved.len() == before {
            return false;
        }
        info!(peripheral_id, "Removed bookmark");
        self.persist();
        true
    }

    /// Whether `peripheral_id` is bookmarked.
    #[must_use]
    pub fn is_bookmarked(&self, peripheral_id: &str) -> bool {
        self.saved.iter().any(|d| d.id == peripheral_id)
    }

    /// Current live sighting of a bookmarked device, as `(peripheral_id, rssi)`.
    ///
    /// Identifiers are compared exactly, including case.
    #[must_use]
    pub fn live_match(&self, saved: &SavedDevice) -> Option<(&str, i16)> {
        self.live
            .get_key_value(saved.id.as_str())
            .map(|(id, observed)| (id.as_str(), observed.rssi))
    }

    /// Live observations keyed by peripheral identifier.
    #[must_use]
    pub const fn live(&self) -> &HashMap<String, ObservedDevice> {
        &self.live
    }

    /// Latest sighting of one peripheral.
    #[must_use]
    pub fn observed(&self, peripheral_id: &str) -> Option<&ObservedDevice> {
        self.live.get(peripheral_id)
    }

    /// Bookmarks in the order they were added.
    #[must_use]
    pub fn saved(&self) -> &[SavedDevice] {
        &self.saved
    }

    /// Whether sightings changed bookmarks since the last write.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write pending last-seen updates. No-op when nothing changed.
    pub fn flush(&mut self) {
        if self.dirty {
            self.persist();
        }
    }

    fn persist(&mut self) {
        self.dirty = false;
        let json = match saved::encode(&self.saved) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Cannot encode saved devices; not persisted");
                return;
            }
        };
        if let Err(e) = self.settings.store(SAVED_DEVICES_KEY, &json) {
            warn!(error = %e, "Cannot persist saved devices; keeping in-memory state");
        }
    }
}
