//! Device tracker: the composition root the presentation layer talks to.
//!
//! [`DeviceTracker`] receives scan callbacks, folds them into the
//! [`ObservationStore`], and publishes an immutable [`Snapshot`] on a `watch` channel
//! after every batch of mutations. Readers never see the live tables.
//!
//! All mutations go through one owner. [`TrackerWorker::spawn`] moves the tracker into
//! a dedicated tokio task and hands out cloneable [`TrackerHandle`]s that send commands
//! over an `mpsc` channel; the task applies them strictly in order.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::advertisement::Advertisement;
use crate::error::{BlewatchError, Result};
use crate::identity::{IdentityResolver, UNKNOWN_DEVICE};
use crate::proximity::{estimate_distance, Distance};
use crate::saved::SavedDevice;
use crate::store::ObservationStore;

/// Capacity of the worker's command queue.
const COMMAND_QUEUE_DEPTH: usize = 256;

/// Radio state transitions reported by the scanning subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    /// The radio is on and scanning may start.
    PoweredOn,
    /// The radio was switched off.
    PoweredOff,
    /// The radio is unsupported, unauthorized or resetting.
    Unavailable,
}

/// One callback from the scanning subsystem.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// The radio changed state.
    Radio(RadioState),
    /// An advertisement was received.
    Discovered(Advertisement),
}

/// What the tracker asks the scanning subsystem to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRequest {
    /// Report every advertisement, not just the first per peripheral.
    pub allow_duplicates: bool,
}

/// Signal of a device that is currently visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiveSignal {
    /// Latest signal strength in dBm.
    pub rssi: i16,
    /// Distance bucket for `rssi`.
    pub distance: Distance,
}

/// One row of the live device list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveDevice {
    /// Peripheral identifier.
    pub peripheral_id: String,
    /// Resolved display name.
    pub display_name: String,
    /// Latest signal strength in dBm.
    pub rssi: i16,
    /// Distance bucket for `rssi`.
    pub distance: Distance,
    /// Whether this peripheral is bookmarked.
    pub bookmarked: bool,
}

/// A bookmark and whether it is currently online.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedStatus {
    /// The bookmark.
    pub device: SavedDevice,
    /// Live signal when the device is currently visible.
    pub online: Option<LiveSignal>,
}

/// Point-in-time copy of everything the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Increments with every published snapshot.
    pub revision: u64,
    /// Live devices, strongest signal first.
    pub live: Vec<LiveDevice>,
    /// Bookmarks in the order they were added.
    pub saved: Vec<SavedStatus>,
}

impl Snapshot {
    /// Live devices that are bookmarked.
    pub fn nearby_bookmarked(&self) -> impl Iterator<Item = &LiveDevice> {
        self.live.iter().filter(|d| d.bookmarked)
    }

    /// Live devices that are not bookmarked.
    pub fn others(&self) -> impl Iterator<Item = &LiveDevice> {
        self.live.iter().filter(|d| !d.bookmarked)
    }

    /// Find a live device by identifier.
    #[must_use]
    pub fn live_device(&self, peripheral_id: &str) -> Option<&LiveDevice> {
        self.live.iter().find(|d| d.peripheral_id == peripheral_id)
    }
}

/// Owns the observation store and the identity resolver.
#[derive(Debug)]
pub struct DeviceTracker {
    store: ObservationStore,
    resolver: IdentityResolver,
    revision: u64,
    snapshots: watch::Sender<Arc<Snapshot>>,
}

impl DeviceTracker {
    /// Create a tracker and publish its initial snapshot.
    #[must_use]
    pub fn new(store: ObservationStore, resolver: IdentityResolver) -> Self {
        let (snapshots, _) = watch::channel(Arc::new(Snapshot::default()));
        let mut tracker = Self {
            store,
            resolver,
            revision: 0,
            snapshots,
        };
        tracker.publish();
        tracker
    }

    /// Receive a new snapshot after every mutation batch.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.subscribe()
    }

    /// Apply one scan event and publish.
    pub fn handle_event(&mut self, event: ScanEvent) -> Option<ScanRequest> {
        let request = self.apply(event);
        self.publish();
        request
    }

    /// Apply several scan events and publish once.
    pub fn handle_batch(
        &mut self,
        events: impl IntoIterator<Item = ScanEvent>,
    ) -> Vec<ScanRequest> {
        let requests = events
            .into_iter()
            .filter_map(|event| self.apply(event))
            .collect();
        self.publish();
        requests
    }

    /// Bookmark a live peripheral under its currently resolved name.
    ///
    /// A peripheral that is not currently visible is saved as `"Unknown Device"`.
    pub fn bookmark(&mut self, peripheral_id: &str) -> bool {
        let name = self.store.observed(peripheral_id).map_or_else(
            || UNKNOWN_DEVICE.to_string(),
            |o| self.resolver.resolve(&o.advertisement),
        );
        self.bookmark_named(peripheral_id, &name)
    }

    /// Bookmark a peripheral under an explicit name.
    pub fn bookmark_named(&mut self, peripheral_id: &str, name: &str) -> bool {
        let created = self.store.bookmark(peripheral_id, name);
        if created {
            self.publish();
        }
        created
    }

    /// Remove a bookmark.
    pub fn unbookmark(&mut self, peripheral_id: &str) -> bool {
        let removed = self.store.unbookmark(peripheral_id);
        if removed {
            self.publish();
        }
        removed
    }

    /// Whether `peripheral_id` is bookmarked.
    #[must_use]
    pub fn is_bookmarked(&self, peripheral_id: &str) -> bool {
        self.store.is_bookmarked(peripheral_id)
    }

    /// Resolve a display name. See [`IdentityResolver::resolve_name`].
    #[must_use]
    pub fn resolve_name(
        &self,
        raw_name: Option<&str>,
        local_name: Option<&str>,
        manufacturer_data: Option<&[u8]>,
    ) -> String {
        self.resolver.resolve_name(raw_name, local_name, manufacturer_data)
    }

    /// Distance bucket for a signal strength.
    #[must_use]
    pub fn estimate_distance(&self, rssi: i16) -> Distance {
        estimate_distance(rssi)
    }

    /// Inspector lines for a live peripheral.
    #[must_use]
    pub fn describe(&self, peripheral_id: &str) -> Option<Vec<String>> {
        self.store
            .observed(peripheral_id)
            .map(|o| o.advertisement.describe())
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &ObservationStore {
        &self.store
    }

    /// Build a snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let mut live: Vec<LiveDevice> = self
            .store
            .live()
            .iter()
            .map(|(id, observed)| LiveDevice {
                peripheral_id: id.clone(),
                display_name: self.resolver.resolve(&observed.advertisement),
                rssi: observed.rssi,
                distance: estimate_distance(observed.rssi),
                bookmarked: self.store.is_bookmarked(id),
            })
            .collect();
        live.sort_by(|a, b| {
            b.rssi
                .cmp(&a.rssi)
                .then_with(|| a.peripheral_id.cmp(&b.peripheral_id))
        });

        let saved = self
            .store
            .saved()
            .iter()
            .map(|device| SavedStatus {
                device: device.clone(),
                online: self.store.live_match(device).map(|(_, rssi)| LiveSignal {
                    rssi,
                    distance: estimate_distance(rssi),
                }),
            })
            .collect();

        Snapshot {
            revision: self.revision,
            live,
            saved,
        }
    }

    fn apply(&mut self, event: ScanEvent) -> Option<ScanRequest> {
        match event {
            ScanEvent::Radio(RadioState::PoweredOn) => {
                info!("Radio powered on; requesting scan");
                Some(ScanRequest {
                    allow_duplicates: true,
                })
            }
            ScanEvent::Radio(state) => {
                info!(?state, "Radio not available");
                self.store.clear_all();
                None
            }
            ScanEvent::Discovered(advertisement) => {
                self.store.record_sighting(advertisement);
                None
            }
        }
    }

    fn publish(&mut self) {
        self.store.flush();
        self.revision += 1;
        let snapshot = self.snapshot();
        self.snapshots.send_replace(Arc::new(snapshot));
    }
}

// =============================================================================
// SINGLE-WRITER WORKER
// =============================================================================

enum Command {
    Event {
        event: ScanEvent,
        reply: oneshot::Sender<Option<ScanRequest>>,
    },
    Batch {
        events: Vec<ScanEvent>,
        reply: oneshot::Sender<Vec<ScanRequest>>,
    },
    Bookmark {
        peripheral_id: String,
        name: Option<String>,
        reply: oneshot::Sender<bool>,
    },
    Unbookmark {
        peripheral_id: String,
        reply: oneshot::Sender<bool>,
    },
    Describe {
        peripheral_id: String,
        reply: oneshot::Sender<Option<Vec<String>>>,
    },
    Shutdown,
}

/// A running tracker task.
#[derive(Debug)]
pub struct TrackerWorker {
    handle: TrackerHandle,
    task: JoinHandle<DeviceTracker>,
}

impl TrackerWorker {
    /// Move `tracker` into a new tokio task.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(tracker: DeviceTracker) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let snapshots = tracker.subscribe();
        let task = tokio::spawn(run(tracker, receiver));
        Self {
            handle: TrackerHandle {
                commands,
                snapshots,
            },
            task,
        }
    }

    /// A handle for sending commands and reading snapshots.
    #[must_use]
    pub fn handle(&self) -> TrackerHandle {
        self.handle.clone()
    }

    /// Stop the task after it drains queued commands and return the tracker.
    ///
    /// # Errors
    ///
    /// Returns [`BlewatchError::TrackerStopped`] if the task panicked.
    pub async fn shutdown(self) -> Result<DeviceTracker> {
        // Ignored: the task may already have exited because every handle was dropped.
        let _ = self.handle.commands.send(Command::Shutdown).await;
        self.task.await.map_err(|e| {
            warn!(error = %e, "Tracker task failed");
            BlewatchError::TrackerStopped
        })
    }
}

async fn run(mut tracker: DeviceTracker, mut commands: mpsc::Receiver<Command>) -> DeviceTracker {
    debug!("Tracker worker started");
    while let Some(command) = commands.recv().await {
        match command {
            Command::Event { event, reply } => {
                let _ = reply.send(tracker.handle_event(event));
            }
            Command::Batch { events, reply } => {
                let _ = reply.send(tracker.handle_batch(events));
            }
            Command::Bookmark {
                peripheral_id,
                name,
                reply,
            } => {
                let created = match name {
                    Some(name) => tracker.bookmark_named(&peripheral_id, &name),
                    None => tracker.bookmark(&peripheral_id),
                };
                let _ = reply.send(created);
            }
            Command::Unbookmark {
                peripheral_id,
                reply,
            } => {
                let _ = reply.send(tracker.unbookmark(&peripheral_id));
            }
            Command::Describe {
                peripheral_id,
                reply,
            } => {
                let _ = reply.send(tracker.describe(&peripheral_id));
            }
            Command::Shutdown => break,
        }
    }
    debug!("Tracker worker stopped");
    tracker
}

/// Cloneable access to a running tracker.
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Arc<Snapshot>>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Event { .. } => "Event",
            Self::Batch { .. } => "Batch",
            Self::Bookmark { .. } => "Bookmark",
            Self::Unbookmark { .. } => "Unbookmark",
            Self::Describe { .. } => "Describe",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

impl TrackerHandle {
    /// Deliver one scan event; returns the scan request it produced, if any.
    ///
    /// # Errors
    ///
    /// Returns [`BlewatchError::TrackerStopped`] if the worker is gone.
    pub async fn send_event(&self, event: ScanEvent) -> Result<Option<ScanRequest>> {
        self.request(|reply| Command::Event { event, reply }).await
    }

    /// Deliver several scan events as one batch with a single notification.
    ///
    /// # Errors
    ///
    /// Returns [`BlewatchError::TrackerStopped`] if the worker is gone.
    pub async fn send_batch(&self, events: Vec<ScanEvent>) -> Result<Vec<ScanRequest>> {
        self.request(|reply| Command::Batch { events, reply }).await
    }

    /// Bookmark a peripheral, optionally under an explicit name.
    ///
    /// Without a name the currently resolved display name is used.
    ///
    /// # Errors
    ///
    /// Returns [`BlewatchError::InvalidPeripheralId`] for an empty identifier and
    /// [`BlewatchError::TrackerStopped`] if the worker is gone.
    pub async fn bookmark(&self, peripheral_id: &str, name: Option<&str>) -> Result<bool> {
        if peripheral_id.is_empty() {
            return Err(BlewatchError::InvalidPeripheralId(peripheral_id.to_string()));
        }
        let peripheral_id = peripheral_id.to_string();
        let name = name.map(str::to_string);
        self.request(|reply| Command::Bookmark {
            peripheral_id,
            name,
            reply,
        })
        .await
    }

    /// Remove a bookmark.
    ///
    /// # Errors
    ///
    /// Returns [`BlewatchError::TrackerStopped`] if the worker is gone.
    pub async fn unbookmark(&self, peripheral_id: &str) -> Result<bool> {
        let peripheral_id = peripheral_id.to_string();
        self.request(|reply| Command::Unbookmark {
            peripheral_id,
            reply,
        })
        .await
    }

    /// Inspector lines for a live peripheral.
    ///
    /// # Errors
    ///
    /// Returns [`BlewatchError::TrackerStopped`] if the worker is gone.
    pub async fn describe(&self, peripheral_id: &str) -> Result<Option<Vec<String>>> {
        let peripheral_id = peripheral_id.to_string();
        self.request(|reply| Command::Describe {
            peripheral_id,
            reply,
        })
        .await
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// A receiver notified after every mutation batch.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| BlewatchError::TrackerStopped)?;
        response.await.map_err(|_| BlewatchError::TrackerStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertisement::AdvertisementPayload;
    use crate::registry::ManufacturerRegistry;
    use crate::settings::MemorySettings;

    fn tracker() -> DeviceTracker {
        let registry = Arc::new(ManufacturerRegistry::from_entries([(0x0075, "Samsung")]));
        DeviceTracker::new(
            ObservationStore::open(Box::new(MemorySettings::new())),
            IdentityResolver::new(registry),
        )
    }

    fn airtag(id: &str, rssi: i16) -> ScanEvent {
        ScanEvent::Discovered(Advertisement::new(id, rssi).with_payload(
            AdvertisementPayload::new().with_manufacturer_data([0x4C, 0x00, 0x12, 0x19]),
        ))
    }

    fn named(id: &str, name: &str, rssi: i16) -> ScanEvent {
        ScanEvent::Discovered(Advertisement::new(id, rssi).with_raw_name(name))
    }

    #[test]
    fn test_power_on_requests_duplicate_reporting() {
        let mut tracker = tracker();
        assert_eq!(
            tracker.handle_event(ScanEvent::Radio(RadioState::PoweredOn)),
            Some(ScanRequest {
                allow_duplicates: true
            })
        );
        assert_eq!(tracker.handle_event(named("a", "A", -50)), None);
    }

    #[test]
    fn test_power_off_and_unavailable_clear_live() {
        for state in [RadioState::PoweredOff, RadioState::Unavailable] {
            let mut tracker = tracker();
            tracker.handle_event(named("a", "A", -50));
            tracker.bookmark("a");
            tracker.handle_event(ScanEvent::Radio(state));

            let snapshot = tracker.snapshot();
            assert!(snapshot.live.is_empty());
            assert_eq!(snapshot.saved.len(), 1);
            assert_eq!(snapshot.saved[0].online, None);
        }
    }

    #[test]
    fn test_snapshot_sorted_and_resolved() {
        let mut tracker = tracker();
        tracker.handle_batch([
            named("weak", "Speaker", -85),
            airtag("tag", -40),
            named("mid", "Bob's Phone", -65),
        ]);

        let snapshot = tracker.snapshot();
        let names: Vec<&str> = snapshot
            .live
            .iter()
            .map(|d| d.display_name.as_str())
            .collect();
        assert_eq!(names, ["Apple AirTag", "Bob's Phone", "Speaker"]);
        assert_eq!(snapshot.live[0].distance, Distance::Near);
        assert_eq!(snapshot.live[1].distance, Distance::Moderate);
        assert_eq!(snapshot.live[2].distance, Distance::VeryFar);
    }

    #[test]
    fn test_bookmark_uses_resolved_name_and_partitions() {
        let mut tracker = tracker();
        tracker.handle_batch([airtag("tag", -40), named("other", "Lamp", -70)]);

        assert!(tracker.bookmark("tag"));
        assert!(tracker.is_bookmarked("tag"));

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.saved[0].device.name, "Apple AirTag");
        assert_eq!(
            snapshot.saved[0].online,
            Some(LiveSignal {
                rssi: -40,
                distance: Distance::Near
            })
        );
        let mine: Vec<_> = snapshot
            .nearby_bookmarked()
            .map(|d| d.peripheral_id.as_str())
            .collect();
        let others: Vec<_> = snapshot
            .others()
            .map(|d| d.peripheral_id.as_str())
            .collect();
        assert_eq!(mine, ["tag"]);
        assert_eq!(others, ["other"]);
    }

    #[test]
    fn test_bookmark_of_unseen_device_is_unknown() {
        let mut tracker = tracker();
        assert!(tracker.bookmark("ghost"));
        assert_eq!(tracker.snapshot().saved[0].device.name, "Unknown Device");
    }

    #[test]
    fn test_subscribers_see_every_batch() {
        let mut tracker = tracker();
        let mut rx = tracker.subscribe();
        let start = rx.borrow_and_update().revision;

        tracker.handle_batch([named("a", "A", -50), named("b", "B", -60)]);
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.revision, start + 1);
        assert_eq!(snapshot.live.len(), 2);

        // no-op bookmark removal publishes nothing
        tracker.unbookmark("missing");
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_batch_flushes_last_seen() {
        let mut tracker = tracker();
        tracker.bookmark("tag");
        tracker.handle_batch([airtag("tag", -40), airtag("tag", -42), airtag("tag", -41)]);

        assert!(!tracker.store().is_dirty());
        assert!(tracker.store().saved()[0].last_seen_date.is_some());
    }

    #[test]
    fn test_resolve_and_distance_passthrough() {
        let tracker = tracker();
        assert_eq!(
            tracker.resolve_name(None, None, Some(&[0x75, 0x00])),
            "Samsung"
        );
        assert_eq!(tracker.estimate_distance(-75), Distance::Far);
    }

    #[tokio::test]
    async fn test_worker_processes_commands_in_order() {
        let worker = TrackerWorker::spawn(tracker());
        let handle = worker.handle();

        let request = handle
            .send_event(ScanEvent::Radio(RadioState::PoweredOn))
            .await
            .unwrap();
        assert_eq!(request.map(|r| r.allow_duplicates), Some(true));

        handle
            .send_batch(vec![airtag("tag", -45), named("x", "X", -75)])
            .await
            .unwrap();
        assert!(handle.bookmark("tag", None).await.unwrap());
        assert!(!handle.bookmark("tag", Some("renamed")).await.unwrap());
        assert!(handle.describe("tag").await.unwrap().is_some());
        assert!(handle.describe("nope").await.unwrap().is_none());

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.live.len(), 2);
        assert_eq!(snapshot.saved[0].device.name, "Apple AirTag");

        let tracker = worker.shutdown().await.unwrap();
        assert!(tracker.is_bookmarked("tag"));
    }

    #[tokio::test]
    async fn test_worker_notifies_subscribers() {
        let worker = TrackerWorker::spawn(tracker());
        let handle = worker.handle();
        let mut rx = handle.subscribe();
        rx.borrow_and_update();

        handle.send_event(named("a", "A", -50)).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().live.len(), 1);

        worker.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_errors_after_shutdown() {
        let worker = TrackerWorker::spawn(tracker());
        let handle = worker.handle();
        worker.shutdown().await.unwrap();

        let err = handle.send_event(named("a", "A", -50)).await.unwrap_err();
        assert!(matches!(err, BlewatchError::TrackerStopped));
    }

    #[tokio::test]
    async fn test_empty_bookmark_id_is_rejected() {
        let worker = TrackerWorker::spawn(tracker());
        let err = worker.handle().bookmark("", None).await.unwrap_err();
        assert!(err.is_input_error());
        worker.shutdown().await.unwrap();
    }
}
