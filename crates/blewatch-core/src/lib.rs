//! # blewatch-core
//!
//! Core logic for identifying nearby Bluetooth Low Energy peripherals.
//!
//! This crate provides:
//! - Display-name resolution from manufacturer data, local names and self-reported names
//! - RSSI-based distance estimation
//! - Live observation tracking and persistent bookmarks keyed by peripheral identifier
//! - A single-writer tracker task publishing immutable snapshots
//!
//! ## Architecture
//!
//! - [`registry`] - Bluetooth SIG company identifier table
//! - [`advertisement`] - Advertisement payload model and inspector output
//! - [`identity`] - Display-name resolution and Apple product classification
//! - [`proximity`] - RSSI to distance buckets
//! - [`saved`] - Bookmarked devices and their JSON form
//! - [`settings`] - Key/value persistence backends
//! - [`store`] - Live observations and bookmarks
//! - [`tracker`] - Composition root, snapshots and the worker task
//! - [`config`] - Layered configuration
//! - [`error`] - Unified error types
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use blewatch_core::{
//!     Advertisement, AdvertisementPayload, DeviceTracker, IdentityResolver,
//!     ManufacturerRegistry, MemorySettings, ObservationStore, ScanEvent,
//! };
//!
//! let resolver = IdentityResolver::new(Arc::new(ManufacturerRegistry::bundled()));
//! let store = ObservationStore::open(Box::new(MemorySettings::new()));
//! let mut tracker = DeviceTracker::new(store, resolver);
//!
//! tracker.handle_event(ScanEvent::Discovered(
//!     Advertisement::new("5E1F", -48).with_payload(
//!         AdvertisementPayload::new().with_manufacturer_data([0x4C, 0x00, 0x12, 0x19]),
//!     ),
//! ));
//!
//! let snapshot = tracker.snapshot();
//! assert_eq!(snapshot.live[0].display_name, "Apple AirTag");
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod advertisement;
pub mod config;
pub mod error;
pub mod identity;
pub mod proximity;
pub mod registry;
pub mod saved;
pub mod settings;
pub mod store;
pub mod tracker;

// Re-export primary types for convenience
pub use advertisement::{
    company_id, parse_hex, Advertisement, AdvertisementPayload, AdvertisementValue,
    LOCAL_NAME_KEY, MANUFACTURER_DATA_KEY,
};
pub use crate::config::{default_config_path, Config, ConfigError, ConfigResult, LogConfig};
pub use error::{BlewatchError, Result};
pub use identity::{classify_apple, AppleProduct, IdentityResolver, APPLE_COMPANY_ID};
pub use proximity::{estimate_distance, Distance};
pub use registry::ManufacturerRegistry;
pub use saved::SavedDevice;
pub use settings::{
    default_data_dir, JsonFileSettings, MemorySettings, SettingsError, SettingsStore,
    SAVED_DEVICES_KEY,
};
pub use store::{ObservationStore, ObservedDevice};
pub use tracker::{
    DeviceTracker, LiveDevice, LiveSignal, RadioState, ScanEvent, ScanRequest, SavedStatus,
    Snapshot, TrackerHandle, TrackerWorker,
};
