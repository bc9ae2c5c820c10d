//! # blewatch-cli
//!
//! Terminal front end for blewatch.
//!
//! - [`logging`] - subscriber setup
//! - [`recording`] - JSON Lines scan recordings fed to the tracker
//! - [`render`] - text views of tracker snapshots
//! - [`throttle`] - render rate limiting

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod logging;
pub mod recording;
pub mod render;
pub mod throttle;

pub use recording::{read_recording, RecordedEvent, RecordingError};
pub use render::{render_live, render_saved};
pub use throttle::RenderThrottle;
