//! JSON Lines scan recordings.
//!
//! Each non-empty line is one [`RecordedEvent`]:
//!
//! ```text
//! {"type":"radio","state":"powered_on"}
//! {"type":"advertisement","id":"5E1F","rssi":-48,"manufacturer_data":"4C001219"}
//! {"type":"advertisement","id":"9A02","name":"Kitchen Speaker","rssi":-77}
//! ```
//!
//! Lines starting with `#` are comments.

use std::io::{BufRead, Write};

use blewatch_core::{parse_hex, Advertisement, AdvertisementPayload, RadioState, ScanEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from reading or writing a recording.
#[derive(Debug, Error)]
pub enum RecordingError {
    /// A line is not a valid event.
    #[error("line {line}: {source}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The manufacturer data is not hex.
    #[error("line {line}: {source}")]
    Payload {
        /// 1-based line number.
        line: usize,
        /// Underlying decode error.
        #[source]
        source: blewatch_core::BlewatchError,
    },

    /// Reading or writing failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Encoding an event failed.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// Radio state as written in recordings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordedRadio {
    /// Radio on.
    PoweredOn,
    /// Radio off.
    PoweredOff,
    /// Unsupported, unauthorized or resetting.
    Unavailable,
}

impl From<RecordedRadio> for RadioState {
    fn from(state: RecordedRadio) -> Self {
        match state {
            RecordedRadio::PoweredOn => Self::PoweredOn,
            RecordedRadio::PoweredOff => Self::PoweredOff,
            RecordedRadio::Unavailable => Self::Unavailable,
        }
    }
}

/// One line of a recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordedEvent {
    /// Radio state change.
    Radio {
        /// New state.
        state: RecordedRadio,
    },
    /// A received advertisement.
    Advertisement {
        /// Peripheral identifier.
        id: String,
        /// Name the peripheral reported for itself.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Signal strength in dBm.
        rssi: i16,
        /// Manufacturer data as hex.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        manufacturer_data: Option<String>,
        /// Advertised local name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        local_name: Option<String>,
    },
}

impl RecordedEvent {
    /// Convert into the event the tracker consumes.
    ///
    /// # Errors
    ///
    /// Returns an error if `manufacturer_data` is not valid hex.
    pub fn into_scan_event(self) -> blewatch_core::Result<ScanEvent> {
        match self {
            Self::Radio { state } => Ok(ScanEvent::Radio(state.into())),
            Self::Advertisement {
                id,
                name,
                rssi,
                manufacturer_data,
                local_name,
            } => {
                let mut payload = AdvertisementPayload::new();
                if let Some(hex) = manufacturer_data {
                    payload = payload.with_manufacturer_data(parse_hex(&hex)?);
                }
                if let Some(local) = local_name {
                    payload = payload.with_local_name(local);
                }
                let mut advertisement = Advertisement::new(id, rssi).with_payload(payload);
                if let Some(name) = name {
                    advertisement = advertisement.with_raw_name(name);
                }
                Ok(ScanEvent::Discovered(advertisement))
            }
        }
    }
}

/// Parse one line. `Ok(None)` for blank lines and comments.
///
/// # Errors
///
/// Returns an error for malformed JSON or manufacturer data.
pub fn parse_line(line: &str, number: usize) -> Result<Option<ScanEvent>, RecordingError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let recorded: RecordedEvent =
        serde_json::from_str(trimmed).map_err(|source| RecordingError::Parse {
            line: number,
            source,
        })?;
    recorded
        .into_scan_event()
        .map(Some)
        .map_err(|source| RecordingError::Payload {
            line: number,
            source,
        })
}

/// Read every event from a recording, skipping lines that do not parse.
///
/// # Errors
///
/// Returns an error only if the reader itself fails.
pub fn read_recording(reader: impl BufRead) -> Result<Vec<ScanEvent>, RecordingError> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        match parse_line(&line, index + 1) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Skipping recording line"),
        }
    }
    debug!(count = events.len(), "Recording loaded");
    Ok(events)
}

/// Append events as JSON Lines.
///
/// # Errors
///
/// Returns an error if encoding or writing fails.
pub fn write_recording(
    writer: &mut impl Write,
    events: &[RecordedEvent],
) -> Result<(), RecordingError> {
    for event in events {
        serde_json::to_writer(&mut *writer, event)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}
