//! Advertisement payload model.
//!
//! A scan callback delivers a peripheral identifier, the peripheral's self-reported name,
//! a signal strength and a key/value advertisement dictionary. Only two keys matter for
//! identification ([`MANUFACTURER_DATA_KEY`] and [`LOCAL_NAME_KEY`]) but the whole
//! dictionary is kept so an inspector can show it verbatim.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use data_encoding::{DecodeError, HEXUPPER, HEXUPPER_PERMISSIVE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payload key holding manufacturer specific data bytes.
pub const MANUFACTURER_DATA_KEY: &str = "kCBAdvDataManufacturerData";

/// Payload key holding the advertised local name.
pub const LOCAL_NAME_KEY: &str = "kCBAdvDataLocalName";

/// Errors produced while decoding advertisement input.
#[derive(Debug, Error)]
pub enum AdvertisementError {
    /// Text that should have been hexadecimal bytes was not.
    #[error("Invalid hex '{input}': {source}")]
    InvalidHex {
        /// The offending input.
        input: String,
        /// Decoder failure.
        #[source]
        source: DecodeError,
    },
}

/// One value of the advertisement dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvertisementValue {
    /// Raw bytes (manufacturer data, service data).
    Bytes(Vec<u8>),
    /// A string (local name).
    Text(String),
    /// A number (tx power level).
    Number(f64),
    /// A boolean (connectable flag).
    Flag(bool),
}

impl std::fmt::Display for AdvertisementValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes(bytes) => write!(f, "[{}]", spaced_hex(bytes)),
            Self::Text(text) => f.write_str(text),
            Self::Number(n) => write!(f, "{n}"),
            Self::Flag(b) => write!(f, "{b}"),
        }
    }
}

/// Key/value advertisement dictionary, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvertisementPayload(BTreeMap<String, AdvertisementValue>);

impl AdvertisementPayload {
    /// An empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: AdvertisementValue) {
        self.0.insert(key.into(), value);
    }

    /// Builder-style setter for manufacturer data.
    #[must_use]
    pub fn with_manufacturer_data(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(MANUFACTURER_DATA_KEY, AdvertisementValue::Bytes(bytes.into()));
        self
    }

    /// Builder-style setter for the local name.
    #[must_use]
    pub fn with_local_name(mut self, name: impl Into<String>) -> Self {
        self.insert(LOCAL_NAME_KEY, AdvertisementValue::Text(name.into()));
        self
    }

    /// Look up any value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AdvertisementValue> {
        self.0.get(key)
    }

    /// Manufacturer data bytes, if present and of the right kind.
    #[must_use]
    pub fn manufacturer_data(&self) -> Option<&[u8]> {
        match self.0.get(MANUFACTURER_DATA_KEY) {
            Some(AdvertisementValue::Bytes(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// Advertised local name, if present and of the right kind.
    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        match self.0.get(LOCAL_NAME_KEY) {
            Some(AdvertisementValue::Text(name)) => Some(name),
            _ => None,
        }
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AdvertisementValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single advertisement as delivered by the scanning subsystem.
#[derive(Debug, Clone, PartialEq)]
pub struct Advertisement {
    /// Platform-assigned peripheral identifier, stable for the session.
    pub peripheral_id: String,
    /// The peripheral's self-reported name.
    pub raw_name: Option<String>,
    /// Advertisement dictionary.
    pub payload: AdvertisementPayload,
    /// Received signal strength in dBm.
    pub rssi: i16,
}

impl Advertisement {
    /// Create an advertisement with an empty payload and no name.
    pub fn new(peripheral_id: impl Into<String>, rssi: i16) -> Self {
        Self {
            peripheral_id: peripheral_id.into(),
            raw_name: None,
            payload: AdvertisementPayload::new(),
            rssi,
        }
    }

    /// Set the self-reported name.
    #[must_use]
    pub fn with_raw_name(mut self, name: impl Into<String>) -> Self {
        self.raw_name = Some(name.into());
        self
    }

    /// Replace the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: AdvertisementPayload) -> Self {
        self.payload = payload;
        self
    }

    /// Manufacturer data bytes from the payload.
    #[must_use]
    pub fn manufacturer_data(&self) -> Option<&[u8]> {
        self.payload.manufacturer_data()
    }

    /// Local name from the payload.
    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        self.payload.local_name()
    }

    /// Company identifier decoded from the manufacturer data.
    #[must_use]
    pub fn company_id(&self) -> Option<u16> {
        self.manufacturer_data().and_then(company_id)
    }

    /// Human-readable lines describing this advertisement for a device inspector.
    ///
    /// Payload entries appear in key order. Manufacturer data additionally gets its
    /// decoded company identifier and the contiguous hex string.
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Name: {}", self.raw_name.as_deref().unwrap_or("Unknown")),
            format!("Identifier: {}", self.peripheral_id),
            format!("RSSI: {}", self.rssi),
        ];

        for (key, value) in self.payload.iter() {
            lines.push(format!("{key}: {value}"));

            if let (MANUFACTURER_DATA_KEY, AdvertisementValue::Bytes(bytes)) = (key, value) {
                if let Some(id) = company_id(bytes) {
                    lines.push(format!("  Company ID (LE): 0x{id:04X}"));
                    lines.push(format!("  Full Little-E: {}", HEXUPPER.encode(bytes)));
                }
            }
        }

        lines
    }
}

/// Decode the little-endian company identifier from manufacturer data.
///
/// Returns `None` when fewer than two bytes are present.
#[must_use]
pub fn company_id(manufacturer_data: &[u8]) -> Option<u16> {
    match manufacturer_data {
        [lo, hi, ..] => Some(u16::from_le_bytes([*lo, *hi])),
        _ => None,
    }
}

/// Parse hex text such as `"4C 00 12 19"` or `"4c001219"` into bytes.
///
/// # Errors
///
/// Returns [`AdvertisementError::InvalidHex`] for odd-length input or non-hex digits.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, AdvertisementError> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    HEXUPPER_PERMISSIVE
        .decode(compact.as_bytes())
        .map_err(|source| AdvertisementError::InvalidHex {
            input: input.to_string(),
            source,
        })
}

/// Uppercase hex with a space between bytes, e.g. `4C 00 12 19`.
fn spaced_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{b:02X}");
    }
    out
}
