//! Plain-text views of a [`Snapshot`].

use std::fmt::Write;

use blewatch_core::{LiveDevice, SavedStatus, Snapshot};
use chrono::{DateTime, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// The live view: bookmarked devices in range, then everything else.
#[must_use]
pub fn render_live(snapshot: &Snapshot) -> String {
    let mut out = String::new();

    let mine: Vec<&LiveDevice> = snapshot.nearby_bookmarked().collect();
    if !mine.is_empty() {
        out.push_str("My Devices Nearby\n");
        for device in mine {
            push_row(&mut out, device);
        }
        out.push('\n');
    }

    let others: Vec<&LiveDevice> = snapshot.others().collect();
    out.push_str("Devices Nearby\n");
    let _ = writeln!(out, "Devices found: {}", others.len());
    for device in others {
        push_row(&mut out, device);
    }
    out
}

/// The bookmarks view with online state and dates.
#[must_use]
pub fn render_saved(snapshot: &Snapshot) -> String {
    if snapshot.saved.is_empty() {
        return "No devices saved yet\n".to_string();
    }

    let mut out = String::from("Saved Devices\n");
    for status in &snapshot.saved {
        push_saved(&mut out, status);
    }
    out
}

fn push_row(out: &mut String, device: &LiveDevice) {
    let _ = writeln!(
        out,
        "  {}\n    RSSI: {}, Est. Distance: {}",
        device.display_name,
        device.rssi,
        device.distance.label()
    );
}

fn push_saved(out: &mut String, status: &SavedStatus) {
    let device = &status.device;
    let _ = writeln!(out, "  {} [{}]", device.name, device.id);
    match status.online {
        Some(signal) => {
            let _ = writeln!(
                out,
                "    Online - RSSI: {}, Est. Distance: {}",
                signal.rssi,
                signal.distance.label()
            );
        }
        None => out.push_str("    Offline / Not detected\n"),
    }
    let _ = writeln!(out, "    Added: {}", format_date(&device.added_date));
    if let Some(seen) = &device.last_seen_date {
        let _ = writeln!(out, "    Last seen: {}", format_date(seen));
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}
