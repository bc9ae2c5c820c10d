//! # blewatch
//!
//! Identify nearby BLE peripherals, estimate their distance and keep track of
//! bookmarked ones.
//!
//! ## Running
//!
//! ```bash
//! # Replay a recorded scan, inspecting one peripheral
//! blewatch replay scans/kitchen.jsonl --inspect 5E1F
//!
//! # Bookmarks
//! blewatch bookmark 5E1F "Keys"
//! blewatch saved
//!
//! # One-off queries
//! blewatch resolve --manufacturer-data 4C001219
//! blewatch distance -- -67
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use blewatch_cli::{logging, read_recording, render_live, render_saved, RenderThrottle};
use blewatch_core::{
    estimate_distance, parse_hex, Config, DeviceTracker, IdentityResolver, ManufacturerRegistry,
    ObservationStore, Snapshot, TrackerWorker,
};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// path to a config file (default: platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// directory holding saved devices, overrides config
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed a JSON Lines scan recording through the tracker
    Replay {
        /// recording file
        file: PathBuf,

        /// print the advertisement inspector for this peripheral at the end
        #[arg(short, long)]
        inspect: Option<String>,

        /// delay between events, to watch the list update
        #[arg(long, default_value_t = 0)]
        pace_ms: u64,
    },
    /// List saved devices
    Saved,
    /// Save a device
    Bookmark {
        /// peripheral identifier
        id: String,
        /// name to save it under
        name: Option<String>,
    },
    /// Remove a saved device
    Unbookmark {
        /// peripheral identifier
        id: String,
    },
    /// Resolve a display name from advertisement fields
    Resolve {
        #[arg(long)]
        raw_name: Option<String>,
        #[arg(long)]
        local_name: Option<String>,
        /// manufacturer data as hex, e.g. 4C001219
        #[arg(long)]
        manufacturer_data: Option<String>,
    },
    /// Estimate distance for a signal strength in dBm
    Distance {
        #[arg(allow_hyphen_values = true)]
        rssi: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }

    logging::init(&config.log, config.data_dir.as_deref())?;
    debug!(?config, "Configuration loaded");

    match cli.command {
        Command::Replay {
            file,
            inspect,
            pace_ms,
        } => replay(&config, file, inspect, Duration::from_millis(pace_ms)).await,
        Command::Saved => {
            let tracker = tracker(&config)?;
            print!("{}", render_saved(&tracker.snapshot()));
            Ok(())
        }
        Command::Bookmark { id, name } => bookmark(&config, &id, name.as_deref()).await,
        Command::Unbookmark { id } => {
            let mut tracker = tracker(&config)?;
            if tracker.unbookmark(&id) {
                println!("Removed {id}");
            } else {
                println!("{id} was not saved");
            }
            Ok(())
        }
        Command::Resolve {
            raw_name,
            local_name,
            manufacturer_data,
        } => {
            let data = manufacturer_data
                .as_deref()
                .map(parse_hex)
                .transpose()
                .context("parsing manufacturer data")?;
            let resolver = IdentityResolver::new(Arc::new(config.registry()));
            println!(
                "{}",
                resolver.resolve_name(raw_name.as_deref(), local_name.as_deref(), data.as_deref())
            );
            Ok(())
        }
        Command::Distance { rssi } => {
            println!("{}", estimate_distance(rssi));
            Ok(())
        }
    }
}

fn tracker(config: &Config) -> anyhow::Result<DeviceTracker> {
    let settings = config.settings().context("locating data directory")?;
    let registry: Arc<ManufacturerRegistry> = Arc::new(config.registry());
    info!(
        companies = registry.len(),
        data_dir = %settings.data_dir().display(),
        "Tracker ready"
    );
    Ok(DeviceTracker::new(
        ObservationStore::open(Box::new(settings)),
        IdentityResolver::new(registry),
    ))
}

async fn bookmark(config: &Config, id: &str, name: Option<&str>) -> anyhow::Result<()> {
    let worker = TrackerWorker::spawn(tracker(config)?);
    let created = worker.handle().bookmark(id, name).await?;
    let tracker = worker.shutdown().await?;

    if created {
        let saved = tracker
            .store()
            .saved()
            .iter()
            .find(|d| d.id == id)
            .map_or("", |d| d.name.as_str());
        println!("Saved {id} as \"{saved}\"");
    } else {
        println!("{id} is already saved");
    }
    Ok(())
}

async fn replay(
    config: &Config,
    file: PathBuf,
    inspect: Option<String>,
    pace: Duration,
) -> anyhow::Result<()> {
    let reader = BufReader::new(
        File::open(&file).with_context(|| format!("opening {}", file.display()))?,
    );
    let events = read_recording(reader)?;
    info!(file = %file.display(), events = events.len(), "Replaying recording");

    let worker = TrackerWorker::spawn(tracker(config)?);
    let handle = worker.handle();
    let renderer = tokio::spawn(render_loop(handle.subscribe(), config.render_interval()));

    for event in events {
        if let Some(request) = handle.send_event(event).await? {
            debug!(allow_duplicates = request.allow_duplicates, "Scan requested");
        }
        if !pace.is_zero() {
            tokio::time::sleep(pace).await;
        }
    }

    let inspected = match &inspect {
        Some(id) => Some((id.clone(), handle.describe(id).await?)),
        None => None,
    };
    let last = handle.snapshot();

    drop(handle);
    worker.shutdown().await?;
    renderer.await?;

    println!("{}", render_live(&last));
    print!("{}", render_saved(&last));

    if let Some((id, lines)) = inspected {
        println!();
        match lines {
            Some(lines) => lines.iter().for_each(|line| println!("{line}")),
            None => println!("{id} is not in range"),
        }
    }
    Ok(())
}

/// Print the live view whenever a snapshot arrives and the throttle allows it.
async fn render_loop(mut snapshots: watch::Receiver<Arc<Snapshot>>, interval: Duration) {
    let mut throttle = RenderThrottle::new(interval);
    while snapshots.changed().await.is_ok() {
        let snapshot = Arc::clone(&snapshots.borrow_and_update());
        if throttle.should_render(Instant::now()) {
            println!("{}", render_live(&snapshot));
        }
    }
}
