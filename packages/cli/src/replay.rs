//! Offline replay of recorded detections through a lot registry.
//!
//! A replay config lists lots in TOML. Each entry is a lot configuration
//! plus its annotation file and a JSON Lines detection recording:
//!
//! ```toml
//! [[lot]]
//! id = "north"
//! price_per_hour = 6000
//! annotations = "north_spaces.json"
//! detections = "north_frames.jsonl"
//! ```
//!
//! Relative paths are resolved against the config file's directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use lot_monitor_occupancy::detector::RecordedFramesError;
use lot_monitor_occupancy::{LotConfig, LotRegistry, LotSnapshot, RecordedDetector, RegistryError};
use lot_monitor_occupancy_models::{LotId, SpaceAnnotation};
use serde::Deserialize;

/// Errors that stop a replay.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// A file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The replay config is not valid TOML.
    #[error("Invalid replay config: {0}")]
    Toml(#[from] toml::de::Error),

    /// An annotation file is not a JSON array of polygons.
    #[error("Invalid annotations in {path}: {source}")]
    Annotations {
        /// File that failed.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Two entries share a lot id.
    #[error("Lot {lot_id} is listed more than once")]
    DuplicateLot {
        /// The repeated id.
        lot_id: LotId,
    },

    /// A detection recording could not be loaded.
    #[error(transparent)]
    Recording(#[from] RecordedFramesError),

    /// A lot could not be created or a frame was rejected.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A snapshot could not be written out.
    #[error("Failed to serialize snapshot: {0}")]
    Json(#[from] serde_json::Error),

    /// The worker replaying a lot panicked.
    #[error("Replay of lot {lot_id} panicked")]
    Panicked {
        /// Lot whose worker panicked.
        lot_id: LotId,
    },
}

/// Lots to replay.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    /// One entry per lot.
    #[serde(rename = "lot", default)]
    pub lots: Vec<ReplayLot>,
}

/// A lot together with its recorded inputs.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayLot {
    /// Lot configuration.
    #[serde(flatten)]
    pub config: LotConfig,
    /// JSON annotation file.
    pub annotations: PathBuf,
    /// JSON Lines detection recording.
    pub detections: PathBuf,
}

impl ReplayConfig {
    /// Parses a replay config, resolving relative paths against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Toml`] if the TOML is malformed.
    pub fn from_toml_str(toml_str: &str, base_dir: &Path) -> Result<Self, ReplayError> {
        let mut config: Self = toml::de::from_str(toml_str)?;
        for lot in &mut config.lots {
            lot.annotations = base_dir.join(&lot.annotations);
            lot.detections = base_dir.join(&lot.detections);
        }
        Ok(config)
    }

    /// Reads a replay config from disk.
    ///
    /// # Errors
    ///
    /// Returns a [`ReplayError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let base_dir = path.parent().unwrap_or(Path::new(""));
        Self::from_toml_str(&read(path)?, base_dir)
    }
}

/// Replays every lot on its own thread and returns the final snapshots in
/// config order.
///
/// Lots are all registered before any frame is replayed, so a bad
/// annotation or recording fails the run up front. `on_frame` is called
/// with the snapshot of every processed frame, possibly from several
/// threads at once.
///
/// # Errors
///
/// Returns the first [`ReplayError`] encountered.
pub fn run<F>(config: &ReplayConfig, on_frame: F) -> Result<Vec<LotSnapshot>, ReplayError>
where
    F: Fn(&LotSnapshot) -> Result<(), ReplayError> + Sync,
{
    let registry = LotRegistry::new();
    let mut seen = BTreeSet::new();
    let mut recordings = Vec::with_capacity(config.lots.len());

    for lot in &config.lots {
        let lot_id = lot.config.id.clone();
        if !seen.insert(lot_id.clone()) {
            return Err(ReplayError::DuplicateLot { lot_id });
        }

        registry.annotate(&lot.config, load_annotations(&lot.annotations)?)?;
        recordings.push((lot_id, RecordedDetector::load(&lot.detections)?));
    }

    let registry = &registry;
    let on_frame = &on_frame;

    std::thread::scope(|scope| {
        let workers: Vec<_> = recordings
            .into_iter()
            .map(|(lot_id, mut detector)| {
                let worker_lot = lot_id.clone();
                let handle = scope
                    .spawn(move || replay_lot(registry, &worker_lot, &mut detector, on_frame));
                (lot_id, handle)
            })
            .collect();

        workers
            .into_iter()
            .map(|(lot_id, handle)| {
                handle
                    .join()
                    .map_err(|_| ReplayError::Panicked { lot_id })?
            })
            .collect()
    })
}

fn replay_lot<F>(
    registry: &LotRegistry,
    lot_id: &LotId,
    detector: &mut RecordedDetector,
    on_frame: &F,
) -> Result<LotSnapshot, ReplayError>
where
    F: Fn(&LotSnapshot) -> Result<(), ReplayError>,
{
    log::info!("Replaying {} frames for lot {lot_id}", detector.len());

    for frame in 0..detector.len() {
        let snapshot = registry.process_frame(lot_id, detector, &frame)?;
        on_frame(&snapshot)?;
    }

    let snapshot = registry.snapshot(lot_id)?;
    log::info!(
        "Lot {lot_id} done: {} cars served, {} occupied minutes, revenue {}",
        snapshot.aggregates.total_cars_served(),
        snapshot.aggregates.total_occupied_minutes(),
        snapshot.aggregates.total_revenue()
    );
    Ok(snapshot)
}

fn load_annotations(path: &Path) -> Result<Vec<SpaceAnnotation>, ReplayError> {
    serde_json::from_str(&read(path)?).map_err(|source| ReplayError::Annotations {
        path: path.to_path_buf(),
        source,
    })
}

fn read(path: &Path) -> Result<String, ReplayError> {
    std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })
}
