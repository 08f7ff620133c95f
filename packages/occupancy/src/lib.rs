#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parking occupancy tracking and session billing.
//!
//! A [`LotMonitor`](monitor::LotMonitor) owns the per-space state of one
//! parking lot. Each frame it takes the occupancy verdicts resolved by
//! [`lot_monitor_spatial`], applies the four-case transition table to every
//! space, turns closed occupancy sessions into rounded invoices and keeps
//! lot-wide totals (cars served, occupied minutes, revenue).
//!
//! Lots never share state. The [`LotRegistry`](registry::LotRegistry) maps
//! lot ids to independently locked monitors so separate lots can be
//! processed in parallel while frames of the same lot stay sequential.
//!
//! Everything here is synchronous and in-memory. Frame acquisition and
//! inference live behind the [`Detector`](detector::Detector) trait and must
//! hand over a complete detection list per frame. Open sessions are lost if
//! the process restarts.

pub mod aggregates;
pub mod config;
pub mod detector;
pub mod invoice;
pub mod monitor;
pub mod registry;
pub mod state;

use lot_monitor_occupancy_models::{LotId, SpaceId};
use lot_monitor_spatial::LayoutError;

pub use aggregates::{LotAggregates, LotSnapshot};
pub use config::{BillingPolicy, LotConfig};
pub use detector::{Detector, RecordedDetector};
pub use invoice::{calc_invoice, round_invoice};
pub use monitor::LotMonitor;
pub use registry::LotRegistry;
pub use state::{SpaceState, Transition};

/// Errors that prevent a monitoring session from being created.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// The space layout is missing or invalid.
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    /// No hourly price was configured for the lot.
    #[error("Lot {lot_id} has no price_per_hour")]
    MissingPrice {
        /// Lot the configuration belongs to.
        lot_id: LotId,
    },

    /// The hourly price is zero, negative or not a finite number.
    #[error("Invalid price_per_hour {price}: must be a positive finite number")]
    InvalidPrice {
        /// The rejected price.
        price: f64,
    },

    /// `ticks_per_minute` was zero.
    #[error("ticks_per_minute must be at least 1")]
    InvalidTickRate,

    /// The TOML configuration could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort a single frame cycle.
///
/// A frame that fails leaves every space and aggregate untouched.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The verdict list does not have one entry per configured space.
    #[error("Expected {expected} occupancy verdicts, got {actual}")]
    VerdictCount {
        /// Number of configured spaces.
        expected: usize,
        /// Number of verdicts supplied.
        actual: usize,
    },

    /// A configured space has no verdict.
    #[error("No occupancy verdict for space {space_id}")]
    MissingVerdict {
        /// The uncovered space.
        space_id: SpaceId,
    },

    /// A verdict names a space that is not configured.
    #[error("Occupancy verdict for unknown space {space_id}")]
    UnknownSpace {
        /// The unrecognized id.
        space_id: SpaceId,
    },

    /// The detector failed to produce detections for the frame.
    #[error("Detector error: {0}")]
    Detector(Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from [`LotRegistry`] operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No monitoring session exists for the lot. Sessions are only created
    /// by annotating the lot.
    #[error("Lot {lot_id} has no monitoring session, annotate it first")]
    UnknownLot {
        /// The requested lot.
        lot_id: LotId,
    },

    /// A previous frame for this lot panicked while holding its lock.
    #[error("Monitoring session for lot {lot_id} is poisoned")]
    Poisoned {
        /// The affected lot.
        lot_id: LotId,
    },

    /// The lot table itself is poisoned.
    #[error("Lot registry lock poisoned")]
    RegistryPoisoned,

    /// The session could not be created.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The frame was rejected.
    #[error(transparent)]
    Frame(#[from] FrameError),
}
