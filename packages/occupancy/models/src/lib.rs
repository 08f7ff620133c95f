#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parking space, detection and per-spot report types.
//!
//! These are the plain serializable records passed between the detector,
//! the space geometry resolver and the occupancy state machine. They carry
//! no behavior beyond small derived values (box centroids, id/index
//! conversions).

use serde::{Deserialize, Serialize};

/// Identifier of a monitored parking lot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LotId(String);

impl LotId {
    /// Creates a lot identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LotId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for LotId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Stable 1-based identifier of a parking space within one lot.
///
/// Assigned in layout order (top-to-bottom, left-to-right) and never
/// reused while the layout is alive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "usize", into = "usize")]
pub struct SpaceId(usize);

impl SpaceId {
    /// Creates a space id, returning `None` for `0`.
    #[must_use]
    pub const fn new(id: usize) -> Option<Self> {
        if id == 0 { None } else { Some(Self(id)) }
    }

    /// The id of the space stored at zero-based `index` in a layout.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index + 1)
    }

    /// Zero-based position of this space in its layout.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 - 1
    }

    /// Returns the numeric id.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl TryFrom<usize> for SpaceId {
    type Error = &'static str;

    fn try_from(id: usize) -> Result<Self, Self::Error> {
        Self::new(id).ok_or("space ids start at 1")
    }
}

impl From<SpaceId> for usize {
    fn from(id: SpaceId) -> Self {
        id.0
    }
}

impl std::fmt::Display for SpaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Axis-aligned detection box in image pixel coordinates.
///
/// Serialized as `[x1, y1, x2, y2]`, the layout most detectors emit.
/// The corners may arrive in either order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    /// First corner x.
    pub x1: f64,
    /// First corner y.
    pub y1: f64,
    /// Opposite corner x.
    pub x2: f64,
    /// Opposite corner y.
    pub y2: f64,
}

impl BoundingBox {
    /// Creates a box from two opposite corners.
    #[must_use]
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Integer pixel centroid of the box.
    ///
    /// The midpoint of each axis is truncated toward zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn centroid(&self) -> (i64, i64) {
        let x = f64::midpoint(self.x1, self.x2);
        let y = f64::midpoint(self.y1, self.y2);
        (x as i64, y as i64)
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f64; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One object reported by the detector for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Box around the object.
    pub bbox: BoundingBox,
    /// Class label (e.g. "car", "truck").
    pub label: String,
}

impl Detection {
    /// Creates a detection.
    #[must_use]
    pub fn new(bbox: BoundingBox, label: impl Into<String>) -> Self {
        Self {
            bbox,
            label: label.into(),
        }
    }
}

/// All detections for one frame, as stored in a recorded detection stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    /// Detections in detector order.
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// A raw space polygon as drawn by the lot operator.
///
/// Annotation files are JSON arrays of these records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceAnnotation {
    /// Polygon vertices in drawing order.
    pub points: Vec<[f64; 2]>,
}

impl SpaceAnnotation {
    /// Creates an annotation from `(x, y)` vertices.
    #[must_use]
    pub fn new(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self {
            points: points.into_iter().map(|(x, y)| [x, y]).collect(),
        }
    }
}

/// Per-spot state as exposed to reporting consumers each frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotReport {
    /// Billed minutes in the current session.
    pub time: u64,
    /// Unrounded invoice for the current session.
    pub invoice: f64,
    /// Whether no vehicle is currently detected in the spot.
    pub is_available: bool,
}
