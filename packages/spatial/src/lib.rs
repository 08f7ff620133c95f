#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parking space geometry and per-frame occupancy resolution.
//!
//! Builds an ordered [`SpaceLayout`] from operator-drawn polygon
//! annotations, assigns each space a stable 1-based id and answers, for
//! one frame of detections, which spaces contain at least one detection
//! centroid. Spaces are held in an R-tree keyed by their bounding envelope
//! so each centroid is only tested against nearby polygons.

use std::cmp::Ordering;
use std::path::Path;

use geo::{
    Area, BoundingRect, Intersects, Line, LineString, Point, Polygon, RemoveRepeatedPoints,
};
use lot_monitor_occupancy_models::{Detection, SpaceAnnotation, SpaceId};
use rstar::{AABB, RTree, RTreeObject};

/// Errors raised while building a [`SpaceLayout`].
///
/// All of these are fatal: a lot with an invalid layout cannot be
/// monitored.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// The annotation set contained no polygons.
    #[error("No parking spaces configured")]
    Empty,

    /// A polygon has fewer than three vertices.
    #[error("Space annotation #{index} has {count} points, at least 3 are required")]
    TooFewPoints {
        /// Position of the annotation in the submitted list.
        index: usize,
        /// Number of vertices supplied.
        count: usize,
    },

    /// A vertex is NaN or infinite.
    #[error("Space annotation #{index} has a non-finite coordinate")]
    NonFiniteCoordinate {
        /// Position of the annotation in the submitted list.
        index: usize,
    },

    /// Two non-adjacent edges of the polygon cross or touch.
    #[error("Space annotation #{index} is self-intersecting")]
    SelfIntersecting {
        /// Position of the annotation in the submitted list.
        index: usize,
    },

    /// The polygon encloses no area (collinear or repeated vertices).
    #[error("Space annotation #{index} encloses zero area")]
    ZeroArea {
        /// Position of the annotation in the submitted list.
        index: usize,
    },

    /// The annotation file is not a valid JSON polygon list.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The annotation file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One configured parking space.
#[derive(Debug, Clone)]
pub struct Space {
    id: SpaceId,
    annotation: SpaceAnnotation,
    polygon: Polygon<f64>,
}

impl Space {
    /// Stable 1-based id of this space.
    #[must_use]
    pub const fn id(&self) -> SpaceId {
        self.id
    }

    /// Vertices as originally annotated.
    #[must_use]
    pub fn points(&self) -> &[[f64; 2]] {
        &self.annotation.points
    }

    /// Whether `(x, y)` lies inside the polygon or on its boundary.
    #[must_use]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.polygon.intersects(&Point::new(x, y))
    }

    /// Whether any detection's centroid falls in this space.
    #[must_use]
    pub fn is_occupied_by(&self, detections: &[Detection]) -> bool {
        detections.iter().any(|detection| {
            let [x, y] = centroid_point(detection);
            self.contains_point(x, y)
        })
    }
}

/// R-tree entry pointing back into [`SpaceLayout::spaces`].
struct SpaceEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for SpaceEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// The ordered, validated set of spaces for one lot.
///
/// Immutable once built; share it by reference (or `Arc`) for the
/// lifetime of the monitoring session.
pub struct SpaceLayout {
    spaces: Vec<Space>,
    index: RTree<SpaceEntry>,
}

impl std::fmt::Debug for SpaceLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpaceLayout")
            .field("spaces", &self.spaces)
            .finish_non_exhaustive()
    }
}

impl SpaceLayout {
    /// Validates and orders raw annotations, assigning ids `1..=N`.
    ///
    /// Spaces are sorted top-to-bottom then left-to-right by the minimum
    /// y and minimum x of their vertices. The sort is stable, so the ids
    /// depend only on the set of shapes, not on submission order, except
    /// for shapes sharing the same corner.
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] if the list is empty or any polygon has
    /// fewer than three points, a non-finite coordinate or zero area.
    pub fn from_annotations(annotations: Vec<SpaceAnnotation>) -> Result<Self, LayoutError> {
        if annotations.is_empty() {
            return Err(LayoutError::Empty);
        }

        let mut validated = annotations
            .into_iter()
            .enumerate()
            .map(|(index, annotation)| {
                let polygon = build_polygon(index, &annotation)?;
                Ok((annotation, polygon))
            })
            .collect::<Result<Vec<_>, LayoutError>>()?;

        validated.sort_by(|(a, _), (b, _)| compare_sort_keys(sort_key(a), sort_key(b)));

        let spaces: Vec<Space> = validated
            .into_iter()
            .enumerate()
            .map(|(index, (annotation, polygon))| Space {
                id: SpaceId::from_index(index),
                annotation,
                polygon,
            })
            .collect();

        let entries = spaces
            .iter()
            .enumerate()
            .map(|(index, space)| SpaceEntry {
                index,
                envelope: compute_envelope(&space.polygon),
            })
            .collect();

        log::debug!("Built layout with {} parking spaces", spaces.len());

        Ok(Self {
            spaces,
            index: RTree::bulk_load(entries),
        })
    }

    /// Parses a JSON annotation list (`[{"points": [[x, y], ...]}, ...]`).
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] if the JSON is malformed or the layout
    /// fails validation.
    pub fn from_json_str(json: &str) -> Result<Self, LayoutError> {
        let annotations: Vec<SpaceAnnotation> = serde_json::from_str(json)?;
        Self::from_annotations(annotations)
    }

    /// Reads and parses a JSON annotation file.
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] if the file cannot be read or its
    /// contents fail [`Self::from_json_str`].
    pub fn load_json(path: &Path) -> Result<Self, LayoutError> {
        let json = std::fs::read_to_string(path)?;
        let layout = Self::from_json_str(&json)?;
        log::info!(
            "Loaded {} parking spaces from {}",
            layout.len(),
            path.display()
        );
        Ok(layout)
    }

    /// Number of spaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    /// Always `false` for a successfully built layout.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    /// Spaces in id order.
    #[must_use]
    pub fn spaces(&self) -> &[Space] {
        &self.spaces
    }

    /// Looks up a space by id.
    #[must_use]
    pub fn space(&self, id: SpaceId) -> Option<&Space> {
        self.spaces.get(id.index())
    }

    /// Annotations in id order, i.e. the canonical form of the input.
    #[must_use]
    pub fn sorted_annotations(&self) -> Vec<SpaceAnnotation> {
        self.spaces
            .iter()
            .map(|space| space.annotation.clone())
            .collect()
    }

    /// Resolves one frame: `verdicts[i]` is true when any detection
    /// centroid lies in space `i + 1`.
    ///
    /// A detection may mark several spaces; several detections in one
    /// space still yield a single `true`.
    #[must_use]
    pub fn occupancy<'a>(&self, detections: impl IntoIterator<Item = &'a Detection>) -> Vec<bool> {
        let mut verdicts = vec![false; self.spaces.len()];

        for detection in detections {
            let point = centroid_point(detection);
            let query = AABB::from_point(point);

            for entry in self.index.locate_in_envelope_intersecting(&query) {
                let space = &self.spaces[entry.index];
                if !verdicts[entry.index] && space.contains_point(point[0], point[1]) {
                    verdicts[entry.index] = true;
                }
            }
        }

        verdicts
    }
}

/// Layout ordering key for an annotation: `(min_y, min_x)` over its
/// vertices.
#[must_use]
pub fn sort_key(annotation: &SpaceAnnotation) -> (f64, f64) {
    annotation
        .points
        .iter()
        .fold((f64::INFINITY, f64::INFINITY), |(min_y, min_x), &[x, y]| {
            (min_y.min(y), min_x.min(x))
        })
}

fn compare_sort_keys(a: (f64, f64), b: (f64, f64)) -> Ordering {
    a.0.total_cmp(&b.0).then_with(|| a.1.total_cmp(&b.1))
}

#[allow(clippy::cast_precision_loss)]
fn centroid_point(detection: &Detection) -> [f64; 2] {
    let (x, y) = detection.bbox.centroid();
    [x as f64, y as f64]
}

fn build_polygon(index: usize, annotation: &SpaceAnnotation) -> Result<Polygon<f64>, LayoutError> {
    let count = annotation.points.len();
    if count < 3 {
        return Err(LayoutError::TooFewPoints { index, count });
    }

    if annotation
        .points
        .iter()
        .flatten()
        .any(|coordinate| !coordinate.is_finite())
    {
        return Err(LayoutError::NonFiniteCoordinate { index });
    }

    let exterior: Vec<(f64, f64)> = annotation.points.iter().map(|&[x, y]| (x, y)).collect();
    let polygon = Polygon::new(LineString::from(exterior), vec![]).remove_repeated_points();

    if is_self_intersecting(polygon.exterior()) {
        return Err(LayoutError::SelfIntersecting { index });
    }

    if polygon.unsigned_area() <= 0.0 {
        return Err(LayoutError::ZeroArea { index });
    }

    Ok(polygon)
}

/// Whether any two edges of a closed ring that do not share a vertex
/// intersect.
fn is_self_intersecting(ring: &LineString<f64>) -> bool {
    let edges: Vec<Line<f64>> = ring.lines().collect();
    let count = edges.len();

    (0..count).any(|i| {
        ((i + 2)..count)
            .filter(|&j| !(i == 0 && j == count - 1))
            .any(|j| edges[i].intersects(&edges[j]))
    })
}

/// Compute the bounding box envelope for a [`Polygon`].
fn compute_envelope(polygon: &Polygon<f64>) -> AABB<[f64; 2]> {
    polygon.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lot_monitor_occupancy_models::BoundingBox;

    fn square(x: f64, y: f64, size: f64) -> SpaceAnnotation {
        SpaceAnnotation::new([(x, y), (x + size, y), (x + size, y + size), (x, y + size)])
    }

    fn car_at(x: f64, y: f64) -> Detection {
        Detection::new(BoundingBox::new(x - 5.0, y - 5.0, x + 5.0, y + 5.0), "car")
    }

    #[test]
    fn orders_spaces_by_min_y_then_min_x() {
        let lower = SpaceAnnotation::new([
            (1553.0, 48.0),
            (1718.0, 40.0),
            (1735.0, 128.0),
            (1577.0, 133.0),
        ]);
        let upper = SpaceAnnotation::new([(500.0, 10.0), (600.0, 10.0), (600.0, 90.0), (500.0, 90.0)]);
        assert_eq!(sort_key(&lower), (40.0, 1553.0));

        let layout = SpaceLayout::from_annotations(vec![lower.clone(), upper.clone()]).unwrap();
        assert_eq!(layout.spaces()[0].points(), upper.points.as_slice());
        assert_eq!(layout.spaces()[0].id(), SpaceId::from_index(0));
        assert_eq!(layout.spaces()[1].points(), lower.points.as_slice());

        let reversed = SpaceLayout::from_annotations(vec![upper, lower]).unwrap();
        assert_eq!(reversed.sorted_annotations(), layout.sorted_annotations());
    }

    #[test]
    fn equal_rows_order_left_to_right() {
        let right = square(300.0, 0.0, 50.0);
        let left = square(100.0, 0.0, 50.0);
        let layout = SpaceLayout::from_annotations(vec![right.clone(), left.clone()]).unwrap();
        assert_eq!(layout.sorted_annotations(), vec![left, right]);
    }

    #[test]
    fn rejects_empty_configuration() {
        assert!(matches!(
            SpaceLayout::from_annotations(Vec::new()),
            Err(LayoutError::Empty)
        ));
    }

    #[test]
    fn rejects_polygons_with_too_few_points() {
        let line = SpaceAnnotation::new([(0.0, 0.0), (10.0, 10.0)]);
        let result = SpaceLayout::from_annotations(vec![square(0.0, 0.0, 10.0), line]);
        assert!(matches!(
            result,
            Err(LayoutError::TooFewPoints { index: 1, count: 2 })
        ));
    }

    #[test]
    fn rejects_zero_area_polygons() {
        let collinear = SpaceAnnotation::new([(0.0, 0.0), (5.0, 5.0), (10.0, 10.0)]);
        assert!(matches!(
            SpaceLayout::from_annotations(vec![collinear]),
            Err(LayoutError::ZeroArea { index: 0 })
        ));
    }

    #[test]
    fn rejects_self_intersecting_polygons() {
        let bowtie = SpaceAnnotation::new([(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0)]);
        assert!(matches!(
            SpaceLayout::from_annotations(vec![square(20.0, 0.0, 10.0), bowtie]),
            Err(LayoutError::SelfIntersecting { index: 1 })
        ));

        let lopsided = SpaceAnnotation::new([(0.0, 0.0), (30.0, 10.0), (30.0, 0.0), (0.0, 10.0)]);
        assert!(matches!(
            SpaceLayout::from_annotations(vec![lopsided]),
            Err(LayoutError::SelfIntersecting { index: 0 })
        ));
    }

    #[test]
    fn accepts_closed_rings_and_repeated_vertices() {
        let closed = SpaceAnnotation::new([
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (0.0, 0.0),
        ]);
        let layout = SpaceLayout::from_annotations(vec![closed.clone()]).unwrap();
        assert_eq!(layout.spaces()[0].points(), closed.points.as_slice());
        assert!(layout.spaces()[0].contains_point(5.0, 5.0));
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let broken = SpaceAnnotation::new([(0.0, 0.0), (f64::NAN, 5.0), (10.0, 10.0)]);
        assert!(matches!(
            SpaceLayout::from_annotations(vec![broken]),
            Err(LayoutError::NonFiniteCoordinate { index: 0 })
        ));
    }

    #[test]
    fn parses_annotation_json() {
        let layout = SpaceLayout::from_json_str(
            r#"[{"points": [[0, 0], [10, 0], [10, 10], [0, 10]]},
                {"points": [[20, 0], [30, 0], [30, 10], [20, 10]]}]"#,
        )
        .unwrap();
        assert_eq!(layout.len(), 2);
        assert!(!layout.is_empty());
        assert!(matches!(
            SpaceLayout::from_json_str("{\"points\": []}"),
            Err(LayoutError::Json(_))
        ));
    }

    #[test]
    fn centroid_on_boundary_counts_as_inside() {
        let layout = SpaceLayout::from_annotations(vec![square(0.0, 0.0, 10.0)]).unwrap();
        let space = &layout.spaces()[0];
        assert!(space.contains_point(10.0, 5.0));
        assert!(space.contains_point(0.0, 0.0));
        assert!(!space.contains_point(10.5, 5.0));
        assert_eq!(layout.occupancy(&[car_at(10.0, 5.0)]), vec![true]);
    }

    #[test]
    fn occupancy_is_or_over_detections() {
        let layout = SpaceLayout::from_annotations(vec![
            square(0.0, 0.0, 100.0),
            square(200.0, 0.0, 100.0),
            square(0.0, 200.0, 100.0),
        ])
        .unwrap();

        let detections = vec![car_at(50.0, 50.0), car_at(60.0, 40.0), car_at(250.0, 50.0)];
        assert_eq!(layout.occupancy(&detections), vec![true, true, false]);
        assert_eq!(layout.occupancy(std::iter::empty()), vec![false, false, false]);
    }

    #[test]
    fn overlapping_spaces_can_share_a_detection() {
        let layout = SpaceLayout::from_annotations(vec![
            square(0.0, 0.0, 100.0),
            square(50.0, 0.0, 100.0),
        ])
        .unwrap();
        assert_eq!(layout.occupancy(&[car_at(75.0, 50.0)]), vec![true, true]);
    }

    #[test]
    fn indexed_lookup_matches_per_space_test() {
        let layout = SpaceLayout::from_annotations(vec![
            SpaceAnnotation::new([(0.0, 0.0), (120.0, 10.0), (100.0, 90.0), (-10.0, 70.0)]),
            SpaceAnnotation::new([(130.0, 5.0), (260.0, 0.0), (250.0, 95.0), (140.0, 80.0)]),
        ])
        .unwrap();

        for x in (-20..280).step_by(7) {
            for y in (-10..110).step_by(9) {
                let detections = [car_at(f64::from(x), f64::from(y))];
                let expected: Vec<bool> = layout
                    .spaces()
                    .iter()
                    .map(|space| space.is_occupied_by(&detections))
                    .collect();
                assert_eq!(layout.occupancy(&detections), expected, "at ({x}, {y})");
            }
        }
    }

    #[test]
    fn centroid_is_truncated_before_containment() {
        // Box centroid is (10.9, 5.0) which truncates to (10, 5): on the edge.
        let layout = SpaceLayout::from_annotations(vec![square(0.0, 0.0, 10.0)]).unwrap();
        let detection = Detection::new(BoundingBox::new(10.0, 0.0, 11.8, 10.0), "car");
        assert_eq!(layout.occupancy(&[detection]), vec![true]);
    }
}
