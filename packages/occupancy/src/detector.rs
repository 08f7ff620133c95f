//! Detector capability consumed by the monitor.
//!
//! The monitor only needs "frame in, detections out". Model loading,
//! image decoding and inference scheduling belong to implementations of
//! [`Detector`], which must return the complete detection list for a frame
//! before the monitor resolves it.

use std::path::Path;

use lot_monitor_occupancy_models::{Detection, FrameRecord};

/// Produces the detections for one frame.
///
/// No ordering, count or label stability is assumed between frames.
pub trait Detector {
    /// Whatever the implementation detects on (decoded image, frame index,
    /// ...).
    type Frame: ?Sized;

    /// Failure type for a single frame.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs detection on one frame.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if detections could not be produced for
    /// this frame.
    fn detect(&mut self, frame: &Self::Frame) -> Result<Vec<Detection>, Self::Error>;
}

/// Errors from [`RecordedDetector`].
#[derive(Debug, thiserror::Error)]
pub enum RecordedFramesError {
    /// A line of the recording is not a valid [`FrameRecord`].
    #[error("Invalid frame record on line {line}: {source}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The requested frame is past the end of the recording.
    #[error("Frame {index} was not recorded ({available} frames available)")]
    Missing {
        /// Requested frame index.
        index: usize,
        /// Number of recorded frames.
        available: usize,
    },

    /// The recording could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Replays detections recorded earlier, one JSON object per line:
///
/// ```text
/// {"detections": [{"bbox": [10, 20, 110, 80], "label": "car"}]}
/// {"detections": []}
/// ```
///
/// Frames are addressed by zero-based index. Blank lines are skipped.
#[derive(Debug, Clone, Default)]
pub struct RecordedDetector {
    frames: Vec<FrameRecord>,
}

impl RecordedDetector {
    /// Wraps already parsed frames.
    #[must_use]
    pub const fn new(frames: Vec<FrameRecord>) -> Self {
        Self { frames }
    }

    /// Parses a JSON Lines recording.
    ///
    /// # Errors
    ///
    /// Returns [`RecordedFramesError::Parse`] for the first invalid line.
    pub fn from_json_lines(input: &str) -> Result<Self, RecordedFramesError> {
        let frames = input
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|source| RecordedFramesError::Parse {
                    line: index + 1,
                    source,
                })
            })
            .collect::<Result<Vec<FrameRecord>, _>>()?;

        Ok(Self { frames })
    }

    /// Reads a JSON Lines recording from disk.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordedFramesError`] if the file cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, RecordedFramesError> {
        let detector = Self::from_json_lines(&std::fs::read_to_string(path)?)?;
        log::info!(
            "Loaded {} recorded frames from {}",
            detector.len(),
            path.display()
        );
        Ok(detector)
    }

    /// Number of recorded frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the recording has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Detector for RecordedDetector {
    type Frame = usize;
    type Error = RecordedFramesError;

    fn detect(&mut self, frame: &usize) -> Result<Vec<Detection>, Self::Error> {
        self.frames
            .get(*frame)
            .map(|record| record.detections.clone())
            .ok_or(RecordedFramesError::Missing {
                index: *frame,
                available: self.frames.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use lot_monitor_occupancy_models::{SpaceAnnotation, SpaceId};
    use lot_monitor_spatial::SpaceLayout;

    use crate::{FrameError, LotConfig, LotMonitor};

    const RECORDING: &str = r#"
{"detections": [{"bbox": [10, 10, 30, 30], "label": "car"}]}

{"detections": [{"bbox": [10, 10, 30, 30], "label": "car"}, {"bbox": [500, 500, 520, 520], "label": "car"}]}
{}
"#;

    fn layout() -> Arc<SpaceLayout> {
        Arc::new(
            SpaceLayout::from_annotations(vec![SpaceAnnotation::new([
                (0.0, 0.0),
                (40.0, 0.0),
                (40.0, 40.0),
                (0.0, 40.0),
            ])])
            .unwrap(),
        )
    }

    #[test]
    fn parses_recording_skipping_blank_lines() {
        let detector = RecordedDetector::from_json_lines(RECORDING).unwrap();
        assert_eq!(detector.len(), 3);
        assert!(!detector.is_empty());
    }

    #[test]
    fn reports_invalid_line_number() {
        let err = RecordedDetector::from_json_lines("{}\n{\"detections\": 5}\n").unwrap_err();
        assert!(matches!(err, RecordedFramesError::Parse { line: 2, .. }));
    }

    #[test]
    fn replays_frames_by_index() {
        let mut detector = RecordedDetector::from_json_lines(RECORDING).unwrap();
        assert_eq!(detector.detect(&1).unwrap().len(), 2);
        assert!(detector.detect(&2).unwrap().is_empty());
        assert!(matches!(
            detector.detect(&3),
            Err(RecordedFramesError::Missing {
                index: 3,
                available: 3
            })
        ));
    }

    #[test]
    fn monitor_pulls_frames_from_detector() {
        let mut detector = RecordedDetector::from_json_lines(RECORDING).unwrap();
        let mut monitor = LotMonitor::new(&LotConfig::new("replay", 6000.0), layout()).unwrap();

        for frame in 0..detector.len() {
            monitor.process_frame(&mut detector, &frame).unwrap();
        }

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.frames_processed, 3);
        assert_eq!(snapshot.aggregates.total_cars_served(), 1);
        assert_eq!(snapshot.aggregates.total_occupied_minutes(), 1);
        assert!(snapshot.spots[&SpaceId::from_index(0)].is_available);
    }

    #[test]
    fn detector_failure_leaves_state_untouched() {
        let mut detector = RecordedDetector::default();
        let mut monitor = LotMonitor::new(&LotConfig::new("replay", 6000.0), layout()).unwrap();
        let before = monitor.snapshot();

        assert!(matches!(
            monitor.process_frame(&mut detector, &0),
            Err(FrameError::Detector(_))
        ));
        assert_eq!(monitor.snapshot(), before);
    }
}
