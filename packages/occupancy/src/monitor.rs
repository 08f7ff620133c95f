//! Single-lot monitoring session.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use lot_monitor_occupancy_models::{Detection, LotId, SpaceAnnotation, SpaceId};
use lot_monitor_spatial::SpaceLayout;

use crate::aggregates::{LotAggregates, LotSnapshot};
use crate::config::{BillingPolicy, LotConfig};
use crate::detector::Detector;
use crate::state::{SpaceState, Transition};
use crate::{ConfigurationError, FrameError};

/// Occupancy and billing state for one lot.
///
/// Frames must be applied one at a time, each with a verdict for every
/// space. Callers that share a monitor across threads wrap it in a lock
/// (see [`crate::registry::LotRegistry`]).
#[derive(Debug)]
pub struct LotMonitor {
    lot_id: LotId,
    name: String,
    layout: Arc<SpaceLayout>,
    policy: BillingPolicy,
    vehicle_classes: BTreeSet<String>,
    states: Vec<SpaceState>,
    aggregates: LotAggregates,
    frames_processed: u64,
}

impl LotMonitor {
    /// Starts a monitoring session with every space available.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the pricing configuration is
    /// invalid. No session is created in that case.
    pub fn new(config: &LotConfig, layout: Arc<SpaceLayout>) -> Result<Self, ConfigurationError> {
        let policy = config.billing_policy()?;
        let space_count = layout.len();

        log::info!(
            "Starting monitor for lot {} ({}) with {space_count} spaces at {} per hour",
            config.id,
            config.display_name(),
            policy.price_per_hour()
        );

        Ok(Self {
            lot_id: config.id.clone(),
            name: config.display_name().to_string(),
            layout,
            policy,
            vehicle_classes: config.vehicle_classes.clone(),
            states: vec![SpaceState::default(); space_count],
            aggregates: LotAggregates::new(space_count),
            frames_processed: 0,
        })
    }

    /// Builds the layout from raw annotations and starts a session.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the annotations or the pricing
    /// configuration are invalid.
    pub fn from_annotations(
        config: &LotConfig,
        annotations: Vec<SpaceAnnotation>,
    ) -> Result<Self, ConfigurationError> {
        let layout = SpaceLayout::from_annotations(annotations)?;
        Self::new(config, Arc::new(layout))
    }

    /// Lot identifier.
    #[must_use]
    pub const fn lot_id(&self) -> &LotId {
        &self.lot_id
    }

    /// Lot display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Space layout.
    #[must_use]
    pub const fn layout(&self) -> &Arc<SpaceLayout> {
        &self.layout
    }

    /// Pricing rules.
    #[must_use]
    pub const fn policy(&self) -> &BillingPolicy {
        &self.policy
    }

    /// Lot-wide counters.
    #[must_use]
    pub const fn aggregates(&self) -> &LotAggregates {
        &self.aggregates
    }

    /// Frames applied so far.
    #[must_use]
    pub const fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// State of one space.
    #[must_use]
    pub fn state(&self, space_id: SpaceId) -> Option<&SpaceState> {
        self.states.get(space_id.index())
    }

    /// Per-space states in id order.
    #[must_use]
    pub fn states(&self) -> &[SpaceState] {
        &self.states
    }

    /// Spaces with an open session.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.states.iter().filter(|s| !s.is_available()).count()
    }

    /// Whether a detection's label can occupy a space.
    #[must_use]
    pub fn admits(&self, detection: &Detection) -> bool {
        self.vehicle_classes.is_empty() || self.vehicle_classes.contains(&detection.label)
    }

    /// Resolves one frame of detections against the layout and applies it.
    ///
    /// Detections whose label is filtered out by `vehicle_classes` are
    /// ignored.
    pub fn apply_detections(&mut self, detections: &[Detection]) -> LotSnapshot {
        let verdicts = self
            .layout
            .occupancy(detections.iter().filter(|d| self.admits(d)));
        self.advance(&verdicts);
        self.snapshot()
    }

    /// Pulls one frame from `detector` and applies it.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Detector`] if the detector fails. State is
    /// unchanged in that case.
    pub fn process_frame<D: Detector>(
        &mut self,
        detector: &mut D,
        frame: &D::Frame,
    ) -> Result<LotSnapshot, FrameError> {
        let detections = detector
            .detect(frame)
            .map_err(|e| FrameError::Detector(Box::new(e)))?;
        Ok(self.apply_detections(&detections))
    }

    /// Applies one frame of precomputed verdicts, `verdicts[i]` being the
    /// verdict for space `i + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::VerdictCount`] unless there is exactly one
    /// verdict per space. Nothing is applied in that case.
    pub fn apply_verdicts(&mut self, verdicts: &[bool]) -> Result<LotSnapshot, FrameError> {
        if verdicts.len() != self.states.len() {
            return Err(FrameError::VerdictCount {
                expected: self.states.len(),
                actual: verdicts.len(),
            });
        }

        self.advance(verdicts);
        Ok(self.snapshot())
    }

    /// Applies one frame of verdicts keyed by space id.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::UnknownSpace`] for an id outside the layout
    /// and [`FrameError::MissingVerdict`] for a space without a verdict.
    /// Nothing is applied in either case.
    pub fn apply_verdict_map(
        &mut self,
        verdicts: &BTreeMap<SpaceId, bool>,
    ) -> Result<LotSnapshot, FrameError> {
        if let Some(&space_id) = verdicts.keys().find(|id| id.index() >= self.states.len()) {
            return Err(FrameError::UnknownSpace { space_id });
        }

        let ordered = (0..self.states.len())
            .map(SpaceId::from_index)
            .map(|space_id| {
                verdicts
                    .get(&space_id)
                    .copied()
                    .ok_or(FrameError::MissingVerdict { space_id })
            })
            .collect::<Result<Vec<bool>, FrameError>>()?;

        self.apply_verdicts(&ordered)
    }

    /// Current per-space and lot-wide state.
    #[must_use]
    pub fn snapshot(&self) -> LotSnapshot {
        LotSnapshot {
            lot_id: self.lot_id.clone(),
            frames_processed: self.frames_processed,
            spots: self
                .states
                .iter()
                .enumerate()
                .map(|(index, state)| (SpaceId::from_index(index), state.report()))
                .collect(),
            aggregates: self.aggregates,
            has_vacancy: self.aggregates.has_vacancy(),
        }
    }

    /// Runs the transition table over every space. `verdicts` must hold
    /// exactly one entry per space.
    fn advance(&mut self, verdicts: &[bool]) {
        debug_assert_eq!(verdicts.len(), self.states.len());

        let mut occupied = 0;
        for (index, (state, &occupied_now)) in self.states.iter_mut().zip(verdicts).enumerate() {
            let transition = state.step(occupied_now, &self.policy);
            if transition != Transition::StillAvailable {
                log::debug!(
                    "Lot {} space {}: {transition}",
                    self.lot_id,
                    SpaceId::from_index(index)
                );
            }
            self.aggregates.record(transition);
            if occupied_now {
                occupied += 1;
            }
        }

        self.aggregates
            .set_frame_counts(occupied, self.states.len());
        self.frames_processed += 1;
    }
}
