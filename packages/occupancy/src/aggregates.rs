//! Lot-wide counters and the per-frame reporting snapshot.

use std::collections::BTreeMap;

use lot_monitor_occupancy_models::{LotId, SpaceId, SpotReport};
use serde::{Deserialize, Serialize};

use crate::invoice::round_invoice;
use crate::state::Transition;

/// Lot-wide occupancy counters.
///
/// `occupied_count` and `available_count` describe the latest frame only.
/// The `total_*` fields accumulate over the whole monitoring session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotAggregates {
    occupied_count: usize,
    available_count: usize,
    total_cars_served: u64,
    total_occupied_minutes: u64,
    total_revenue: u64,
}

impl LotAggregates {
    /// Counters for a lot of `space_count` spaces before its first frame.
    #[must_use]
    pub const fn new(space_count: usize) -> Self {
        Self {
            occupied_count: 0,
            available_count: space_count,
            total_cars_served: 0,
            total_occupied_minutes: 0,
            total_revenue: 0,
        }
    }

    /// Spaces occupied in the latest frame.
    #[must_use]
    pub const fn occupied_count(&self) -> usize {
        self.occupied_count
    }

    /// Spaces free in the latest frame.
    #[must_use]
    pub const fn available_count(&self) -> usize {
        self.available_count
    }

    /// Sessions opened so far.
    #[must_use]
    pub const fn total_cars_served(&self) -> u64 {
        self.total_cars_served
    }

    /// Billed minutes of all closed sessions.
    #[must_use]
    pub const fn total_occupied_minutes(&self) -> u64 {
        self.total_occupied_minutes
    }

    /// Rounded invoices of all closed sessions.
    #[must_use]
    pub const fn total_revenue(&self) -> u64 {
        self.total_revenue
    }

    /// Whether at least one space was free in the latest frame.
    #[must_use]
    pub const fn has_vacancy(&self) -> bool {
        self.available_count > 0
    }

    pub(crate) fn record(&mut self, transition: Transition) {
        match transition {
            Transition::SessionOpened => self.total_cars_served += 1,
            Transition::SessionClosed { minutes, invoice } => {
                self.total_occupied_minutes += minutes;
                self.total_revenue += round_invoice(invoice);
            }
            Transition::StillAvailable | Transition::SessionContinued => {}
        }
    }

    pub(crate) const fn set_frame_counts(&mut self, occupied: usize, total: usize) {
        self.occupied_count = occupied;
        self.available_count = total - occupied;
    }
}

/// Everything a reporting consumer needs after a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotSnapshot {
    /// Lot the snapshot belongs to.
    pub lot_id: LotId,
    /// Frames applied since the session started.
    pub frames_processed: u64,
    /// Per-space state keyed by space id.
    pub spots: BTreeMap<SpaceId, SpotReport>,
    /// Lot-wide counters.
    pub aggregates: LotAggregates,
    /// Whether the lot had a free space in the latest frame.
    pub has_vacancy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_lot_is_fully_available() {
        let aggregates = LotAggregates::new(4);
        assert_eq!(aggregates.occupied_count(), 0);
        assert_eq!(aggregates.available_count(), 4);
        assert!(aggregates.has_vacancy());
    }

    #[test]
    fn records_session_lifecycle() {
        let mut aggregates = LotAggregates::new(1);
        aggregates.record(Transition::SessionOpened);
        aggregates.record(Transition::SessionContinued);
        aggregates.record(Transition::SessionClosed {
            minutes: 23,
            invoice: 2335.0,
        });
        aggregates.record(Transition::StillAvailable);

        assert_eq!(aggregates.total_cars_served(), 1);
        assert_eq!(aggregates.total_occupied_minutes(), 23);
        assert_eq!(aggregates.total_revenue(), 2300);
    }

    #[test]
    fn frame_counts_replace_previous_frame() {
        let mut aggregates = LotAggregates::new(5);
        aggregates.set_frame_counts(5, 5);
        assert!(!aggregates.has_vacancy());
        aggregates.set_frame_counts(2, 5);
        assert_eq!(aggregates.occupied_count(), 2);
        assert_eq!(aggregates.available_count(), 3);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let snapshot = LotSnapshot {
            lot_id: LotId::new("north"),
            frames_processed: 1,
            spots: BTreeMap::from([(
                SpaceId::from_index(0),
                SpotReport {
                    time: 0,
                    invoice: 0.0,
                    is_available: true,
                },
            )]),
            aggregates: LotAggregates::new(1),
            has_vacancy: true,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["lotId"], "north");
        assert_eq!(json["aggregates"]["availableCount"], 1);
        assert_eq!(json["aggregates"]["totalRevenue"], 0);
        assert_eq!(json["spots"]["1"]["isAvailable"], true);
    }
}
