//! Per-space occupancy session state.

use lot_monitor_occupancy_models::SpotReport;
use strum_macros::{AsRefStr, Display};

use crate::config::BillingPolicy;

/// Outcome of applying one frame's verdict to one space.
///
/// Exactly one variant applies per space per frame, selected by the
/// space's prior availability and this frame's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Transition {
    /// Was available, still no vehicle.
    StillAvailable,
    /// Was available, vehicle detected: a session starts.
    SessionOpened,
    /// Was occupied, no vehicle: the session ends.
    SessionClosed {
        /// Billed minutes of the finished session.
        minutes: u64,
        /// Unrounded invoice of the finished session.
        invoice: f64,
    },
    /// Was occupied, still occupied: the session runs one more tick.
    SessionContinued,
}

/// Mutable state of one space for the lifetime of a monitoring session.
///
/// Only [`SpaceState::step`] changes it, which keeps `running_time` and
/// `running_invoice` at zero whenever the space is available.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceState {
    is_available: bool,
    session_ticks: u64,
    running_time: u64,
    running_invoice: f64,
}

impl Default for SpaceState {
    fn default() -> Self {
        Self {
            is_available: true,
            session_ticks: 0,
            running_time: 0,
            running_invoice: 0.0,
        }
    }
}

impl SpaceState {
    /// Whether no vehicle is currently detected.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.is_available
    }

    /// Billed minutes of the current session.
    #[must_use]
    pub const fn running_time(&self) -> u64 {
        self.running_time
    }

    /// Unrounded invoice of the current session.
    #[must_use]
    pub const fn running_invoice(&self) -> f64 {
        self.running_invoice
    }

    /// Occupied frames counted since the session opened, excluding the
    /// opening frame.
    #[must_use]
    pub const fn session_ticks(&self) -> u64 {
        self.session_ticks
    }

    /// Reporting view of this space.
    #[must_use]
    pub const fn report(&self) -> SpotReport {
        SpotReport {
            time: self.running_time,
            invoice: self.running_invoice,
            is_available: self.is_available,
        }
    }

    /// Applies one frame's verdict.
    ///
    /// Continuing sessions recompute the invoice from the billed minutes
    /// rather than accumulating it. Closing sessions reset the space and
    /// hand the final minutes and invoice back in the transition.
    pub(crate) fn step(&mut self, occupied: bool, policy: &BillingPolicy) -> Transition {
        match (self.is_available, occupied) {
            (true, false) => Transition::StillAvailable,
            (true, true) => {
                self.is_available = false;
                Transition::SessionOpened
            }
            (false, false) => {
                let closed = Transition::SessionClosed {
                    minutes: self.running_time,
                    invoice: self.running_invoice,
                };
                *self = Self::default();
                closed
            }
            (false, true) => {
                self.session_ticks += 1;
                self.running_time = policy.billed_minutes(self.session_ticks);
                self.running_invoice = policy.invoice(self.running_time);
                Transition::SessionContinued
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BillingPolicy {
        BillingPolicy::new(6000.0, 1).unwrap()
    }

    fn assert_idle(state: &SpaceState) {
        assert!(state.is_available());
        assert_eq!(state.running_time(), 0);
        assert!(state.running_invoice().abs() < f64::EPSILON);
    }

    #[test]
    fn available_space_stays_untouched() {
        let mut state = SpaceState::default();
        for _ in 0..5 {
            assert_eq!(state.step(false, &policy()), Transition::StillAvailable);
            assert_eq!(state, SpaceState::default());
        }
    }

    #[test]
    fn opening_frame_does_not_tick() {
        let mut state = SpaceState::default();
        assert_eq!(state.step(true, &policy()), Transition::SessionOpened);
        assert!(!state.is_available());
        assert_eq!(state.running_time(), 0);
        assert_eq!(state.session_ticks(), 0);
    }

    #[test]
    fn continuing_session_recomputes_invoice() {
        let mut state = SpaceState::default();
        state.step(true, &policy());
        for expected in 1..=3_u64 {
            assert_eq!(state.step(true, &policy()), Transition::SessionContinued);
            assert_eq!(state.running_time(), expected);
        }
        assert!((state.running_invoice() - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn closing_session_reports_totals_and_resets() {
        let mut state = SpaceState::default();
        state.step(true, &policy());
        state.step(true, &policy());
        state.step(true, &policy());

        match state.step(false, &policy()) {
            Transition::SessionClosed { minutes, invoice } => {
                assert_eq!(minutes, 2);
                assert!((invoice - 200.0).abs() < f64::EPSILON);
            }
            other => panic!("expected SessionClosed, got {other:?}"),
        }
        assert_idle(&state);
        assert_eq!(state, SpaceState::default());
    }

    #[test]
    fn single_frame_session_bills_nothing() {
        let mut state = SpaceState::default();
        state.step(true, &policy());
        assert_eq!(
            state.step(false, &policy()),
            Transition::SessionClosed {
                minutes: 0,
                invoice: 0.0
            }
        );
        assert_idle(&state);
    }

    #[test]
    fn tick_rate_slows_billed_minutes() {
        let policy = BillingPolicy::new(6000.0, 3).unwrap();
        let mut state = SpaceState::default();
        state.step(true, &policy);

        let minutes: Vec<u64> = (0..7)
            .map(|_| {
                state.step(true, &policy);
                state.running_time()
            })
            .collect();
        assert_eq!(minutes, vec![0, 0, 1, 1, 1, 2, 2]);
        assert_eq!(state.session_ticks(), 7);
    }

    #[test]
    fn transitions_display_in_snake_case() {
        assert_eq!(Transition::SessionOpened.to_string(), "session_opened");
        assert_eq!(
            Transition::SessionClosed {
                minutes: 1,
                invoice: 1.0
            }
            .as_ref(),
            "session_closed"
        );
    }

    #[test]
    fn report_mirrors_state() {
        let mut state = SpaceState::default();
        state.step(true, &policy());
        state.step(true, &policy());
        let report = state.report();
        assert_eq!(report.time, 1);
        assert!(!report.is_available);
        assert!((report.invoice - 100.0).abs() < f64::EPSILON);
    }
}
