//! Session manager mapping lot ids to their monitors.
//!
//! Each lot sits behind its own `Mutex`, so frames for one lot are applied
//! strictly one after another while different lots proceed in parallel.
//! The outer `RwLock` only guards the lot table and is never held while a
//! frame is being applied.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use lot_monitor_occupancy_models::{Detection, LotId, SpaceAnnotation};

use crate::aggregates::LotSnapshot;
use crate::config::LotConfig;
use crate::detector::Detector;
use crate::monitor::LotMonitor;
use crate::RegistryError;

/// Monitors for every lot, keyed by lot id.
///
/// Sessions are created only by [`Self::annotate`] or [`Self::insert`];
/// lookups never create one implicitly.
#[derive(Debug, Default)]
pub struct LotRegistry {
    lots: RwLock<BTreeMap<LotId, Arc<Mutex<LotMonitor>>>>,
}

impl LotRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a session from a lot configuration and its annotations,
    /// replacing any existing session for the lot.
    ///
    /// Re-annotating a lot discards its open sessions, since space ids may
    /// no longer refer to the same polygons.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Configuration`] if the session cannot be
    /// built; any existing session for the lot is kept in that case.
    pub fn annotate(
        &self,
        config: &LotConfig,
        annotations: Vec<SpaceAnnotation>,
    ) -> Result<LotSnapshot, RegistryError> {
        let monitor = LotMonitor::from_annotations(config, annotations)?;
        let snapshot = monitor.snapshot();
        self.insert(monitor)?;
        Ok(snapshot)
    }

    /// Registers a prepared monitor, returning the final snapshot of the
    /// session it replaced, if any.
    ///
    /// Replacing a poisoned session succeeds; its last state is still
    /// reported.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::RegistryPoisoned`] if the lot table lock is
    /// poisoned.
    pub fn insert(&self, monitor: LotMonitor) -> Result<Option<LotSnapshot>, RegistryError> {
        let lot_id = monitor.lot_id().clone();
        let previous = self
            .lots
            .write()
            .map_err(|_| RegistryError::RegistryPoisoned)?
            .insert(lot_id.clone(), Arc::new(Mutex::new(monitor)));

        let Some(previous) = previous else {
            log::info!("Registered lot {lot_id}");
            return Ok(None);
        };

        let previous = lock_retired(&previous, &lot_id);
        let open = previous.open_sessions();
        if open > 0 {
            log::warn!("Replaced lot {lot_id}, discarding {open} open parking sessions");
        } else {
            log::info!("Replaced lot {lot_id}");
        }
        Ok(Some(previous.snapshot()))
    }

    /// Returns the shared monitor for a lot.
    ///
    /// The handle is bound to the current session. After the lot is
    /// re-annotated or removed it still points at the retired monitor, and
    /// frames applied through it no longer reach the registry. Prefer
    /// [`Self::with_lot`] or the per-frame methods, which resolve the lot
    /// on every call.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownLot`] if the lot has no session.
    pub fn get(&self, lot_id: &LotId) -> Result<Arc<Mutex<LotMonitor>>, RegistryError> {
        self.lots
            .read()
            .map_err(|_| RegistryError::RegistryPoisoned)?
            .get(lot_id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownLot {
                lot_id: lot_id.clone(),
            })
    }

    /// Runs `f` with exclusive access to a lot's monitor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownLot`] or [`RegistryError::Poisoned`]
    /// if the monitor cannot be reached.
    pub fn with_lot<R>(
        &self,
        lot_id: &LotId,
        f: impl FnOnce(&mut LotMonitor) -> R,
    ) -> Result<R, RegistryError> {
        let lot = self.get(lot_id)?;
        let mut monitor = lock_lot(&lot, lot_id)?;
        Ok(f(&mut monitor))
    }

    /// Applies one frame of detections to a lot.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownLot`] or [`RegistryError::Poisoned`]
    /// if the monitor cannot be reached.
    pub fn apply_detections(
        &self,
        lot_id: &LotId,
        detections: &[Detection],
    ) -> Result<LotSnapshot, RegistryError> {
        self.with_lot(lot_id, |monitor| monitor.apply_detections(detections))
    }

    /// Applies one frame of precomputed verdicts to a lot.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Frame`] if the verdicts do not cover the
    /// lot's spaces, or a lookup error if the monitor cannot be reached.
    pub fn apply_verdicts(
        &self,
        lot_id: &LotId,
        verdicts: &[bool],
    ) -> Result<LotSnapshot, RegistryError> {
        Ok(self.with_lot(lot_id, |monitor| monitor.apply_verdicts(verdicts))??)
    }

    /// Pulls one frame from `detector` and applies it to a lot.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Frame`] if the detector fails, or a lookup
    /// error if the monitor cannot be reached.
    pub fn process_frame<D: Detector>(
        &self,
        lot_id: &LotId,
        detector: &mut D,
        frame: &D::Frame,
    ) -> Result<LotSnapshot, RegistryError> {
        Ok(self.with_lot(lot_id, |monitor| monitor.process_frame(detector, frame))??)
    }

    /// Current snapshot of a lot.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownLot`] or [`RegistryError::Poisoned`]
    /// if the monitor cannot be reached.
    pub fn snapshot(&self, lot_id: &LotId) -> Result<LotSnapshot, RegistryError> {
        self.with_lot(lot_id, |monitor| monitor.snapshot())
    }

    /// Ends a lot's session, returning its final snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownLot`] if the lot has no session.
    pub fn remove(&self, lot_id: &LotId) -> Result<LotSnapshot, RegistryError> {
        let lot = self
            .lots
            .write()
            .map_err(|_| RegistryError::RegistryPoisoned)?
            .remove(lot_id)
            .ok_or_else(|| RegistryError::UnknownLot {
                lot_id: lot_id.clone(),
            })?;

        let monitor = lock_retired(&lot, lot_id);
        log::info!(
            "Removed lot {lot_id} after {} frames",
            monitor.frames_processed()
        );
        Ok(monitor.snapshot())
    }

    /// Ids of every lot with a session, in order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::RegistryPoisoned`] if the lot table lock is
    /// poisoned.
    pub fn lot_ids(&self) -> Result<Vec<LotId>, RegistryError> {
        Ok(self
            .lots
            .read()
            .map_err(|_| RegistryError::RegistryPoisoned)?
            .keys()
            .cloned()
            .collect())
    }
}

fn lock_lot<'a>(
    lot: &'a Mutex<LotMonitor>,
    lot_id: &LotId,
) -> Result<MutexGuard<'a, LotMonitor>, RegistryError> {
    lot.lock().map_err(|_| RegistryError::Poisoned {
        lot_id: lot_id.clone(),
    })
}

/// Locks a monitor that is no longer in the lot table. The table change
/// has already happened, so a poisoned lock is recovered instead of
/// reported.
fn lock_retired<'a>(lot: &'a Mutex<LotMonitor>, lot_id: &LotId) -> MutexGuard<'a, LotMonitor> {
    lot.lock().unwrap_or_else(|poisoned| {
        log::warn!("Retiring poisoned monitoring session for lot {lot_id}");
        PoisonError::into_inner(poisoned)
    })
}
