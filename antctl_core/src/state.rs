//! Process-wide state shared by the command context and the scheduler.
//!
//! Every update is a single assignment under its own lock. Lock order when
//! more than one is needed: rail state, then ADC, then potentiometer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::calibration::{CalibrationRecord, CalibrationSet};
use crate::error::{ControlError, Result};
use crate::rail::{Rail, RailState};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

pub struct SharedState {
    fixed: Mutex<RailState>,
    adjustable: Mutex<RailState>,
    calibration: Mutex<CalibrationSet>,
    calibrating: AtomicBool,
    heartbeat: AtomicBool,
}

impl SharedState {
    pub fn new(fixed: RailState, adjustable: RailState, calibration: CalibrationSet) -> Self {
        Self {
            fixed: Mutex::new(fixed),
            adjustable: Mutex::new(adjustable),
            calibration: Mutex::new(calibration),
            calibrating: AtomicBool::new(false),
            heartbeat: AtomicBool::new(false),
        }
    }

    /// Hold a rail's state for a read-modify-write.
    pub fn rail(&self, rail: Rail) -> MutexGuard<'_, RailState> {
        match rail {
            Rail::Fixed => lock(&self.fixed),
            Rail::Adjustable => lock(&self.adjustable),
        }
    }

    pub fn rail_snapshot(&self, rail: Rail) -> RailState {
        *self.rail(rail)
    }

    pub fn calibration(&self) -> CalibrationSet {
        *lock(&self.calibration)
    }

    pub fn record(&self, rail: Rail) -> CalibrationRecord {
        lock(&self.calibration).get(rail)
    }

    /// Install a record and return the full set as it now stands.
    pub fn set_record(&self, rail: Rail, record: CalibrationRecord) -> CalibrationSet {
        let mut cal = lock(&self.calibration);
        cal.set(rail, record);
        *cal
    }

    pub fn replace_calibration(&self, set: CalibrationSet) {
        *lock(&self.calibration) = set;
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrating.load(Ordering::Acquire)
    }

    /// Raise the calibration flag until the guard drops.
    pub fn begin_calibration(&self) -> Result<CalibrationGuard<'_>> {
        self.calibrating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ControlError::Operator("a calibration is already running".into()))?;
        Ok(CalibrationGuard {
            flag: &self.calibrating,
        })
    }

    pub fn heartbeat(&self) -> bool {
        self.heartbeat.load(Ordering::Relaxed)
    }

    /// Flip the heartbeat and return the new level.
    pub fn toggle_heartbeat(&self) -> bool {
        !self.heartbeat.fetch_xor(true, Ordering::Relaxed)
    }
}

/// Clears the calibration flag on every exit path.
#[must_use = "the flag is cleared when the guard drops"]
pub struct CalibrationGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for CalibrationGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdcScale;

    fn state() -> SharedState {
        SharedState::new(
            RailState::new(3.3, 255),
            RailState::new(5.0, 255),
            CalibrationSet::nominal(&AdcScale::default()),
        )
    }

    #[test]
    fn guard_clears_flag_on_drop() {
        let s = state();
        {
            let _g = s.begin_calibration().unwrap();
            assert!(s.is_calibrating());
            assert!(s.begin_calibration().is_err());
        }
        assert!(!s.is_calibrating());
    }

    #[test]
    fn heartbeat_toggles() {
        let s = state();
        assert!(s.toggle_heartbeat());
        assert!(!s.toggle_heartbeat());
        assert!(!s.heartbeat());
    }
}
