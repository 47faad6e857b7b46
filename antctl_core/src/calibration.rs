//! Two-point rail calibration: linear model, settling poll and persistence.

use std::path::{Path, PathBuf};

use antctl_traits::{BoxError, Clock};

use crate::config::{AdcScale, SettleCfg};
use crate::error::{ControlError, Result};
use crate::rail::Rail;

/// `voltage = slope * raw + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRecord {
    pub slope: f64,
    pub intercept: f64,
}

impl CalibrationRecord {
    /// The uncalibrated divider model.
    pub fn nominal(adc: &AdcScale) -> Self {
        Self {
            slope: adc.nominal_slope(),
            intercept: 0.0,
        }
    }

    #[inline]
    pub fn voltage(&self, raw: u16) -> f64 {
        self.slope * f64::from(raw) + self.intercept
    }

    /// Fit a line through two `(raw, volts)` points, given in any order.
    pub fn fit(rail: Rail, a: (u16, f64), b: (u16, f64)) -> Result<Self> {
        let ((raw0, v0), (raw1, v1)) = if a.0 <= b.0 { (a, b) } else { (b, a) };
        if raw0 == raw1 {
            return Err(ControlError::DegenerateCalibration { rail, raw: raw0 });
        }
        let slope = (v1 - v0) / (f64::from(raw1) - f64::from(raw0));
        Ok(Self {
            slope,
            intercept: v0 - slope * f64::from(raw0),
        })
    }
}

/// Records of both rails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSet {
    pub fixed: CalibrationRecord,
    pub adjustable: CalibrationRecord,
}

impl CalibrationSet {
    pub fn nominal(adc: &AdcScale) -> Self {
        let d = CalibrationRecord::nominal(adc);
        Self {
            fixed: d,
            adjustable: d,
        }
    }

    /// Stored records where present, the nominal model elsewhere.
    pub fn from_stored(stored: Option<&antctl_config::CalibrationFile>, adc: &AdcScale) -> Self {
        let d = CalibrationRecord::nominal(adc);
        let pick = |e: Option<antctl_config::RailCalibrationEntry>| e.map_or(d, Into::into);
        match stored {
            Some(f) => Self {
                fixed: pick(f.fixed),
                adjustable: pick(f.adjustable),
            },
            None => Self::nominal(adc),
        }
    }

    pub fn get(&self, rail: Rail) -> CalibrationRecord {
        match rail {
            Rail::Fixed => self.fixed,
            Rail::Adjustable => self.adjustable,
        }
    }

    pub fn set(&mut self, rail: Rail, record: CalibrationRecord) {
        match rail {
            Rail::Fixed => self.fixed = record,
            Rail::Adjustable => self.adjustable = record,
        }
    }

    pub fn to_file(&self) -> antctl_config::CalibrationFile {
        antctl_config::CalibrationFile {
            fixed: Some(self.fixed.into()),
            adjustable: Some(self.adjustable.into()),
        }
    }
}

/// Where calibration records live between runs.
pub trait CalibrationStore: Send + Sync {
    fn load(&self) -> Result<Option<antctl_config::CalibrationFile>>;
    fn save(&self, set: &CalibrationSet) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// TOML record on disk, written atomically.
#[derive(Debug, Clone)]
pub struct FileCalibrationStore {
    path: PathBuf,
}

impl FileCalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_err(e: &eyre::Report) -> ControlError {
    ControlError::Io(format!("{e:#}"))
}

impl CalibrationStore for FileCalibrationStore {
    fn load(&self) -> Result<Option<antctl_config::CalibrationFile>> {
        antctl_config::load_calibration_file(&self.path).map_err(|e| io_err(&e))
    }

    fn save(&self, set: &CalibrationSet) -> Result<()> {
        antctl_config::save_calibration_file(&self.path, &set.to_file()).map_err(|e| io_err(&e))
    }

    fn clear(&self) -> Result<()> {
        antctl_config::remove_calibration_file(&self.path).map_err(|e| io_err(&e))
    }
}

/// Supplies the externally measured rail voltage at a calibration point.
pub trait ReferenceMeter {
    fn measured_voltage(
        &mut self,
        rail: Rail,
        wiper: u8,
        raw: u16,
    ) -> std::result::Result<f64, BoxError>;
}

/// Outcome of a completed calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationOutcome {
    pub rail: Rail,
    pub record: CalibrationRecord,
    /// Raw/volt pairs in the order they were taken (wiper 0, then 255).
    pub points: [(u16, f64); 2],
    /// `false` when the record is in effect but could not be written.
    pub persisted: bool,
}

/// Poll `sample` until two consecutive readings differ by at most
/// `cfg.tolerance` counts. Returns the last reading.
pub fn wait_for_settle<C, F>(
    clock: &C,
    cfg: &SettleCfg,
    rail: Rail,
    wiper: u8,
    mut sample: F,
) -> Result<u16>
where
    C: Clock + ?Sized,
    F: FnMut() -> Result<u16>,
{
    let limit_ms = cfg
        .timeout
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
    let start = clock.now();
    let mut prev = sample()?;
    loop {
        if let Some(limit) = limit_ms
            && clock.ms_since(start) >= limit
        {
            return Err(ControlError::SettleTimeout {
                rail,
                wiper,
                timeout_ms: limit,
            });
        }
        clock.sleep(cfg.poll);
        let next = sample()?;
        tracing::debug!(%rail, wiper, prev, next, "settle poll");
        if next.abs_diff(prev) <= cfg.tolerance {
            return Ok(next);
        }
        prev = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use antctl_traits::clock::test_clock::TestClock;
    use std::time::Duration;

    #[test]
    fn fit_orders_points_by_raw() {
        let a = CalibrationRecord::fit(Rail::Fixed, (50_000, 9.0), (1_000, 0.5)).unwrap();
        let b = CalibrationRecord::fit(Rail::Fixed, (1_000, 0.5), (50_000, 9.0)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn settle_returns_once_two_samples_agree() {
        let clock = TestClock::new();
        let mut readings = [100u16, 400, 402, 403].into_iter();
        let raw = wait_for_settle(&clock, &SettleCfg::default(), Rail::Fixed, 0, || {
            Ok(readings.next().unwrap_or(403))
        })
        .unwrap();
        assert_eq!(raw, 402);
        assert_eq!(clock.elapsed(), Duration::from_secs(2));
    }
}
