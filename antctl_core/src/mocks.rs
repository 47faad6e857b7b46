//! Test and helper mocks for antctl_core

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use antctl_config::CalibrationFile;
use antctl_traits::{AdcChannel, BoxError, RailAdc};

use crate::calibration::{CalibrationSet, CalibrationStore, ReferenceMeter};
use crate::error::{ControlError, Result};
use crate::rail::Rail;
use crate::state::lock;

/// In-memory calibration store. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct MemoryCalibrationStore {
    record: Arc<Mutex<Option<CalibrationFile>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryCalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: CalibrationFile) -> Self {
        let s = Self::default();
        *lock(&s.record) = Some(record);
        s
    }

    pub fn record(&self) -> Option<CalibrationFile> {
        lock(&self.record).clone()
    }

    /// Make `save` and `clear` fail, as a read-only medium would.
    pub fn fail_writes(&self, fail: bool) {
        *lock(&self.fail_writes) = fail;
    }

    fn check_writable(&self) -> Result<()> {
        if *lock(&self.fail_writes) {
            return Err(ControlError::Io("calibration store is read-only".into()));
        }
        Ok(())
    }
}

impl CalibrationStore for MemoryCalibrationStore {
    fn load(&self) -> Result<Option<CalibrationFile>> {
        Ok(self.record())
    }

    fn save(&self, set: &CalibrationSet) -> Result<()> {
        self.check_writable()?;
        *lock(&self.record) = Some(set.to_file());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.check_writable()?;
        *lock(&self.record) = None;
        Ok(())
    }
}

/// Answers calibration prompts from a fixed script, in order.
#[derive(Debug, Default)]
pub struct ScriptedMeter {
    answers: VecDeque<f64>,
    /// `(rail, wiper, raw)` of every prompt received.
    pub prompts: Vec<(Rail, u8, u16)>,
}

impl ScriptedMeter {
    pub fn new(answers: impl IntoIterator<Item = f64>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            prompts: Vec::new(),
        }
    }
}

impl ReferenceMeter for ScriptedMeter {
    fn measured_voltage(
        &mut self,
        rail: Rail,
        wiper: u8,
        raw: u16,
    ) -> std::result::Result<f64, BoxError> {
        self.prompts.push((rail, wiper, raw));
        self.answers
            .pop_front()
            .ok_or_else(|| "no measurement entered".into())
    }
}

/// An ADC whose channels return fixed counts, or fail when set to `None`.
#[derive(Debug, Clone)]
pub struct FixedAdc {
    counts: Arc<Mutex<[Option<u16>; 3]>>,
}

impl FixedAdc {
    pub fn new(fixed: Option<u16>, adjustable: Option<u16>, sense: Option<u16>) -> Self {
        Self {
            counts: Arc::new(Mutex::new([fixed, adjustable, sense])),
        }
    }

    pub fn set(&self, channel: AdcChannel, count: Option<u16>) {
        lock(&self.counts)[channel_index(channel)] = count;
    }
}

fn channel_index(channel: AdcChannel) -> usize {
    match channel {
        AdcChannel::FixedRail => 0,
        AdcChannel::AdjustableRail => 1,
        AdcChannel::AntennaSense => 2,
    }
}

impl RailAdc for FixedAdc {
    fn read_count(&mut self, channel: AdcChannel) -> std::result::Result<u16, BoxError> {
        lock(&self.counts)[channel_index(channel)]
            .ok_or_else(|| format!("{channel:?} conversion failed").into())
    }
}
