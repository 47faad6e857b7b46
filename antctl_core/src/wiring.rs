//! Physical wiring of the 50-pin connector onto the 48 chain stages.
//!
//! - Stage→pin comes from the order the routed pins are enumerated along the
//!   chain, reversed so that the list index is the stage number.
//! - Pin→signal is a fixed 50-entry table. Known labelling problems are fixed by
//!   applying a named [`WiringCorrection`] before the two are composed.

use crate::bits::STAGES;
use crate::error::{ControlError, Result};

/// Number of connector pins.
pub const PINS: usize = 50;

/// Routed pins from the last stage to the first. Pin 8 (sense output) is not
/// on a register but is appended at the tail of the chain.
pub const CHAIN_ENUMERATION: [u8; STAGES] = [
    3, 34, 35, 18, 1, 2, 37, 20, 38, 21, 4, 39, 22, 5, 23, 6, 40, 24, 7, 41, 25, 42, 9, 26, 43, 10,
    27, 11, 44, 28, 12, 45, 29, 13, 46, 30, 14, 47, 15, 31, 48, 16, 32, 49, 17, 33, 50, 8,
];

/// Signal label of every connector pin, pin 1 first.
pub const PIN_TO_SIGNAL: [&str; PINS] = [
    "SS_04",
    "SS_02",
    "SS_01",
    "AT_02",
    "AT_01",
    "DGND",
    "DGND",
    "SENS_OUT",
    "AZ_23",
    "AZ_21",
    "AZ_20",
    "AZ_18",
    "DGND",
    "AZ_16",
    "AZ_15",
    "AZ_13",
    "AZ_12",
    "SS_03",
    "IF_I2C1_SDA",
    "SS_00",
    "FM_03",
    "AT_00",
    "FM_00",
    "DGND",
    "EL_00",
    "AZ_22",
    "AZ_09",
    "AZ_19",
    "AZ_06",
    "AZ_17",
    "AZ_04",
    "AZ_14",
    "AZ_01",
    "PE_8P0V_EN",
    "PE_3P3V_EN",
    "IF_I2C1_SCL",
    "DGND",
    "FM_02",
    "FM_01",
    "DGND",
    "EL_01",
    "AZ_11",
    "AZ_10",
    "AZ_08",
    "AZ_07",
    "DGND",
    "AZ_05",
    "AZ_03",
    "AZ_02",
    "AZ_00",
];

/// A named set of pin relabels applied to the pin→signal table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WiringCorrection {
    pub name: &'static str,
    /// `(pin, new label)` pairs.
    pub relabels: &'static [(u8, &'static str)],
}

/// Bit swaps observed on the FM, AT and SS lines during bring-up.
///
/// Each group is a permutation of its own labels, so the corrected table still
/// carries every bit exactly once.
pub const SUSPECTED_SWAPS: WiringCorrection = WiringCorrection {
    name: "suspected-swaps",
    relabels: &[
        (21, "FM_02"),
        (38, "FM_01"),
        (39, "FM_03"),
        (5, "AT_00"),
        (22, "AT_01"),
        (2, "SS_01"),
        (1, "SS_02"),
        (3, "SS_04"),
    ],
};

impl WiringCorrection {
    pub fn apply(&self, table: &mut [&'static str; PINS]) -> Result<()> {
        for &(pin, label) in self.relabels {
            let slot = pin_index(pin).ok_or_else(|| {
                ControlError::WiringTableInconsistency(format!(
                    "correction '{}' names pin {pin}, outside 1..={PINS}",
                    self.name
                ))
            })?;
            table[slot] = label;
        }
        Ok(())
    }
}

#[inline]
fn pin_index(pin: u8) -> Option<usize> {
    let p = usize::from(pin);
    (1..=PINS).contains(&p).then(|| p - 1)
}

/// One row of the resolved wiring table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageEntry {
    pub stage: usize,
    pub pin: u8,
    pub signal: &'static str,
}

/// Immutable stage↔pin bijection plus the pin→signal labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageMap {
    stage_to_pin: [u8; STAGES],
    pin_to_signal: [&'static str; PINS],
}

impl StageMap {
    /// The board wiring with the given corrections applied in order.
    pub fn board(corrections: &[WiringCorrection]) -> Result<Self> {
        let mut table = PIN_TO_SIGNAL;
        for c in corrections {
            c.apply(&mut table)?;
            tracing::info!(correction = c.name, "wiring correction applied");
        }
        Self::from_tables(&CHAIN_ENUMERATION, table)
    }

    /// Build from a chain enumeration (last stage first) and a label table.
    pub fn from_tables(enumeration: &[u8], pin_to_signal: [&'static str; PINS]) -> Result<Self> {
        if enumeration.len() != STAGES {
            return Err(ControlError::WiringTableInconsistency(format!(
                "chain enumeration has {} pins, expected {STAGES}",
                enumeration.len()
            )));
        }
        let mut seen = [false; PINS];
        let mut stage_to_pin = [0u8; STAGES];
        for (stage, &pin) in enumeration.iter().rev().enumerate() {
            let idx = pin_index(pin).ok_or_else(|| {
                ControlError::WiringTableInconsistency(format!("pin {pin} outside 1..={PINS}"))
            })?;
            if seen[idx] {
                return Err(ControlError::WiringTableInconsistency(format!(
                    "pin {pin} is routed to more than one stage"
                )));
            }
            seen[idx] = true;
            stage_to_pin[stage] = pin;
        }
        Ok(Self {
            stage_to_pin,
            pin_to_signal,
        })
    }

    pub fn pin(&self, stage: usize) -> Option<u8> {
        self.stage_to_pin.get(stage).copied()
    }

    pub fn stage_of_pin(&self, pin: u8) -> Option<usize> {
        self.stage_to_pin.iter().position(|&p| p == pin)
    }

    pub fn signal_of_pin(&self, pin: u8) -> Option<&'static str> {
        pin_index(pin).map(|i| self.pin_to_signal[i])
    }

    pub fn signal(&self, stage: usize) -> Option<&'static str> {
        self.pin(stage).and_then(|p| self.signal_of_pin(p))
    }

    /// Connector pins not routed to any stage.
    pub fn unrouted_pins(&self) -> Vec<u8> {
        (1..=PINS as u8)
            .filter(|p| self.stage_of_pin(*p).is_none())
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = StageEntry> + '_ {
        self.stage_to_pin
            .iter()
            .enumerate()
            .map(|(stage, &pin)| StageEntry {
                stage,
                pin,
                signal: self.signal_of_pin(pin).unwrap_or("?"),
            })
    }
}
