//! Supply rails, their live state and the one-step regulator.

use std::fmt;
use std::str::FromStr;

use antctl_traits::AdcChannel;

use crate::error::{ControlError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rail {
    Fixed,
    Adjustable,
}

impl Rail {
    pub const ALL: [Rail; 2] = [Rail::Fixed, Rail::Adjustable];

    pub const fn name(self) -> &'static str {
        match self {
            Rail::Fixed => "fixed",
            Rail::Adjustable => "adjustable",
        }
    }

    pub const fn adc_channel(self) -> AdcChannel {
        match self {
            Rail::Fixed => AdcChannel::FixedRail,
            Rail::Adjustable => AdcChannel::AdjustableRail,
        }
    }
}

impl fmt::Display for Rail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Rail {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        let t = s.trim();
        Rail::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(t))
            .ok_or_else(|| ControlError::UnknownRail(t.to_string()))
    }
}

/// Direction in which the rail voltage moves as the logical wiper increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Rising,
    Falling,
}

/// How a rail is attached to the dual potentiometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RailWiring {
    pub pot: u8,
    /// Physical code is `255 - wiper`.
    pub inverted: bool,
    pub polarity: Polarity,
}

impl RailWiring {
    #[inline]
    pub const fn physical_code(&self, wiper: u8) -> u8 {
        if self.inverted { 255 - wiper } else { wiper }
    }
}

/// Live regulation state of one rail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RailState {
    pub target: f64,
    pub filtered: f64,
    /// Logical wiper position.
    pub wiper: u8,
    pub auto_enabled: bool,
}

impl RailState {
    pub fn new(target: f64, wiper: u8) -> Self {
        Self {
            target,
            filtered: 0.0,
            wiper,
            auto_enabled: true,
        }
    }
}

/// EMA filter plus a deadbanded single-step controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regulator {
    pub alpha: f64,
    pub deadband: f64,
}

impl Default for Regulator {
    fn default() -> Self {
        Self {
            alpha: 0.9,
            deadband: 0.02,
        }
    }
}

impl Regulator {
    #[inline]
    pub fn filter(&self, previous: f64, sample: f64) -> f64 {
        self.alpha * sample + (1.0 - self.alpha) * previous
    }

    /// Next logical wiper: unchanged inside the deadband, otherwise one step
    /// toward the target, clamped to `0..=255`.
    pub fn step(&self, filtered: f64, target: f64, wiper: u8, polarity: Polarity) -> u8 {
        let diff = filtered - target;
        if !diff.is_finite() || diff.abs() <= self.deadband {
            return wiper;
        }
        let raise_wiper = match polarity {
            Polarity::Rising => diff < 0.0,
            Polarity::Falling => diff > 0.0,
        };
        if raise_wiper {
            wiper.saturating_add(1)
        } else {
            wiper.saturating_sub(1)
        }
    }
}
