//! Runtime configuration of the board core.
//!
//! These are separate from the TOML-deserialized config in `antctl_config`;
//! see `conversions.rs` for the bridge.

use std::time::Duration;

use antctl_traits::Rgb;

use crate::indicator::ColorChannel;
use crate::rail::{Polarity, Rail, RailWiring, Regulator};

/// ADC scaling used for the uncalibrated default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdcScale {
    pub vref: f64,
    pub full_scale: u32,
    pub divider_ratio: f64,
}

impl Default for AdcScale {
    fn default() -> Self {
        Self {
            vref: 3.3,
            full_scale: 65_535,
            divider_ratio: 3.7,
        }
    }
}

impl AdcScale {
    /// Volts per raw count through the nominal divider.
    pub fn nominal_slope(&self) -> f64 {
        self.vref * self.divider_ratio / f64::from(self.full_scale.max(1))
    }
}

/// Scheduler periods and regulator tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlCfg {
    pub regulator: Regulator,
    /// Regulation tick (10 ms by default).
    pub tick: Duration,
    pub indicator: Duration,
    pub heartbeat: Duration,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            regulator: Regulator::default(),
            tick: Duration::from_millis(10),
            indicator: Duration::from_millis(250),
            heartbeat: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RailSettings {
    pub wiring: RailWiring,
    pub default_target: f64,
    pub max_target: f64,
    pub initial_wiper: u8,
}

impl RailSettings {
    /// Board defaults: the fixed rail sits on pot 1, the adjustable rail on
    /// pot 0 wired inverted.
    pub const fn board(rail: Rail) -> Self {
        match rail {
            Rail::Fixed => Self {
                wiring: RailWiring {
                    pot: 1,
                    inverted: false,
                    polarity: Polarity::Rising,
                },
                default_target: 3.3,
                max_target: 3.8,
                initial_wiper: 255,
            },
            Rail::Adjustable => Self {
                wiring: RailWiring {
                    pot: 0,
                    inverted: true,
                    polarity: Polarity::Rising,
                },
                default_target: 5.0,
                max_target: 9.0,
                initial_wiper: 255,
            },
        }
    }
}

/// Settling-poll parameters for calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleCfg {
    /// Two consecutive samples within this many counts are settled.
    pub tolerance: u16,
    pub poll: Duration,
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for SettleCfg {
    fn default() -> Self {
        Self {
            tolerance: 2,
            poll: Duration::from_secs(1),
            timeout: Some(Duration::from_secs(300)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorCfg {
    /// Ascending `(color, max_v)`; above the last bound the last color is used.
    pub thresholds: Vec<(Rgb, f64)>,
    pub crossed_channels: Option<(ColorChannel, ColorChannel)>,
}

impl Default for IndicatorCfg {
    fn default() -> Self {
        Self {
            thresholds: vec![
                (Rgb::new(true, false, false), 3.0),
                (Rgb::new(true, true, false), 4.0),
                (Rgb::new(false, true, false), 5.0),
                (Rgb::new(false, true, true), 6.0),
                (Rgb::new(false, false, true), 7.0),
                (Rgb::new(true, false, true), 8.0),
                (Rgb::new(true, true, true), 9.0),
            ],
            crossed_channels: None,
        }
    }
}

/// Everything [`crate::board::AntennaBoard`] needs besides its devices.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardConfig {
    pub bus_settle: Duration,
    pub adc: AdcScale,
    pub control: ControlCfg,
    pub fixed: RailSettings,
    pub adjustable: RailSettings,
    pub settle: SettleCfg,
    pub indicator: IndicatorCfg,
    pub apply_suspected_swaps: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            bus_settle: Duration::from_micros(1),
            adc: AdcScale::default(),
            control: ControlCfg::default(),
            fixed: RailSettings::board(Rail::Fixed),
            adjustable: RailSettings::board(Rail::Adjustable),
            settle: SettleCfg::default(),
            indicator: IndicatorCfg::default(),
            apply_suspected_swaps: false,
        }
    }
}

impl BoardConfig {
    pub fn rail(&self, rail: Rail) -> &RailSettings {
        match rail {
            Rail::Fixed => &self.fixed,
            Rail::Adjustable => &self.adjustable,
        }
    }
}
