//! `From` implementations bridging `antctl_config` types to `antctl_core` types.

use std::time::Duration;

use antctl_traits::Rgb;

use crate::calibration::CalibrationRecord;
use crate::config::{AdcScale, BoardConfig, ControlCfg, IndicatorCfg, RailSettings, SettleCfg};
use crate::indicator::ColorChannel;
use crate::rail::{Polarity, Rail, RailWiring, Regulator};

// ── ADC ──────────────────────────────────────────────────────────────────────

impl From<&antctl_config::AdcCfg> for AdcScale {
    fn from(c: &antctl_config::AdcCfg) -> Self {
        Self {
            vref: c.vref,
            full_scale: c.full_scale,
            divider_ratio: c.divider_ratio,
        }
    }
}

// ── Control ──────────────────────────────────────────────────────────────────

impl From<&antctl_config::ControlCfg> for ControlCfg {
    fn from(c: &antctl_config::ControlCfg) -> Self {
        Self {
            regulator: Regulator {
                alpha: c.alpha,
                deadband: c.deadband_v,
            },
            tick: Duration::from_millis(c.tick_ms),
            indicator: Duration::from_millis(c.indicator_ms),
            heartbeat: Duration::from_millis(c.heartbeat_ms),
        }
    }
}

// ── Rails ────────────────────────────────────────────────────────────────────

impl From<antctl_config::Polarity> for Polarity {
    fn from(p: antctl_config::Polarity) -> Self {
        match p {
            antctl_config::Polarity::Rising => Polarity::Rising,
            antctl_config::Polarity::Falling => Polarity::Falling,
        }
    }
}

impl RailSettings {
    /// Board defaults for `rail`, overridden by whatever `c` sets.
    pub fn from_cfg(rail: Rail, c: &antctl_config::RailCfg) -> Self {
        let d = RailSettings::board(rail);
        Self {
            wiring: RailWiring {
                pot: c.pot.unwrap_or(d.wiring.pot),
                inverted: c.inverted.unwrap_or(d.wiring.inverted),
                polarity: c.polarity.map_or(d.wiring.polarity, Polarity::from),
            },
            default_target: c.default_target_v.unwrap_or(d.default_target),
            max_target: c.max_target_v.unwrap_or(d.max_target),
            initial_wiper: c.initial_wiper.unwrap_or(d.initial_wiper),
        }
    }
}

// ── Calibration ──────────────────────────────────────────────────────────────

impl From<&antctl_config::CalibrationCfg> for SettleCfg {
    fn from(c: &antctl_config::CalibrationCfg) -> Self {
        Self {
            tolerance: c.settle_tolerance,
            poll: Duration::from_millis(c.poll_ms),
            timeout: (c.settle_timeout_ms > 0).then(|| Duration::from_millis(c.settle_timeout_ms)),
        }
    }
}

impl From<antctl_config::RailCalibrationEntry> for CalibrationRecord {
    fn from(e: antctl_config::RailCalibrationEntry) -> Self {
        Self {
            slope: e.slope,
            intercept: e.intercept,
        }
    }
}

impl From<CalibrationRecord> for antctl_config::RailCalibrationEntry {
    fn from(r: CalibrationRecord) -> Self {
        Self {
            slope: r.slope,
            intercept: r.intercept,
        }
    }
}

// ── Indicator ────────────────────────────────────────────────────────────────

impl From<antctl_config::ColorChannel> for ColorChannel {
    fn from(c: antctl_config::ColorChannel) -> Self {
        match c {
            antctl_config::ColorChannel::R => ColorChannel::R,
            antctl_config::ColorChannel::G => ColorChannel::G,
            antctl_config::ColorChannel::B => ColorChannel::B,
        }
    }
}

impl From<&antctl_config::IndicatorCfg> for IndicatorCfg {
    fn from(c: &antctl_config::IndicatorCfg) -> Self {
        Self {
            thresholds: c
                .thresholds
                .iter()
                .map(|&([r, g, b], max_v)| (Rgb::new(r != 0, g != 0, b != 0), max_v))
                .collect(),
            crossed_channels: c.crossed_channels.map(|[a, b]| (a.into(), b.into())),
        }
    }
}

// ── Whole config ─────────────────────────────────────────────────────────────

impl From<&antctl_config::Config> for BoardConfig {
    fn from(c: &antctl_config::Config) -> Self {
        Self {
            bus_settle: Duration::from_nanos(c.bus.settle_ns),
            adc: (&c.adc).into(),
            control: (&c.control).into(),
            fixed: RailSettings::from_cfg(Rail::Fixed, &c.rails.fixed),
            adjustable: RailSettings::from_cfg(Rail::Adjustable, &c.rails.adjustable),
            settle: (&c.calibration).into(),
            indicator: (&c.indicator).into(),
            apply_suspected_swaps: c.wiring.apply_suspected_swaps,
        }
    }
}
