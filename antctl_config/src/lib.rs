#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and calibration-record persistence for the antenna controller.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//!   Every section has defaults matching the board, so an empty file is valid.
//! - The rail calibration record is a flat TOML file with one
//!   `{ slope, intercept }` table per rail, written atomically.
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod atomic;

pub use atomic::write_atomic;

/// BCM pin numbers and SPI selects; only read by the hardware backend.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pins {
    pub sr_ser: u8,
    pub sr_oe: u8,
    pub sr_srclk: u8,
    pub sr_rclk: u8,
    pub sr_out: u8,
    pub led_oe: u8,
    pub led_rck: u8,
    pub led_srclr: u8,
    pub led_srck: u8,
    pub led_ser: u8,
    pub power_latch: u8,
    pub fan: u8,
    pub mode: [u8; 4],
    pub pot_spi_ss: u8,
    pub adc_spi_ss: u8,
    /// ADC inputs as `[fixed, adjustable, antenna_sense]`.
    pub adc_inputs: [u8; 3],
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            sr_ser: 6,
            sr_oe: 7,
            sr_srclk: 8,
            sr_rclk: 9,
            sr_out: 10,
            led_oe: 11,
            led_rck: 12,
            led_srclr: 13,
            led_srck: 18,
            led_ser: 19,
            power_latch: 22,
            fan: 21,
            mode: [2, 3, 4, 5],
            pot_spi_ss: 0,
            adc_spi_ss: 1,
            adc_inputs: [0, 1, 2],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BusCfg {
    /// Delay between a line change and the following clock edge (ns).
    pub settle_ns: u64,
}

impl Default for BusCfg {
    fn default() -> Self {
        Self { settle_ns: 1_000 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AdcCfg {
    pub vref: f64,
    pub full_scale: u32,
    /// Nominal rail divider ratio ahead of the converter.
    pub divider_ratio: f64,
}

impl Default for AdcCfg {
    fn default() -> Self {
        Self {
            vref: 3.3,
            full_scale: 65_535,
            divider_ratio: 3.7,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlCfg {
    /// EMA weight of the newest sample, (0.0, 1.0].
    pub alpha: f64,
    /// No wiper step while |filtered - target| <= deadband_v.
    pub deadband_v: f64,
    pub tick_ms: u64,
    pub indicator_ms: u64,
    pub heartbeat_ms: u64,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            alpha: 0.9,
            deadband_v: 0.02,
            tick_ms: 10,
            indicator_ms: 250,
            heartbeat_ms: 1_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Raising the logical wiper raises the rail voltage.
    Rising,
    Falling,
}

/// Per-rail settings. Unset values fall back to the rail's board defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RailCfg {
    pub pot: Option<u8>,
    /// Physical code = 255 - logical wiper.
    pub inverted: Option<bool>,
    pub polarity: Option<Polarity>,
    pub default_target_v: Option<f64>,
    pub max_target_v: Option<f64>,
    pub initial_wiper: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Rails {
    pub fixed: RailCfg,
    pub adjustable: RailCfg,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Calibration record location.
    pub file: String,
    /// Consecutive samples within this many counts count as settled.
    pub settle_tolerance: u16,
    pub poll_ms: u64,
    /// Give up waiting for settling after this long; 0 waits indefinitely.
    pub settle_timeout_ms: u64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            file: "rail_calibration.toml".to_string(),
            settle_tolerance: 2,
            poll_ms: 1_000,
            settle_timeout_ms: 300_000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct WiringCfg {
    /// Apply the suspected FM/AT/SS signal swaps found during bring-up.
    pub apply_suspected_swaps: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorChannel {
    R,
    G,
    B,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IndicatorCfg {
    /// Adjustable-rail color table, ascending by `max_v`. Accepts either:
    /// - array of tables: [{ color = [1, 0, 0], max_v = 3.0 }, ...]
    /// - array of tuples: [[[1, 0, 0], 3.0], ...]
    #[serde(deserialize_with = "de_thresholds")]
    pub thresholds: Vec<([u8; 3], f64)>,
    /// Two color channels physically crossed on the LED board.
    pub crossed_channels: Option<[ColorChannel; 2]>,
    /// Settle delay for the LED chain (ns).
    pub settle_ns: u64,
}

impl Default for IndicatorCfg {
    fn default() -> Self {
        Self {
            thresholds: vec![
                ([1, 0, 0], 3.0),
                ([1, 1, 0], 4.0),
                ([0, 1, 0], 5.0),
                ([0, 1, 1], 6.0),
                ([0, 0, 1], 7.0),
                ([1, 0, 1], 8.0),
                ([1, 1, 1], 9.0),
            ],
            crossed_channels: None,
            settle_ns: 1_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ThresholdToml {
    Tuple(([u8; 3], f64)),
    Table { color: [u8; 3], max_v: f64 },
}

fn de_thresholds<'de, D>(deserializer: D) -> Result<Vec<([u8; 3], f64)>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Vec<ThresholdToml> = Vec::deserialize(deserializer)?;
    Ok(items
        .into_iter()
        .map(|t| match t {
            ThresholdToml::Tuple(pair) => pair,
            ThresholdToml::Table { color, max_v } => (color, max_v),
        })
        .collect())
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub bus: BusCfg,
    pub adc: AdcCfg,
    pub control: ControlCfg,
    pub rails: Rails,
    pub calibration: CalibrationCfg,
    pub wiring: WiringCfg,
    pub indicator: IndicatorCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn validate_rail(name: &str, rail: &RailCfg) -> eyre::Result<()> {
    if let Some(pot) = rail.pot
        && pot > 1
    {
        eyre::bail!("rails.{name}.pot must be 0 or 1");
    }
    if let Some(max) = rail.max_target_v
        && !(max.is_finite() && max > 0.0)
    {
        eyre::bail!("rails.{name}.max_target_v must be > 0");
    }
    if let Some(target) = rail.default_target_v {
        if !(target.is_finite() && target >= 0.0) {
            eyre::bail!("rails.{name}.default_target_v must be >= 0");
        }
        if let Some(max) = rail.max_target_v
            && target > max
        {
            eyre::bail!("rails.{name}.default_target_v exceeds max_target_v");
        }
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Bus
        if self.bus.settle_ns > 1_000_000 {
            eyre::bail!("bus.settle_ns is unreasonably large (>1ms)");
        }

        // ADC
        if !(self.adc.vref.is_finite() && self.adc.vref > 0.0) {
            eyre::bail!("adc.vref must be > 0");
        }
        if self.adc.full_scale == 0 {
            eyre::bail!("adc.full_scale must be > 0");
        }
        if !(self.adc.divider_ratio.is_finite() && self.adc.divider_ratio > 0.0) {
            eyre::bail!("adc.divider_ratio must be > 0");
        }

        // Control
        if !(self.control.alpha > 0.0 && self.control.alpha <= 1.0) {
            eyre::bail!("control.alpha must be in (0.0, 1.0]");
        }
        if !(self.control.deadband_v >= 0.0 && self.control.deadband_v < 1.0) {
            eyre::bail!("control.deadband_v must be in [0.0, 1.0)");
        }
        if self.control.tick_ms == 0 {
            eyre::bail!("control.tick_ms must be >= 1");
        }
        if self.control.indicator_ms == 0 {
            eyre::bail!("control.indicator_ms must be >= 1");
        }
        if self.control.heartbeat_ms == 0 {
            eyre::bail!("control.heartbeat_ms must be >= 1");
        }

        // Rails
        validate_rail("fixed", &self.rails.fixed)?;
        validate_rail("adjustable", &self.rails.adjustable)?;
        let fixed_pot = self.rails.fixed.pot.unwrap_or(1);
        let adjustable_pot = self.rails.adjustable.pot.unwrap_or(0);
        if fixed_pot == adjustable_pot {
            eyre::bail!("rails.fixed.pot and rails.adjustable.pot must differ");
        }

        // Calibration
        if self.calibration.file.trim().is_empty() {
            eyre::bail!("calibration.file must not be empty");
        }
        if self.calibration.poll_ms == 0 {
            eyre::bail!("calibration.poll_ms must be >= 1");
        }
        if self.calibration.settle_tolerance > 1_000 {
            eyre::bail!("calibration.settle_tolerance is unreasonably large (>1000 counts)");
        }

        // Indicator
        if self.indicator.thresholds.is_empty() {
            eyre::bail!("indicator.thresholds must not be empty");
        }
        if self
            .indicator
            .thresholds
            .windows(2)
            .any(|w| w[1].1 <= w[0].1)
        {
            eyre::bail!("indicator.thresholds must be strictly ascending by max_v");
        }
        if self
            .indicator
            .thresholds
            .iter()
            .any(|(color, _)| color.iter().any(|&c| c > 1))
        {
            eyre::bail!("indicator.thresholds colors must be 0/1 per channel");
        }
        if let Some([a, b]) = self.indicator.crossed_channels
            && a == b
        {
            eyre::bail!("indicator.crossed_channels must name two different channels");
        }

        Ok(())
    }
}

/// Stored calibration of one rail: `voltage = slope * raw + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RailCalibrationEntry {
    pub slope: f64,
    pub intercept: f64,
}

impl RailCalibrationEntry {
    fn is_finite(&self) -> bool {
        self.slope.is_finite() && self.intercept.is_finite()
    }
}

/// On-disk calibration record; a missing rail means "use the default".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalibrationFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed: Option<RailCalibrationEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustable: Option<RailCalibrationEntry>,
}

/// Parse a calibration record. Each rail is taken independently: a rail whose
/// table is missing, malformed or non-finite is left unset.
pub fn parse_calibration(s: &str) -> eyre::Result<CalibrationFile> {
    let table: toml::Table =
        toml::from_str(s).map_err(|e| eyre::eyre!("parse calibration record: {e}"))?;
    let entry = |name: &str| {
        table
            .get(name)
            .cloned()
            .and_then(|v| v.try_into::<RailCalibrationEntry>().ok())
            .filter(RailCalibrationEntry::is_finite)
    };
    Ok(CalibrationFile {
        fixed: entry("fixed"),
        adjustable: entry("adjustable"),
    })
}

/// Load the calibration record; `Ok(None)` when the file does not exist.
pub fn load_calibration_file(path: &Path) -> eyre::Result<Option<CalibrationFile>> {
    match std::fs::read_to_string(path) {
        Ok(s) => parse_calibration(&s).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(eyre::eyre!("read calibration record {:?}: {}", path, e)),
    }
}

pub fn save_calibration_file(path: &Path, record: &CalibrationFile) -> eyre::Result<()> {
    let text = toml::to_string(record)
        .map_err(|e| eyre::eyre!("serialize calibration record: {e}"))?;
    write_atomic(path, text.as_bytes())
        .map_err(|e| eyre::eyre!("write calibration record {:?}: {}", path, e))
}

/// Delete the calibration record; a missing file is not an error.
pub fn remove_calibration_file(path: &Path) -> eyre::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(eyre::eyre!("remove calibration record {:?}: {}", path, e)),
    }
}
