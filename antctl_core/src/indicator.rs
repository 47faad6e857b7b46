//! Status LED frame composition.

use antctl_traits::{LED_COUNT, Rgb};

use crate::config::IndicatorCfg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChannel {
    R,
    G,
    B,
}

/// Regulation mode shown on LED 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Calibrating,
    Manual,
    Auto,
}

const RED: Rgb = Rgb::new(true, false, false);
const YELLOW: Rgb = Rgb::new(true, true, false);
const GREEN: Rgb = Rgb::new(false, true, false);

/// Inputs of one indicator refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorInputs {
    pub adjustable_volts: f64,
    pub pe_3v3: bool,
    pub pe_8v0: bool,
    pub mode: Mode,
    pub heartbeat: bool,
}

/// First color whose bound is `>= volts`, else the last color.
pub fn voltage_color(thresholds: &[(Rgb, f64)], volts: f64) -> Rgb {
    thresholds
        .iter()
        .find(|(_, max_v)| volts <= *max_v)
        .or(thresholds.last())
        .map_or(Rgb::OFF, |(c, _)| *c)
}

/// Swap two channels of every LED to match a board with crossed traces.
pub fn cross_channels(frame: &mut [Rgb; LED_COUNT], pair: (ColorChannel, ColorChannel)) {
    fn get(c: &Rgb, ch: ColorChannel) -> bool {
        match ch {
            ColorChannel::R => c.r,
            ColorChannel::G => c.g,
            ColorChannel::B => c.b,
        }
    }
    fn set(c: &mut Rgb, ch: ColorChannel, v: bool) {
        match ch {
            ColorChannel::R => c.r = v,
            ColorChannel::G => c.g = v,
            ColorChannel::B => c.b = v,
        }
    }
    let (a, b) = pair;
    for led in frame.iter_mut() {
        let (va, vb) = (get(led, a), get(led, b));
        set(led, a, vb);
        set(led, b, va);
    }
}

pub fn compose_frame(cfg: &IndicatorCfg, inputs: &IndicatorInputs) -> [Rgb; LED_COUNT] {
    let mut frame = [
        voltage_color(&cfg.thresholds, inputs.adjustable_volts),
        Rgb::new(false, inputs.pe_3v3, inputs.pe_8v0),
        match inputs.mode {
            Mode::Calibrating => RED,
            Mode::Manual => YELLOW,
            Mode::Auto => GREEN,
        },
        if inputs.heartbeat { GREEN } else { Rgb::OFF },
    ];
    if let Some(pair) = cfg.crossed_channels {
        cross_channels(&mut frame, pair);
    }
    frame
}
