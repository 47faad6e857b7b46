//! Simulated board used by the default (non-`hardware`) build and by tests.
//!
//! Every simulated device hands out cheap clonable handles over shared state
//! so a test can keep one while the board owns the device.

use std::sync::{Arc, Mutex, MutexGuard};

use antctl_traits::{
    AdcChannel, BoxError, LED_COUNT, ModeInputs, Potentiometer, PowerControl, RailAdc, Rgb,
    ShiftLine, ShiftLines, StatusLeds,
};
use tracing::trace;

use crate::util::{decode_mcp42010_frame, mcp42010_frame};

const STAGES: u32 = 48;
const STAGE_MASK: u64 = (1 << STAGES) - 1;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking test thread must not wedge the other handles.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct ChainState {
    ser: bool,
    srclk: bool,
    rclk: bool,
    oe_n: bool,
    /// Shift path; bit 47 feeds the serial output.
    shift: u64,
    /// Storage register driving the parallel outputs.
    latched: u64,
    latch_pulses: u64,
    stuck_out: Option<bool>,
    /// Serial-out samples left before reads start failing.
    reads_left: Option<u32>,
}

/// Six chained 74HC595-style registers with the serial output looped back.
///
/// A rising shift-clock edge shifts SER into the chain; a rising latch-clock
/// edge copies the shift path to the outputs.
#[derive(Debug, Clone, Default)]
pub struct SimulatedShiftChain {
    state: Arc<Mutex<ChainState>>,
}

impl SimulatedShiftChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latched outputs as a vector value: bit `i` is the `i`-th bit written.
    pub fn latched_value(&self) -> u64 {
        let latched = lock(&self.state).latched;
        reverse48(latched)
    }

    /// Preload both the shift path and the outputs, as if written earlier.
    pub fn preload(&self, value: u64) {
        let mut st = lock(&self.state);
        st.shift = reverse48(value & STAGE_MASK);
        st.latched = st.shift;
    }

    pub fn latch_pulses(&self) -> u64 {
        lock(&self.state).latch_pulses
    }

    pub fn outputs_enabled(&self) -> bool {
        !lock(&self.state).oe_n
    }

    /// Force the serial output to a fixed level to emulate a broken readback path.
    pub fn stick_serial_out(&self, level: Option<bool>) {
        lock(&self.state).stuck_out = level;
    }

    /// Let `n` more serial-out samples succeed, then fail every later one.
    /// `None` clears the fault.
    pub fn fail_reads_after(&self, n: Option<u32>) {
        lock(&self.state).reads_left = n;
    }
}

/// Map between chain order (bit 47 = first bit shifted in) and vector order.
fn reverse48(v: u64) -> u64 {
    (v & STAGE_MASK).reverse_bits() >> (64 - STAGES)
}

impl ShiftLines for SimulatedShiftChain {
    fn write_line(&mut self, line: ShiftLine, high: bool) -> Result<(), BoxError> {
        let mut st = lock(&self.state);
        match line {
            ShiftLine::SerialData => st.ser = high,
            ShiftLine::OutputEnableN => st.oe_n = high,
            ShiftLine::ShiftClock => {
                if high && !st.srclk {
                    st.shift = ((st.shift << 1) | u64::from(st.ser)) & STAGE_MASK;
                }
                st.srclk = high;
            }
            ShiftLine::LatchClock => {
                if high && !st.rclk {
                    st.latched = st.shift;
                    st.latch_pulses += 1;
                }
                st.rclk = high;
            }
        }
        Ok(())
    }

    fn read_serial_out(&mut self) -> Result<bool, BoxError> {
        let mut st = lock(&self.state);
        match st.reads_left {
            Some(0) => return Err("simulated serial-out fault".into()),
            Some(n) => st.reads_left = Some(n - 1),
            None => {}
        }
        Ok(st.stuck_out.unwrap_or((st.shift >> (STAGES - 1)) & 1 == 1))
    }
}

/// Linear response of one rail to the physical wiper code of its potentiometer.
#[derive(Debug, Clone, Copy)]
pub struct RailModel {
    pub pot: u8,
    pub volts_at_code_0: f64,
    pub volts_at_code_255: f64,
}

impl RailModel {
    fn steady_volts(&self, code: u8) -> f64 {
        let t = f64::from(code) / 255.0;
        self.volts_at_code_0 + (self.volts_at_code_255 - self.volts_at_code_0) * t
    }
}

#[derive(Debug)]
struct PlantState {
    codes: [u8; 2],
    fixed: RailModel,
    adjustable: RailModel,
    volts: [f64; 2],
    counts_per_volt: f64,
    /// Fraction of the remaining error closed on every ADC conversion.
    response: f64,
    sense: u16,
    pot_writes: u64,
}

impl PlantState {
    fn rail(&self, channel: AdcChannel) -> Option<(usize, RailModel)> {
        match channel {
            AdcChannel::FixedRail => Some((0, self.fixed)),
            AdcChannel::AdjustableRail => Some((1, self.adjustable)),
            AdcChannel::AntennaSense => None,
        }
    }

    fn to_counts(&self, volts: f64) -> u16 {
        (volts * self.counts_per_volt).round().clamp(0.0, f64::from(u16::MAX)) as u16
    }
}

/// Two supply rails regulated through a simulated MCP42010.
///
/// The default models match the board: the fixed rail on pot 1 spans
/// 2.8–3.8 V, the adjustable rail on pot 0 is wired inverted and spans
/// 9.0 V at code 0 down to 3.0 V at code 255. Counts follow the nominal
/// 3.7:1 divider into a 3.3 V, 16-bit converter.
#[derive(Debug, Clone)]
pub struct SimulatedPlant {
    state: Arc<Mutex<PlantState>>,
}

impl Default for SimulatedPlant {
    fn default() -> Self {
        Self::new(
            RailModel {
                pot: 1,
                volts_at_code_0: 2.8,
                volts_at_code_255: 3.8,
            },
            RailModel {
                pot: 0,
                volts_at_code_0: 9.0,
                volts_at_code_255: 3.0,
            },
        )
    }
}

impl SimulatedPlant {
    pub fn new(fixed: RailModel, adjustable: RailModel) -> Self {
        let mut st = PlantState {
            codes: [0, 0],
            fixed,
            adjustable,
            volts: [0.0, 0.0],
            counts_per_volt: 65535.0 / (3.3 * 3.7),
            response: 0.5,
            sense: 0,
            pot_writes: 0,
        };
        st.volts = [
            fixed.steady_volts(st.codes[usize::from(fixed.pot)]),
            adjustable.steady_volts(st.codes[usize::from(adjustable.pot)]),
        ];
        Self {
            state: Arc::new(Mutex::new(st)),
        }
    }

    /// Make every conversion report the steady-state value immediately.
    pub fn with_instant_response(self) -> Self {
        lock(&self.state).response = 1.0;
        self
    }

    pub fn adc(&self) -> SimulatedAdc {
        SimulatedAdc {
            plant: self.clone(),
        }
    }

    pub fn pots(&self) -> SimulatedPots {
        SimulatedPots {
            plant: self.clone(),
        }
    }

    /// Physical code last written to a pot channel.
    pub fn code(&self, pot: u8) -> u8 {
        lock(&self.state).codes[usize::from(pot & 1)]
    }

    pub fn pot_writes(&self) -> u64 {
        lock(&self.state).pot_writes
    }

    /// Current rail voltage as an external meter would read it.
    pub fn volts(&self, channel: AdcChannel) -> Option<f64> {
        let st = lock(&self.state);
        st.rail(channel).map(|(idx, _)| st.volts[idx])
    }

    /// Steady-state voltage for a physical code on the given rail.
    pub fn steady_volts(&self, channel: AdcChannel, code: u8) -> Option<f64> {
        let st = lock(&self.state);
        st.rail(channel).map(|(_, model)| model.steady_volts(code))
    }

    pub fn set_sense(&self, raw: u16) {
        lock(&self.state).sense = raw;
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedAdc {
    plant: SimulatedPlant,
}

impl RailAdc for SimulatedAdc {
    fn read_count(&mut self, channel: AdcChannel) -> Result<u16, BoxError> {
        let mut st = lock(&self.plant.state);
        let Some((idx, model)) = st.rail(channel) else {
            return Ok(st.sense);
        };
        let target = model.steady_volts(st.codes[usize::from(model.pot)]);
        let v = st.volts[idx] + (target - st.volts[idx]) * st.response;
        st.volts[idx] = v;
        let raw = st.to_counts(v);
        trace!(?channel, raw, "sim adc conversion");
        Ok(raw)
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedPots {
    plant: SimulatedPlant,
}

impl Potentiometer for SimulatedPots {
    fn write_wiper(&mut self, pot: u8, value: u8) -> Result<(), BoxError> {
        // Go through the wire format so the frame codec is exercised end to end.
        let frame = mcp42010_frame(pot, value)?;
        let (p0, p1, code) = decode_mcp42010_frame(frame)?;
        let mut st = lock(&self.plant.state);
        if p0 {
            st.codes[0] = code;
        }
        if p1 {
            st.codes[1] = code;
        }
        st.pot_writes += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedLeds {
    frame: Arc<Mutex<[Rgb; LED_COUNT]>>,
    updates: Arc<Mutex<u64>>,
}

impl SimulatedLeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> [Rgb; LED_COUNT] {
        *lock(&self.frame)
    }

    pub fn updates(&self) -> u64 {
        *lock(&self.updates)
    }
}

impl StatusLeds for SimulatedLeds {
    fn show(&mut self, frame: &[Rgb; LED_COUNT]) -> Result<(), BoxError> {
        *lock(&self.frame) = *frame;
        *lock(&self.updates) += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PowerState {
    fan_duty: u16,
    latch_released: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedPower {
    state: Arc<Mutex<PowerState>>,
}

impl SimulatedPower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fan_duty(&self) -> u16 {
        lock(&self.state).fan_duty
    }

    pub fn latch_released(&self) -> bool {
        lock(&self.state).latch_released
    }
}

impl PowerControl for SimulatedPower {
    fn set_fan_duty(&mut self, duty: u16) -> Result<(), BoxError> {
        lock(&self.state).fan_duty = duty;
        Ok(())
    }

    fn release_power_latch(&mut self) -> Result<(), BoxError> {
        lock(&self.state).latch_released = true;
        tracing::info!("simulated power latch released");
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedModePins {
    levels: Arc<Mutex<[bool; 4]>>,
}

impl SimulatedModePins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, levels: [bool; 4]) {
        *lock(&self.levels) = levels;
    }
}

impl ModeInputs for SimulatedModePins {
    fn read_mode_pins(&mut self) -> Result<[bool; 4], BoxError> {
        Ok(*lock(&self.levels))
    }
}

/// Every simulated device of one board, with handles for inspection.
#[derive(Debug, Clone, Default)]
pub struct SimBoard {
    pub chain: SimulatedShiftChain,
    pub plant: SimulatedPlant,
    pub leds: SimulatedLeds,
    pub power: SimulatedPower,
    pub mode: SimulatedModePins,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift_in(chain: &mut SimulatedShiftChain, bits: &[bool]) {
        for &b in bits {
            chain.write_line(ShiftLine::SerialData, b).unwrap();
            chain.write_line(ShiftLine::ShiftClock, true).unwrap();
            chain.write_line(ShiftLine::ShiftClock, false).unwrap();
        }
        chain.write_line(ShiftLine::LatchClock, true).unwrap();
        chain.write_line(ShiftLine::LatchClock, false).unwrap();
    }

    #[test]
    fn first_bit_shifted_lands_at_serial_out() {
        let mut chain = SimulatedShiftChain::new();
        let mut bits = vec![false; 48];
        bits[0] = true;
        bits[5] = true;
        shift_in(&mut chain, &bits);
        assert_eq!(chain.latched_value(), 0b10_0001);
        assert!(chain.read_serial_out().unwrap());
        assert_eq!(chain.latch_pulses(), 1);
    }

    #[test]
    fn clock_only_acts_on_rising_edge() {
        let mut chain = SimulatedShiftChain::new();
        chain.write_line(ShiftLine::SerialData, true).unwrap();
        chain.write_line(ShiftLine::ShiftClock, true).unwrap();
        chain.write_line(ShiftLine::ShiftClock, true).unwrap();
        chain.write_line(ShiftLine::LatchClock, true).unwrap();
        assert_eq!(chain.latched_value(), 1 << 47);
    }

    #[test]
    fn preload_matches_latched_value() {
        let chain = SimulatedShiftChain::new();
        chain.preload(0xABCD_EF01_2345);
        assert_eq!(chain.latched_value(), 0xABCD_EF01_2345);
    }

    #[test]
    fn plant_settles_toward_pot_code() {
        let plant = SimulatedPlant::default();
        let mut adc = plant.adc();
        let mut pots = plant.pots();
        pots.write_wiper(1, 255).unwrap();
        let first = adc.read_count(AdcChannel::FixedRail).unwrap();
        let mut last = first;
        for _ in 0..40 {
            last = adc.read_count(AdcChannel::FixedRail).unwrap();
        }
        assert!(last > first);
        let v = plant.volts(AdcChannel::FixedRail).unwrap();
        assert!((v - 3.8).abs() < 1e-3, "settled at {v}");
        assert_eq!(plant.code(1), 255);
        assert_eq!(plant.code(0), 0);
    }

    #[test]
    fn invalid_pot_is_rejected() {
        let plant = SimulatedPlant::default();
        let err = plant.pots().write_wiper(2, 10).unwrap_err();
        assert!(err.to_string().contains("channel 2"));
    }
}
