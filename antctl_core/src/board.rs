//! The antenna-control board: chain fields, rail regulation and auxiliaries
//! behind one shareable handle.
//!
//! `AntennaBoard` is `Sync`; the console and the scheduler thread share it
//! through an `Arc`. Each device sits behind its own mutex, and a field update
//! holds the bus lock for the whole read-modify-write.

use std::sync::Mutex;
use std::time::Duration;

use antctl_traits::{
    Clock, LED_COUNT, ModeInputs, Potentiometer, PowerControl, RailAdc, Rgb, ShiftLines,
    StatusLeds,
};
use tracing::{debug, info, warn};

use crate::bits::{BitVector48, PatternInput};
use crate::bus::{ShiftRegisterBus, WriteReport};
use crate::calibration::{
    CalibrationOutcome, CalibrationRecord, CalibrationSet, CalibrationStore, ReferenceMeter,
    wait_for_settle,
};
use crate::config::BoardConfig;
use crate::error::{ControlError, Result};
use crate::fields::{Field, FieldGroups};
use crate::hw_error::hw;
use crate::indicator::{IndicatorInputs, Mode, compose_frame};
use crate::pattern::{self, FieldOverrides, FieldValues};
use crate::rail::{Rail, RailState};
use crate::state::{SharedState, lock};
use crate::util::{fan_duty, mode_from_pins};
use crate::wiring::{SUSPECTED_SWAPS, StageMap};

/// Delay between stopping the fan and releasing the power latch.
const SHUTDOWN_FAN_DELAY: Duration = Duration::from_millis(100);

pub type BoxedLines = Box<dyn ShiftLines + Send>;

/// Every device the board drives.
pub struct BoardIo {
    pub lines: BoxedLines,
    pub adc: Box<dyn RailAdc + Send>,
    pub pots: Box<dyn Potentiometer + Send>,
    pub leds: Box<dyn StatusLeds + Send>,
    pub power: Box<dyn PowerControl + Send>,
    pub mode: Box<dyn ModeInputs + Send>,
}

/// A fresh conversion of one rail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RailReading {
    pub volts: f64,
    pub target: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RailDiagnostics {
    pub rail: Rail,
    pub raw: u16,
    pub record: CalibrationRecord,
    pub volts: f64,
    pub state: RailState,
}

/// What one regulation tick did to a rail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RailTick {
    pub filtered: f64,
    pub wiper: u8,
    pub stepped: bool,
}

pub struct AntennaBoard {
    cfg: BoardConfig,
    map: StageMap,
    groups: FieldGroups,
    bus: Mutex<ShiftRegisterBus<BoxedLines>>,
    adc: Mutex<Box<dyn RailAdc + Send>>,
    pots: Mutex<Box<dyn Potentiometer + Send>>,
    leds: Mutex<Box<dyn StatusLeds + Send>>,
    power: Mutex<Box<dyn PowerControl + Send>>,
    mode: Mutex<Box<dyn ModeInputs + Send>>,
    state: SharedState,
    store: Box<dyn CalibrationStore>,
    clock: Box<dyn Clock + Send + Sync>,
}

/// Each rail needs its own channel of the dual potentiometer.
fn check_pots(cfg: &BoardConfig) -> Result<()> {
    let fixed = cfg.rail(Rail::Fixed).wiring.pot;
    let adjustable = cfg.rail(Rail::Adjustable).wiring.pot;
    if fixed > 1 || adjustable > 1 {
        return Err(ControlError::Config(format!(
            "pot channels must be 0 or 1 (fixed={fixed}, adjustable={adjustable})"
        )));
    }
    if fixed == adjustable {
        return Err(ControlError::Config(format!(
            "fixed and adjustable rails share pot {fixed}"
        )));
    }
    Ok(())
}

impl AntennaBoard {
    /// Resolve the wiring and load calibration. No device is touched until
    /// [`AntennaBoard::startup`].
    pub fn new(
        cfg: BoardConfig,
        io: BoardIo,
        store: Box<dyn CalibrationStore>,
        clock: Box<dyn Clock + Send + Sync>,
    ) -> Result<Self> {
        check_pots(&cfg)?;
        let corrections = if cfg.apply_suspected_swaps {
            vec![SUSPECTED_SWAPS]
        } else {
            Vec::new()
        };
        let map = StageMap::board(&corrections)?;
        let groups = FieldGroups::from_stage_map(&map)?;

        let stored = match store.load() {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "calibration record unreadable; using defaults");
                None
            }
        };
        let calibration = CalibrationSet::from_stored(stored.as_ref(), &cfg.adc);
        let rail_state = |rail| {
            let s = cfg.rail(rail);
            RailState::new(s.default_target, s.initial_wiper)
        };
        let state = SharedState::new(
            rail_state(Rail::Fixed),
            rail_state(Rail::Adjustable),
            calibration,
        );

        Ok(Self {
            bus: Mutex::new(ShiftRegisterBus::new(io.lines, cfg.bus_settle)),
            adc: Mutex::new(io.adc),
            pots: Mutex::new(io.pots),
            leds: Mutex::new(io.leds),
            power: Mutex::new(io.power),
            mode: Mutex::new(io.mode),
            cfg,
            map,
            groups,
            state,
            store,
            clock,
        })
    }

    pub fn config(&self) -> &BoardConfig {
        &self.cfg
    }

    pub fn stage_map(&self) -> &StageMap {
        &self.map
    }

    pub fn groups(&self) -> &FieldGroups {
        &self.groups
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Seed the rail filters with one conversion each, then drive the initial wipers.
    pub fn startup(&self) -> Result<()> {
        for rail in Rail::ALL {
            let mut st = self.state.rail(rail);
            let raw = self.read_raw(rail)?;
            st.filtered = self.state.record(rail).voltage(raw);
        }
        for rail in [Rail::Adjustable, Rail::Fixed] {
            let st = self.state.rail(rail);
            self.write_wiper(rail, st.wiper)?;
        }
        info!("board started");
        Ok(())
    }

    /// Fan off, short pause, then release the power latch.
    pub fn shutdown(&self) -> Result<()> {
        info!("shutting down");
        lock(&self.power).set_fan_duty(0).map_err(hw)?;
        self.clock.sleep(SHUTDOWN_FAN_DELAY);
        lock(&self.power).release_power_latch().map_err(hw)?;
        Ok(())
    }

    // ── chain ────────────────────────────────────────────────────────────────

    /// Decode and write a raw 48-bit pattern, then verify it by readback.
    pub fn write_raw_pattern(&self, input: &PatternInput) -> Result<WriteReport> {
        let v = input.decode()?;
        lock(&self.bus).write_verified(v)
    }

    /// Push `test` through the chain and read it back. The pattern latched
    /// before is restored whether or not the check itself succeeded.
    pub fn check_chain(&self, test: BitVector48) -> Result<WriteReport> {
        let mut bus = lock(&self.bus);
        let before = bus.read()?;
        let checked = bus.write_verified(test);
        let restored = bus.write(before);
        let report = checked?;
        restored?;
        Ok(report)
    }

    pub fn set_field(&self, field: Field, value: u64) -> Result<BitVector48> {
        self.set_fields(&FieldOverrides::new().with(field, value)?)
    }

    /// Overlay several fields in one read-modify-write.
    pub fn set_fields(&self, overrides: &FieldOverrides) -> Result<BitVector48> {
        let mut bus = lock(&self.bus);
        let pattern = pattern::build_pattern(&mut *bus, &self.groups, overrides)?;
        bus.write(pattern)?;
        info!(?overrides, %pattern, "fields written");
        Ok(pattern)
    }

    pub fn read_field(&self, field: Field) -> Result<u32> {
        pattern::read_field(&mut *lock(&self.bus), &self.groups, field)
    }

    pub fn read_all_fields(&self) -> Result<FieldValues> {
        pattern::read_all_fields(&mut *lock(&self.bus), &self.groups)
    }

    // ── rails ────────────────────────────────────────────────────────────────

    fn read_raw(&self, rail: Rail) -> Result<u16> {
        lock(&self.adc).read_count(rail.adc_channel()).map_err(hw)
    }

    fn write_wiper(&self, rail: Rail, wiper: u8) -> Result<()> {
        let wiring = self.cfg.rail(rail).wiring;
        lock(&self.pots)
            .write_wiper(wiring.pot, wiring.physical_code(wiper))
            .map_err(hw)
    }

    /// Rail whose potentiometer channel is `pot`.
    pub fn rail_for_pot(&self, pot: u8) -> Option<Rail> {
        Rail::ALL
            .into_iter()
            .find(|r| self.cfg.rail(*r).wiring.pot == pot)
    }

    /// Set a rail's target and hand it back to the regulator.
    pub fn set_rail_target(&self, rail: Rail, volts: f64) -> Result<()> {
        let max = self.cfg.rail(rail).max_target;
        if !(volts.is_finite() && (0.0..=max).contains(&volts)) {
            return Err(ControlError::TargetOutOfRange { rail, volts, max });
        }
        let mut st = self.state.rail(rail);
        st.target = volts;
        st.auto_enabled = true;
        info!(%rail, volts, "rail target set");
        Ok(())
    }

    /// Convert the rail now and report it alongside its target.
    pub fn read_rail(&self, rail: Rail) -> Result<RailReading> {
        let target = self.state.rail_snapshot(rail).target;
        let raw = self.read_raw(rail)?;
        Ok(RailReading {
            volts: self.state.record(rail).voltage(raw),
            target,
        })
    }

    /// Take a rail out of automatic control and park its wiper.
    pub fn set_wiper_manual(&self, rail: Rail, wiper: u8) -> Result<()> {
        let mut st = self.state.rail(rail);
        st.auto_enabled = false;
        self.write_wiper(rail, wiper)?;
        st.wiper = wiper;
        info!(%rail, wiper, "manual wiper set");
        Ok(())
    }

    pub fn rail_diagnostics(&self, rail: Rail) -> Result<RailDiagnostics> {
        let raw = self.read_raw(rail)?;
        let record = self.state.record(rail);
        Ok(RailDiagnostics {
            rail,
            raw,
            record,
            volts: record.voltage(raw),
            state: self.state.rail_snapshot(rail),
        })
    }

    /// One regulator pass over a rail. The filter always advances; the wiper
    /// only moves when the rail is automatic and no calibration is running.
    pub fn tick_rail(&self, rail: Rail) -> Result<RailTick> {
        let regulator = self.cfg.control.regulator;
        let mut st = self.state.rail(rail);
        let raw = self.read_raw(rail)?;
        st.filtered = regulator.filter(st.filtered, self.state.record(rail).voltage(raw));
        let held = RailTick {
            filtered: st.filtered,
            wiper: st.wiper,
            stepped: false,
        };
        if !st.auto_enabled || self.state.is_calibrating() {
            return Ok(held);
        }
        let polarity = self.cfg.rail(rail).wiring.polarity;
        let next = regulator.step(st.filtered, st.target, st.wiper, polarity);
        if next == st.wiper {
            return Ok(held);
        }
        self.write_wiper(rail, next)?;
        st.wiper = next;
        debug!(%rail, filtered = st.filtered, target = st.target, wiper = next, "wiper stepped");
        Ok(RailTick {
            wiper: next,
            stepped: true,
            ..held
        })
    }

    /// Tick both rails independently; a failing rail does not stop the other.
    pub fn regulation_tick(&self) -> Vec<(Rail, ControlError)> {
        let mut failures = Vec::new();
        for rail in Rail::ALL {
            if let Err(e) = self.tick_rail(rail) {
                warn!(%rail, error = %e, "regulation tick failed");
                failures.push((rail, e));
            }
        }
        failures
    }

    // ── calibration ──────────────────────────────────────────────────────────

    fn settle_at(&self, rail: Rail, wiper: u8) -> Result<u16> {
        {
            let mut st = self.state.rail(rail);
            self.write_wiper(rail, wiper)?;
            st.wiper = wiper;
        }
        info!(%rail, wiper, "waiting for rail to settle");
        wait_for_settle(self.clock.as_ref(), &self.cfg.settle, rail, wiper, || {
            self.read_raw(rail)
        })
    }

    /// Two-point calibration at wiper 0 and 255. On any failure the previous
    /// record stays in effect.
    pub fn calibrate_rail(
        &self,
        rail: Rail,
        meter: &mut dyn ReferenceMeter,
    ) -> Result<CalibrationOutcome> {
        let _guard = self.state.begin_calibration()?;
        self.calibrate_locked(rail, meter)
    }

    /// Calibrate the adjustable rail, then the fixed rail.
    pub fn calibrate_all(&self, meter: &mut dyn ReferenceMeter) -> Result<Vec<CalibrationOutcome>> {
        let _guard = self.state.begin_calibration()?;
        let mut out = Vec::with_capacity(2);
        for rail in [Rail::Adjustable, Rail::Fixed] {
            out.push(self.calibrate_locked(rail, meter)?);
        }
        Ok(out)
    }

    fn calibrate_locked(
        &self,
        rail: Rail,
        meter: &mut dyn ReferenceMeter,
    ) -> Result<CalibrationOutcome> {
        info!(%rail, "calibration started");
        let mut points = [(0u16, 0.0f64); 2];
        for (slot, wiper) in [0u8, 255].into_iter().enumerate() {
            let raw = self.settle_at(rail, wiper)?;
            let volts = meter
                .measured_voltage(rail, wiper, raw)
                .map_err(|e| ControlError::Operator(e.to_string()))?;
            if !volts.is_finite() {
                return Err(ControlError::Operator(format!(
                    "measured voltage must be finite, got {volts}"
                )));
            }
            points[slot] = (raw, volts);
        }
        let record = CalibrationRecord::fit(rail, points[0], points[1])?;
        let set = self.state.set_record(rail, record);
        let persisted = match self.store.save(&set) {
            Ok(()) => true,
            Err(e) => {
                warn!(%rail, error = %e, "calibration in effect but not persisted");
                false
            }
        };
        info!(%rail, slope = record.slope, intercept = record.intercept, persisted, "calibration stored");
        Ok(CalibrationOutcome {
            rail,
            record,
            points,
            persisted,
        })
    }

    /// Back to the nominal divider model for both rails; the stored record is removed.
    pub fn reset_calibration(&self) -> Result<()> {
        self.state
            .replace_calibration(CalibrationSet::nominal(&self.cfg.adc));
        self.store.clear()?;
        info!("calibration reset to defaults");
        Ok(())
    }

    // ── indicators ───────────────────────────────────────────────────────────

    fn current_mode(&self) -> Mode {
        if self.state.is_calibrating() {
            Mode::Calibrating
        } else if Rail::ALL
            .iter()
            .any(|r| !self.state.rail_snapshot(*r).auto_enabled)
        {
            Mode::Manual
        } else {
            Mode::Auto
        }
    }

    /// Recompose the LED frame from shared state and shift it out.
    pub fn refresh_indicators(&self) -> Result<[Rgb; LED_COUNT]> {
        let pe_stages = self.groups.stages(Field::Pe);
        let last = lock(&self.bus).last_written().unwrap_or_default();
        let pe = |i: usize| pe_stages.get(i).is_some_and(|&s| last.bit(s));
        let inputs = IndicatorInputs {
            adjustable_volts: self.state.rail_snapshot(Rail::Adjustable).filtered,
            pe_3v3: pe(0),
            pe_8v0: pe(1),
            mode: self.current_mode(),
            heartbeat: self.state.heartbeat(),
        };
        let frame = compose_frame(&self.cfg.indicator, &inputs);
        lock(&self.leds).show(&frame).map_err(hw)?;
        Ok(frame)
    }

    pub fn heartbeat(&self) -> bool {
        self.state.toggle_heartbeat()
    }

    // ── auxiliaries ──────────────────────────────────────────────────────────

    pub fn set_fan_speed(&self, percent: u8) -> Result<()> {
        if percent > 100 {
            return Err(ControlError::FanRange(percent));
        }
        let duty = fan_duty(percent);
        lock(&self.power).set_fan_duty(duty).map_err(hw)?;
        info!(percent, duty, "fan speed set");
        Ok(())
    }

    pub fn read_mode(&self) -> Result<u8> {
        let pins = lock(&self.mode).read_mode_pins().map_err(hw)?;
        Ok(mode_from_pins(pins))
    }

    pub fn read_antenna_sense(&self) -> Result<u16> {
        lock(&self.adc)
            .read_count(antctl_traits::AdcChannel::AntennaSense)
            .map_err(hw)
    }
}
