//! Line-oriented operator console.
//!
//! Commands run synchronously on the console thread against the shared
//! board; a failing command prints `Error: ...` and the console keeps going.

use std::io::Write;

use antctl_core::bits::{PatternInput, encode};
use antctl_core::error::ControlError;
use antctl_core::{AntennaBoard, Field, FieldOverrides, Rail, ReferenceMeter};
use antctl_traits::BoxError;
use crossbeam_channel::Receiver;
use eyre::{Result, eyre};

use crate::logging::LogControl;

/// What the stdin thread and the Ctrl-C handler deliver to the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    Closed,
    Interrupt,
}

/// Potentiometer named by rail or by channel number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PotRef {
    Rail(Rail),
    Channel(u8),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Shutdown,
    SetRes { pot: PotRef, wiper: u8 },
    SetVolt { rail: Rail, volts: f64 },
    ReadVolt(Option<Rail>),
    Calibrate(Rail),
    CalibrateAll,
    ResetCal,
    DebugVolt(Option<Rail>),
    Debug,
    CpldWrite(PatternInput),
    CpldRead,
    SetField(FieldOverrides),
    ReadField(Option<Field>),
    SetFan(u8),
    ReadMode,
    Antenna,
}

pub const HELP: &str = "\
Available commands:
  help                               show this text
  shutdown                           fan off, then release the power latch
  setres <fixed|adjustable|0|1> <0-255>
                                     park a wiper and take the rail off automatic
  setvolt <fixed|adjustable> <volts> set a rail target and resume automatic control
  readvolt [fixed|adjustable]        convert and print rail voltages
  calibrate <fixed|adjustable>       two-point calibration against a meter
  calibrate_all                      calibrate adjustable, then fixed
  resetcal                           back to the nominal divider calibration
  debugvolt [fixed|adjustable]       raw counts, calibration and regulator state
  debug                              toggle debug logging
  cpld_write <hex|binary|b0,b1,...>  write a raw 48-bit pattern and read it back
  cpld_read                          read the chain and decode every field
  setfield <FIELD> <value> [...]     change fields (AZ EL FM AT PE SS), others kept
  readfield [FIELD]                  read one field, or all of them
  setfan <0-100>                     fan speed in percent (off below 20)
  readmode                           3-bit mode switch value
  antenna                            raw antenna sense count";

fn parse_rail(s: &str) -> Result<Rail> {
    Ok(s.parse::<Rail>()?)
}

fn parse_pot(s: &str) -> Result<PotRef> {
    if let Ok(ch) = s.parse::<u8>() {
        return Ok(PotRef::Channel(ch));
    }
    Ok(PotRef::Rail(parse_rail(s)?))
}

fn parse_wiper(s: &str) -> Result<u8> {
    let v: i64 = s
        .parse()
        .map_err(|_| eyre!("wiper must be an integer, got '{s}'"))?;
    u8::try_from(v).map_err(|_| ControlError::WiperRange(v).into())
}

/// Decimal or `0x`-prefixed hex.
fn parse_value(s: &str) -> Result<u64> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| eyre!("'{s}' is not an integer"))
}

fn parse_pattern(s: &str) -> Result<PatternInput> {
    if s.contains(',') {
        let bits = s
            .split(',')
            .map(|b| b.trim().parse::<u8>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| eyre!("bit list must contain small integers"))?;
        return Ok(PatternInput::Bits(bits));
    }
    Ok(s.parse::<PatternInput>()?)
}

fn optional<T>(args: &[&str], usage: &str, f: impl Fn(&str) -> Result<T>) -> Result<Option<T>> {
    match args {
        [] => Ok(None),
        [a] => f(*a).map(Some),
        _ => Err(eyre!("usage: {usage}")),
    }
}

/// Parse one console line; blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();
    let command = match (cmd.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("help", []) => Command::Help,
        ("shutdown", []) => Command::Shutdown,
        ("setres", [pot, wiper]) => Command::SetRes {
            pot: parse_pot(pot)?,
            wiper: parse_wiper(wiper)?,
        },
        ("setres", _) => return Err(eyre!("usage: setres <fixed|adjustable|0|1> <0-255>")),
        ("setvolt", [rail, volts]) => Command::SetVolt {
            rail: parse_rail(rail)?,
            volts: volts
                .parse()
                .map_err(|_| eyre!("'{volts}' is not a voltage"))?,
        },
        ("setvolt", _) => return Err(eyre!("usage: setvolt <fixed|adjustable> <volts>")),
        ("readvolt", a) => Command::ReadVolt(optional(a, "readvolt [fixed|adjustable]", parse_rail)?),
        ("calibrate", [rail]) => Command::Calibrate(parse_rail(rail)?),
        ("calibrate", _) => return Err(eyre!("usage: calibrate <fixed|adjustable>")),
        ("calibrate_all", []) => Command::CalibrateAll,
        ("resetcal", []) => Command::ResetCal,
        ("debugvolt", a) => {
            Command::DebugVolt(optional(a, "debugvolt [fixed|adjustable]", parse_rail)?)
        }
        ("debug", []) => Command::Debug,
        ("cpld_write", [data]) => Command::CpldWrite(parse_pattern(data)?),
        ("cpld_write", _) => return Err(eyre!("usage: cpld_write <hex|binary|b0,b1,...>")),
        ("cpld_read", []) => Command::CpldRead,
        ("setfield", pairs) if !pairs.is_empty() && pairs.len() % 2 == 0 => {
            let mut o = FieldOverrides::new();
            for pair in pairs.chunks(2) {
                o.set(pair[0].parse::<Field>()?, parse_value(pair[1])?)?;
            }
            Command::SetField(o)
        }
        ("setfield", _) => return Err(eyre!("usage: setfield <FIELD> <value> [<FIELD> <value> ...]")),
        ("readfield", a) => Command::ReadField(optional(a, "readfield [FIELD]", |s| {
            Ok(s.parse::<Field>()?)
        })?),
        ("setfan", [p]) => Command::SetFan(
            p.parse()
                .map_err(|_| eyre!("fan speed must be 0..=100, got '{p}'"))?,
        ),
        ("setfan", _) => return Err(eyre!("usage: setfan <0-100>")),
        ("readmode", []) => Command::ReadMode,
        ("antenna", []) => Command::Antenna,
        (
            "help" | "shutdown" | "calibrate_all" | "resetcal" | "debug" | "cpld_read" | "readmode"
            | "antenna",
            _,
        ) => return Err(eyre!("'{cmd}' takes no arguments")),
        _ => return Err(eyre!("Unknown command '{cmd}'. Type 'help'.")),
    };
    Ok(Some(command))
}

/// Reads the operator's meter value from the console input.
struct ConsoleMeter<'a, W: Write> {
    input: &'a Receiver<Input>,
    out: &'a mut W,
    /// Set when stdin closed or Ctrl-C arrived while waiting for a value.
    ended: &'a mut bool,
}

impl<W: Write> ReferenceMeter for ConsoleMeter<'_, W> {
    fn measured_voltage(
        &mut self,
        rail: Rail,
        wiper: u8,
        raw: u16,
    ) -> std::result::Result<f64, BoxError> {
        writeln!(self.out, "{rail} rail settled at wiper {wiper} (raw {raw}).")?;
        loop {
            write!(self.out, "Enter measured voltage: ")?;
            self.out.flush()?;
            let Ok(Input::Line(line)) = self.input.recv() else {
                *self.ended = true;
                return Err("calibration aborted by operator".into());
            };
            match line.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => return Ok(v),
                _ => writeln!(self.out, "Not a voltage: '{}'", line.trim())?,
            }
        }
    }
}

enum Flow {
    Continue,
    Exit,
}

pub struct Console<'a, W: Write> {
    board: &'a AntennaBoard,
    input: &'a Receiver<Input>,
    log: &'a LogControl,
    out: W,
    input_ended: bool,
}

impl<'a, W: Write> Console<'a, W> {
    pub fn new(
        board: &'a AntennaBoard,
        input: &'a Receiver<Input>,
        log: &'a LogControl,
        out: W,
    ) -> Self {
        Self {
            board,
            input,
            log,
            out,
            input_ended: false,
        }
    }

    /// Serve commands until stdin closes, Ctrl-C, or `shutdown`.
    pub fn run(&mut self) -> Result<()> {
        writeln!(
            self.out,
            "System started. Type 'help' to see available commands."
        )?;
        loop {
            write!(self.out, "> ")?;
            self.out.flush()?;
            let line = match self.input.recv() {
                Ok(Input::Line(line)) => line,
                Ok(Input::Interrupt) => {
                    writeln!(self.out, "\nInterrupted.")?;
                    return Ok(());
                }
                Ok(Input::Closed) | Err(_) => {
                    writeln!(self.out, "Exiting command listener.")?;
                    return Ok(());
                }
            };
            let outcome = parse(&line).and_then(|cmd| match cmd {
                Some(cmd) => self.execute(cmd),
                None => Ok(Flow::Continue),
            });
            match outcome {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => return Ok(()),
                Err(e) => {
                    tracing::debug!(error = ?e, line = %line, "command failed");
                    writeln!(self.out, "Error: {e}")?;
                }
            }
            if self.input_ended {
                writeln!(self.out, "Exiting command listener.")?;
                return Ok(());
            }
        }
    }

    fn rails(rail: Option<Rail>) -> Vec<Rail> {
        rail.map_or_else(|| Rail::ALL.to_vec(), |r| vec![r])
    }

    fn execute(&mut self, cmd: Command) -> Result<Flow> {
        let board = self.board;
        match cmd {
            Command::Help => writeln!(self.out, "{HELP}")?,
            Command::Shutdown => {
                writeln!(self.out, "Shutting down.")?;
                self.out.flush()?;
                board.shutdown()?;
                return Ok(Flow::Exit);
            }
            Command::SetRes { pot, wiper } => {
                let rail = match pot {
                    PotRef::Rail(r) => r,
                    PotRef::Channel(ch) => board
                        .rail_for_pot(ch)
                        .ok_or_else(|| eyre!("no rail is wired to pot {ch}"))?,
                };
                board.set_wiper_manual(rail, wiper)?;
                let ch = board.config().rail(rail).wiring.pot;
                writeln!(self.out, "Pot {ch} ({rail}) set to {wiper}")?;
            }
            Command::SetVolt { rail, volts } => {
                board.set_rail_target(rail, volts)?;
                writeln!(self.out, "{rail} target set to {volts:.3} V")?;
            }
            Command::ReadVolt(rail) => {
                for r in Self::rails(rail) {
                    let reading = board.read_rail(r)?;
                    writeln!(
                        self.out,
                        "{r} voltage: {:.3} V (target: {:.2} V)",
                        reading.volts, reading.target
                    )?;
                }
            }
            Command::Calibrate(rail) => {
                let mut meter = ConsoleMeter {
                    input: self.input,
                    out: &mut self.out,
                    ended: &mut self.input_ended,
                };
                let outcome = board.calibrate_rail(rail, &mut meter)?;
                self.report_calibration(&outcome)?;
            }
            Command::CalibrateAll => {
                let mut meter = ConsoleMeter {
                    input: self.input,
                    out: &mut self.out,
                    ended: &mut self.input_ended,
                };
                let outcomes = board.calibrate_all(&mut meter)?;
                for outcome in &outcomes {
                    self.report_calibration(outcome)?;
                }
            }
            Command::ResetCal => {
                board.reset_calibration()?;
                writeln!(self.out, "Calibration reset to defaults.")?;
            }
            Command::DebugVolt(rail) => {
                for r in Self::rails(rail) {
                    let d = board.rail_diagnostics(r)?;
                    writeln!(
                        self.out,
                        "{r} raw_count={}, slope={:.9}, intercept={:.6}, voltage={:.3} V, filtered={:.3} V, wiper={}, auto={}",
                        d.raw,
                        d.record.slope,
                        d.record.intercept,
                        d.volts,
                        d.state.filtered,
                        d.state.wiper,
                        d.state.auto_enabled
                    )?;
                }
            }
            Command::Debug => {
                let on = self.log.toggle_debug()?;
                let state = if on { "enabled" } else { "disabled" };
                writeln!(self.out, "Debug messages {state}.")?;
            }
            Command::CpldWrite(input) => {
                let report = board.write_raw_pattern(&input)?;
                let bits: String = encode(report.readback)
                    .iter()
                    .map(|b| char::from(b'0' + b))
                    .collect();
                writeln!(self.out, "CPLD interface updated. Read-back bits: {bits}")?;
                if !report.matched() {
                    writeln!(
                        self.out,
                        "Warning: read-back differs from {} at stages {:?}",
                        report.written,
                        report.mismatched_stages()
                    )?;
                }
            }
            Command::CpldRead => {
                let values = board.read_all_fields()?;
                writeln!(self.out, "{values}")?;
            }
            Command::SetField(overrides) => {
                let pattern = board.set_fields(&overrides)?;
                for (field, value) in overrides.iter() {
                    writeln!(self.out, "{field} set to {value}")?;
                }
                writeln!(self.out, "pattern {pattern}")?;
            }
            Command::ReadField(Some(field)) => {
                let value = board.read_field(field)?;
                writeln!(self.out, "{field} = {value}")?;
            }
            Command::ReadField(None) => {
                let values = board.read_all_fields()?;
                for field in Field::ALL {
                    writeln!(self.out, "{field} = {}", values.get(field))?;
                }
            }
            Command::SetFan(percent) => {
                board.set_fan_speed(percent)?;
                writeln!(self.out, "Fan speed set to {percent}%")?;
            }
            Command::ReadMode => {
                let mode = board.read_mode()?;
                writeln!(self.out, "Mode: {mode}")?;
            }
            Command::Antenna => {
                let raw = board.read_antenna_sense()?;
                writeln!(self.out, "Antenna sense: {raw}")?;
            }
        }
        Ok(Flow::Continue)
    }

    fn report_calibration(&mut self, outcome: &antctl_core::CalibrationOutcome) -> Result<()> {
        writeln!(
            self.out,
            "{} calibrated: slope={:.9}, intercept={:.6}",
            outcome.rail, outcome.record.slope, outcome.record.intercept
        )?;
        if !outcome.persisted {
            writeln!(
                self.out,
                "Warning: calibration is in effect but could not be saved."
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn setres_accepts_rail_names_and_channels() {
        assert_eq!(
            parse("setres adjustable 10").unwrap(),
            Some(Command::SetRes {
                pot: PotRef::Rail(Rail::Adjustable),
                wiper: 10
            })
        );
        assert_eq!(
            parse("SETRES 1 255").unwrap(),
            Some(Command::SetRes {
                pot: PotRef::Channel(1),
                wiper: 255
            })
        );
    }

    #[test]
    fn wiper_outside_byte_range_is_reported() {
        let err = parse("setres fixed 256").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ControlError>(),
            Some(&ControlError::WiperRange(256))
        );
    }

    #[test]
    fn setfield_takes_pairs() {
        let Some(Command::SetField(o)) = parse("setfield az 0x10 EL 3").unwrap() else {
            panic!("expected setfield");
        };
        assert_eq!(o.get(Field::Az), Some(16));
        assert_eq!(o.get(Field::El), Some(3));
        assert!(parse("setfield EL").is_err());
        assert!(parse("setfield EL 4").is_err());
    }

    #[test]
    fn pattern_argument_forms() {
        assert_eq!(
            parse("cpld_write 0xff").unwrap(),
            Some(Command::CpldWrite(PatternInput::Hex("0xff".into())))
        );
        assert_eq!(
            parse("cpld_write 1,0,1").unwrap(),
            Some(Command::CpldWrite(PatternInput::Bits(vec![1, 0, 1])))
        );
    }

    #[test]
    fn unknown_and_malformed_commands() {
        assert!(
            parse("frobnicate")
                .unwrap_err()
                .to_string()
                .contains("Unknown command")
        );
        assert!(parse("readvolt fixed adjustable").is_err());
        assert!(parse("help me").is_err());
        assert!(matches!(
            parse("readvolt solar")
                .unwrap_err()
                .downcast_ref::<ControlError>(),
            Some(ControlError::UnknownRail(_))
        ));
    }
}
