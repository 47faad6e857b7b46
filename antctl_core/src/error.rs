use thiserror::Error;

use crate::fields::Field;
use crate::rail::Rail;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    #[error("bit list must have exactly 48 elements, got {0}")]
    InvalidLength(usize),
    #[error("bit list element {index} is {value}, expected 0 or 1")]
    InvalidBit { index: usize, value: u8 },
    #[error("unsupported pattern input: {0}")]
    UnsupportedType(String),
    #[error("{field} value {value} out of range 0..={max}")]
    FieldRange { field: Field, value: u64, max: u32 },
    #[error("unknown field '{0}' (expected AZ, EL, FM, AT, PE or SS)")]
    UnknownField(String),
    #[error("unknown rail '{0}' (expected fixed or adjustable)")]
    UnknownRail(String),
    #[error("wiper value {0} out of range 0..=255")]
    WiperRange(i64),
    #[error("{rail} target {volts} V outside 0..={max} V")]
    TargetOutOfRange { rail: Rail, volts: f64, max: f64 },
    #[error("fan speed {0}% out of range 0..=100")]
    FanRange(u8),
    #[error("degenerate calibration for {rail}: both endpoints read raw count {raw}")]
    DegenerateCalibration { rail: Rail, raw: u16 },
    #[error("{rail} did not settle at wiper {wiper} within {timeout_ms} ms")]
    SettleTimeout {
        rail: Rail,
        wiper: u8,
        timeout_ms: u64,
    },
    #[error("wiring table inconsistency: {0}")]
    WiringTableInconsistency(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("operator input: {0}")]
    Operator(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, ControlError>;
