#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Antenna-control board core (hardware-agnostic).
//!
//! All hardware access goes through the `antctl_traits` capabilities: shift
//! lines, rail ADC, digital potentiometer, status LEDs, power and mode inputs.
//!
//! ## Architecture
//!
//! - **Chain**: 48-bit codec (`bits`), serial protocol (`bus`), connector
//!   wiring (`wiring`), field groups (`fields`) and read-modify-write
//!   overlay (`pattern`)
//! - **Rails**: linear two-point calibration (`calibration`) and the
//!   EMA-filtered single-step regulator (`rail`)
//! - **Glue**: shared state (`state`), the board facade (`board`), status
//!   LEDs (`indicator`) and the periodic task thread (`scheduler`)
//! - **Configuration**: runtime structs (`config`) built from `antctl_config`
//!   through `conversions`

pub mod bits;
pub mod board;
pub mod bus;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod error;
pub mod fields;
pub mod hw_error;
pub mod indicator;
pub mod mocks;
pub mod pattern;
pub mod rail;
pub mod scheduler;
pub mod state;
pub mod util;
pub mod wiring;

pub use bits::{BitVector48, PatternInput};
pub use board::{AntennaBoard, BoardIo, RailDiagnostics, RailReading};
pub use bus::{ShiftRegisterBus, WriteReport};
pub use calibration::{
    CalibrationOutcome, CalibrationRecord, CalibrationSet, CalibrationStore,
    FileCalibrationStore, ReferenceMeter,
};
pub use config::BoardConfig;
pub use error::{ControlError, Result};
pub use fields::{Field, FieldGroups};
pub use pattern::{FieldOverrides, FieldValues};
pub use rail::{Rail, RailState};
pub use scheduler::Scheduler;
pub use wiring::StageMap;
