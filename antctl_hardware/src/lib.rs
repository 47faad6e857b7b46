//! Board backends for the antenna controller.
//!
//! The simulated board (`sim`) is always available; the Raspberry Pi GPIO and
//! SPI backends are behind the `hardware` feature.
pub mod error;
pub mod sim;
pub mod util;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod spi;

pub use error::HwError;
pub use sim::{
    RailModel, SimBoard, SimulatedAdc, SimulatedLeds, SimulatedModePins, SimulatedPlant,
    SimulatedPots, SimulatedPower, SimulatedShiftChain,
};
