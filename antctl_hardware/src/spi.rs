//! SPI peripherals: MCP42010 dual digital potentiometer and MCP3208 ADC.

use antctl_traits::{AdcChannel, BoxError, Potentiometer, RailAdc};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::{mcp42010_frame, scale_12_to_16};

const POT_CLOCK_HZ: u32 = 1_000_000;
const ADC_CLOCK_HZ: u32 = 1_000_000;

fn slave_select(index: u8) -> Result<SlaveSelect> {
    match index {
        0 => Ok(SlaveSelect::Ss0),
        1 => Ok(SlaveSelect::Ss1),
        2 => Ok(SlaveSelect::Ss2),
        other => Err(HwError::Spi(format!("unsupported slave select {other}"))),
    }
}

pub struct Mcp42010 {
    spi: Spi,
}

impl Mcp42010 {
    pub fn open(ss: u8) -> Result<Self> {
        let spi = Spi::new(Bus::Spi0, slave_select(ss)?, POT_CLOCK_HZ, Mode::Mode0)?;
        Ok(Self { spi })
    }
}

impl Potentiometer for Mcp42010 {
    fn write_wiper(&mut self, pot: u8, value: u8) -> std::result::Result<(), BoxError> {
        let frame = mcp42010_frame(pot, value)?;
        self.spi.write(&frame)?;
        trace!(pot, value, "mcp42010 write");
        Ok(())
    }
}

/// Which MCP3208 input each board channel is wired to.
#[derive(Debug, Clone, Copy)]
pub struct AdcInputs {
    pub fixed_rail: u8,
    pub adjustable_rail: u8,
    pub antenna_sense: u8,
}

pub struct Mcp3208 {
    spi: Spi,
    inputs: AdcInputs,
}

impl Mcp3208 {
    pub fn open(ss: u8, inputs: AdcInputs) -> Result<Self> {
        let spi = Spi::new(Bus::Spi0, slave_select(ss)?, ADC_CLOCK_HZ, Mode::Mode0)?;
        Ok(Self { spi, inputs })
    }

    fn input(&self, channel: AdcChannel) -> u8 {
        match channel {
            AdcChannel::FixedRail => self.inputs.fixed_rail,
            AdcChannel::AdjustableRail => self.inputs.adjustable_rail,
            AdcChannel::AntennaSense => self.inputs.antenna_sense,
        }
    }
}

impl RailAdc for Mcp3208 {
    fn read_count(&mut self, channel: AdcChannel) -> std::result::Result<u16, BoxError> {
        let input = self.input(channel);
        if input > 7 {
            return Err(HwError::UnwiredChannel(channel).into());
        }
        // Start bit, single-ended, then the 3-bit input select.
        let tx = [0x06 | (input >> 2), (input & 0x03) << 6, 0x00];
        let mut rx = [0u8; 3];
        self.spi.transfer(&mut rx, &tx)?;
        let raw12 = (u16::from(rx[1] & 0x0F) << 8) | u16::from(rx[2]);
        Ok(scale_12_to_16(raw12))
    }
}
