//! Raspberry Pi GPIO backends (rppal).

use std::time::Duration;

use antctl_traits::{
    BoxError, LED_COUNT, ModeInputs, PowerControl, Rgb, ShiftLine, ShiftLines, StatusLeds,
    spin_for,
};
use rppal::gpio::{InputPin, Level, OutputPin};
pub use rppal::gpio::Gpio;
use tracing::{debug, trace};

use crate::error::Result;

/// BCM pin numbers of the 48-stage chain.
#[derive(Debug, Clone, Copy)]
pub struct ShiftPins {
    pub ser: u8,
    pub oe_n: u8,
    pub srclk: u8,
    pub rclk: u8,
    pub serial_out: u8,
}

pub struct GpioShiftLines {
    ser: OutputPin,
    oe_n: OutputPin,
    srclk: OutputPin,
    rclk: OutputPin,
    serial_out: InputPin,
}

impl GpioShiftLines {
    pub fn open(gpio: &Gpio, pins: ShiftPins) -> Result<Self> {
        let lines = Self {
            ser: gpio.get(pins.ser)?.into_output_low(),
            // Outputs stay tri-stated until the first write enables them.
            oe_n: gpio.get(pins.oe_n)?.into_output_high(),
            srclk: gpio.get(pins.srclk)?.into_output_low(),
            rclk: gpio.get(pins.rclk)?.into_output_low(),
            serial_out: gpio.get(pins.serial_out)?.into_input(),
        };
        debug!(?pins, "shift-register lines opened");
        Ok(lines)
    }
}

impl ShiftLines for GpioShiftLines {
    fn write_line(&mut self, line: ShiftLine, high: bool) -> std::result::Result<(), BoxError> {
        let level = if high { Level::High } else { Level::Low };
        match line {
            ShiftLine::SerialData => self.ser.write(level),
            ShiftLine::ShiftClock => self.srclk.write(level),
            ShiftLine::LatchClock => self.rclk.write(level),
            ShiftLine::OutputEnableN => self.oe_n.write(level),
        }
        Ok(())
    }

    fn read_serial_out(&mut self) -> std::result::Result<bool, BoxError> {
        Ok(self.serial_out.is_high())
    }
}

/// BCM pin numbers of the status-LED chain.
#[derive(Debug, Clone, Copy)]
pub struct LedPins {
    pub oe_n: u8,
    pub rck: u8,
    pub srclr_n: u8,
    pub srck: u8,
    pub ser: u8,
}

/// Four RGB LEDs behind a 12-bit shift register, shifted R, G, B per LED.
pub struct GpioLedChain {
    oe_n: OutputPin,
    rck: OutputPin,
    _srclr_n: OutputPin,
    srck: OutputPin,
    ser: OutputPin,
    settle: Duration,
}

impl GpioLedChain {
    pub fn open(gpio: &Gpio, pins: LedPins, settle: Duration) -> Result<Self> {
        Ok(Self {
            oe_n: gpio.get(pins.oe_n)?.into_output_low(),
            rck: gpio.get(pins.rck)?.into_output_low(),
            // Held high: never clear the register.
            _srclr_n: gpio.get(pins.srclr_n)?.into_output_high(),
            srck: gpio.get(pins.srck)?.into_output_low(),
            ser: gpio.get(pins.ser)?.into_output_low(),
            settle,
        })
    }
}

impl StatusLeds for GpioLedChain {
    fn show(&mut self, frame: &[Rgb; LED_COUNT]) -> std::result::Result<(), BoxError> {
        self.rck.set_low();
        for led in frame {
            for bit in [led.r, led.g, led.b] {
                self.ser.write(if bit { Level::High } else { Level::Low });
                spin_for(self.settle);
                self.srck.set_high();
                spin_for(self.settle);
                self.srck.set_low();
            }
        }
        self.rck.set_high();
        spin_for(self.settle);
        self.rck.set_low();
        self.oe_n.set_low();
        trace!(?frame, "led frame shifted");
        Ok(())
    }
}

/// Fan PWM frequency used by the board.
const FAN_PWM_HZ: f64 = 1000.0;

pub struct GpioPower {
    fan: OutputPin,
    power_latch: OutputPin,
}

impl GpioPower {
    pub fn open(gpio: &Gpio, fan_pin: u8, power_latch_pin: u8) -> Result<Self> {
        Ok(Self {
            fan: gpio.get(fan_pin)?.into_output_low(),
            // Low keeps the supply latched on.
            power_latch: gpio.get(power_latch_pin)?.into_output_low(),
        })
    }
}

impl PowerControl for GpioPower {
    fn set_fan_duty(&mut self, duty: u16) -> std::result::Result<(), BoxError> {
        if duty == 0 {
            self.fan.clear_pwm()?;
            self.fan.set_low();
            return Ok(());
        }
        let ratio = f64::from(duty) / f64::from(u16::MAX);
        self.fan.set_pwm_frequency(FAN_PWM_HZ, ratio)?;
        Ok(())
    }

    fn release_power_latch(&mut self) -> std::result::Result<(), BoxError> {
        self.power_latch.set_high();
        Ok(())
    }
}

pub struct GpioModePins {
    pins: [InputPin; 4],
}

impl GpioModePins {
    pub fn open(gpio: &Gpio, pins: [u8; 4]) -> Result<Self> {
        Ok(Self {
            pins: [
                gpio.get(pins[0])?.into_input(),
                gpio.get(pins[1])?.into_input(),
                gpio.get(pins[2])?.into_input(),
                gpio.get(pins[3])?.into_input(),
            ],
        })
    }
}

impl ModeInputs for GpioModePins {
    fn read_mode_pins(&mut self) -> std::result::Result<[bool; 4], BoxError> {
        Ok([
            self.pins[0].is_high(),
            self.pins[1].is_high(),
            self.pins[2].is_high(),
            self.pins[3].is_high(),
        ])
    }
}
