pub mod clock;

pub use clock::{Clock, MonotonicClock, spin_for};

/// Error type used at every hardware trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Control lines of the 48-stage shift-register chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShiftLine {
    /// Serial data input (SER).
    SerialData,
    /// Shift clock (SRCLK), rising edge shifts one stage.
    ShiftClock,
    /// Latch clock (RCLK), rising edge transfers the shift path to the outputs.
    LatchClock,
    /// Active-low output enable (/OE).
    OutputEnableN,
}

/// Bit-level access to the shift-register chain.
pub trait ShiftLines {
    fn write_line(&mut self, line: ShiftLine, high: bool) -> Result<(), BoxError>;
    /// Sample the serial output of the last stage.
    fn read_serial_out(&mut self) -> Result<bool, BoxError>;
}

impl<T: ShiftLines + ?Sized> ShiftLines for Box<T> {
    fn write_line(&mut self, line: ShiftLine, high: bool) -> Result<(), BoxError> {
        (**self).write_line(line, high)
    }
    fn read_serial_out(&mut self) -> Result<bool, BoxError> {
        (**self).read_serial_out()
    }
}

/// Analog inputs sampled by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdcChannel {
    FixedRail,
    AdjustableRail,
    AntennaSense,
}

pub trait RailAdc {
    /// Raw 16-bit count for the channel.
    fn read_count(&mut self, channel: AdcChannel) -> Result<u16, BoxError>;
}

/// Dual digital potentiometer; `pot` is the device channel (0 or 1).
pub trait Potentiometer {
    fn write_wiper(&mut self, pot: u8, value: u8) -> Result<(), BoxError>;
}

/// Color of one status LED, one bit per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: bool,
    pub g: bool,
    pub b: bool,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(false, false, false);

    pub const fn new(r: bool, g: bool, b: bool) -> Self {
        Self { r, g, b }
    }
}

/// Number of status LEDs on the indicator chain.
pub const LED_COUNT: usize = 4;

pub trait StatusLeds {
    fn show(&mut self, frame: &[Rgb; LED_COUNT]) -> Result<(), BoxError>;
}

/// Fan and latching power supply.
pub trait PowerControl {
    /// 16-bit PWM duty (0 = off).
    fn set_fan_duty(&mut self, duty: u16) -> Result<(), BoxError>;
    /// Assert the power-latch release line. The process is expected to lose power afterwards.
    fn release_power_latch(&mut self) -> Result<(), BoxError>;
}

pub trait ModeInputs {
    /// Levels of the four mode-select pins in board order.
    fn read_mode_pins(&mut self) -> Result<[bool; 4], BoxError>;
}
