use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("spi error: {0}")]
    Spi(String),
    #[error("potentiometer channel {0} does not exist")]
    InvalidPot(u8),
    #[error("malformed potentiometer frame {0:#04x} {1:#04x}")]
    BadFrame(u8, u8),
    #[error("adc channel {0:?} not wired")]
    UnwiredChannel(antctl_traits::AdcChannel),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;

#[cfg(all(feature = "hardware", target_os = "linux"))]
impl From<rppal::gpio::Error> for HwError {
    fn from(e: rppal::gpio::Error) -> Self {
        HwError::Gpio(e.to_string())
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
impl From<rppal::spi::Error> for HwError {
    fn from(e: rppal::spi::Error) -> Self {
        HwError::Spi(e.to_string())
    }
}
