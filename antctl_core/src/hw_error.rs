//! Maps `Box<dyn Error>` from trait boundaries to typed `ControlError`.
//!
//! The traits in `antctl_traits` use `Box<dyn Error + Send + Sync>` so any
//! backend can plug in; this module converts those to our typed error enum,
//! with an optional feature-gated path for `antctl_hardware::HwError` downcasting.

use crate::error::ControlError;

/// Map a trait-boundary error to a typed `ControlError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to a generic hardware error carrying the message.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ControlError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<antctl_hardware::error::HwError>() {
            return match hw {
                antctl_hardware::error::HwError::InvalidPot(_)
                | antctl_hardware::error::HwError::BadFrame(_, _)
                | antctl_hardware::error::HwError::UnwiredChannel(_) => {
                    ControlError::HardwareFault(hw.to_string())
                }
                other => ControlError::Hardware(other.to_string()),
            };
        }
    }

    ControlError::Hardware(e.to_string())
}

/// Shorthand for `map_err` at trait call sites.
pub(crate) fn hw(e: antctl_traits::BoxError) -> ControlError {
    map_hw_error(e.as_ref())
}
