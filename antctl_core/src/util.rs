//! Small conversions for the board auxiliaries.

/// Fan PWM duty for a speed in percent: off below 20 %, else linear in 0..=65535.
///
/// Callers validate `percent <= 100`.
#[inline]
pub fn fan_duty(percent: u8) -> u16 {
    if percent < 20 {
        return 0;
    }
    let p = u32::from(percent.min(100));
    // Bounded by u16::MAX since p <= 100.
    (p * u32::from(u16::MAX) / 100) as u16
}

/// 3-bit mode from the first three mode pins, first pin most significant.
#[inline]
pub fn mode_from_pins(pins: [bool; 4]) -> u8 {
    (u8::from(pins[0]) << 2) | (u8::from(pins[1]) << 1) | u8::from(pins[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_duty_edges() {
        assert_eq!(fan_duty(0), 0);
        assert_eq!(fan_duty(19), 0);
        assert_eq!(fan_duty(20), 13_107);
        assert_eq!(fan_duty(100), u16::MAX);
    }

    #[test]
    fn mode_ignores_fourth_pin() {
        assert_eq!(mode_from_pins([true, false, true, true]), 0b101);
        assert_eq!(mode_from_pins([false, false, false, true]), 0);
    }
}
