use crate::error::{HwError, Result};

/// MCP42010 "write data" command nibble.
const MCP42010_WRITE: u8 = 0x10;
/// Channel-select bits of the MCP42010 command byte (bit 0 = pot 0, bit 1 = pot 1).
const MCP42010_SELECT_MASK: u8 = 0x03;

/// Encode a wiper write for one MCP42010 channel as the two SPI bytes.
pub fn mcp42010_frame(pot: u8, value: u8) -> Result<[u8; 2]> {
    let select = match pot {
        0 => 0x01,
        1 => 0x02,
        other => return Err(HwError::InvalidPot(other)),
    };
    Ok([MCP42010_WRITE | select, value])
}

/// Decode a write frame into the channels it addresses and the wiper value.
///
/// Select `0b11` addresses both channels at once, as the device does.
pub fn decode_mcp42010_frame(frame: [u8; 2]) -> Result<(bool, bool, u8)> {
    let [cmd, value] = frame;
    if cmd & 0x30 != MCP42010_WRITE || cmd & MCP42010_SELECT_MASK == 0 {
        return Err(HwError::BadFrame(cmd, value));
    }
    Ok((cmd & 0x01 != 0, cmd & 0x02 != 0, value))
}

/// Widen a 12-bit conversion to the 16-bit count domain the rail calibration uses.
#[inline]
pub fn scale_12_to_16(raw12: u16) -> u16 {
    let v = raw12 & 0x0FFF;
    (v << 4) | (v >> 8)
}
