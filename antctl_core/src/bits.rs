//! 48-bit pattern codec.
//!
//! Index 0 of a [`BitVector48`] is the first bit shifted into the chain and the
//! least significant bit of its integer form. Every decoder lands on that
//! representation; when an input is too wide the low-order end wins.

use std::fmt;
use std::str::FromStr;

use crate::error::{ControlError, Result};

/// Number of stages in the chain.
pub const STAGES: usize = 48;
const MASK: u64 = (1 << STAGES) - 1;
const HEX_DIGITS: usize = STAGES / 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BitVector48(u64);

impl BitVector48 {
    pub const ZERO: Self = Self(0);

    /// Keep the low 48 bits of `value`.
    #[inline]
    pub const fn from_u64_masked(value: u64) -> Self {
        Self(value & MASK)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Bit at `index`; indices past the last stage read as 0.
    #[inline]
    pub const fn bit(self, index: usize) -> bool {
        index < STAGES && (self.0 >> index) & 1 == 1
    }

    /// Set or clear the bit at `index`. Out-of-range indices are ignored.
    #[inline]
    pub fn set_bit(&mut self, index: usize, high: bool) {
        if index >= STAGES {
            return;
        }
        if high {
            self.0 |= 1 << index;
        } else {
            self.0 &= !(1 << index);
        }
    }

    /// Bits in transmission order (index 0 first).
    pub fn iter(self) -> impl Iterator<Item = bool> {
        (0..STAGES).map(move |i| self.bit(i))
    }

    /// The 48-element 0/1 list form, index 0 first.
    pub fn to_bits(self) -> Vec<u8> {
        self.iter().map(u8::from).collect()
    }

    /// MSB-first binary literal (stage 47 on the left).
    pub fn to_binary_string(self) -> String {
        format!("{:048b}", self.0)
    }

    pub fn to_hex_string(self) -> String {
        format!("0x{:012x}", self.0)
    }

    /// Indices where `self` and `other` differ, ascending.
    pub fn diff_indices(self, other: Self) -> Vec<usize> {
        let x = self.0 ^ other.0;
        (0..STAGES).filter(|i| (x >> i) & 1 == 1).collect()
    }
}

impl fmt::Display for BitVector48 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:012x}", self.0)
    }
}

impl From<BitVector48> for u64 {
    fn from(v: BitVector48) -> Self {
        v.0
    }
}

/// Raw pattern as handed in by a caller. Each variant has one decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternInput {
    /// Exactly 48 elements, each 0 or 1, index 0 first.
    Bits(Vec<u8>),
    /// Masked to 48 bits.
    Integer(u64),
    /// Hex digits with optional `0x` prefix.
    Hex(String),
    /// MSB-first binary literal.
    Binary(String),
}

impl PatternInput {
    pub fn decode(&self) -> Result<BitVector48> {
        match self {
            PatternInput::Bits(bits) => decode_bits(bits),
            PatternInput::Integer(v) => Ok(decode_integer(*v)),
            PatternInput::Hex(s) => decode_hex(s),
            PatternInput::Binary(s) => decode_binary(s),
        }
    }
}

/// Operator text: `0x…` is hex, a run of `0`/`1` is binary, anything else is rejected.
impl FromStr for PatternInput {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        let t = s.trim();
        if t.starts_with("0x") || t.starts_with("0X") {
            return Ok(PatternInput::Hex(t.to_string()));
        }
        if !t.is_empty() && t.bytes().all(|b| b == b'0' || b == b'1') {
            return Ok(PatternInput::Binary(t.to_string()));
        }
        Err(ControlError::UnsupportedType(s.to_string()))
    }
}

pub fn decode_bits(bits: &[u8]) -> Result<BitVector48> {
    if bits.len() != STAGES {
        return Err(ControlError::InvalidLength(bits.len()));
    }
    let mut v = BitVector48::ZERO;
    for (index, &value) in bits.iter().enumerate() {
        match value {
            0 => {}
            1 => v.set_bit(index, true),
            _ => return Err(ControlError::InvalidBit { index, value }),
        }
    }
    Ok(v)
}

#[inline]
pub const fn decode_integer(value: u64) -> BitVector48 {
    BitVector48::from_u64_masked(value)
}

/// Parse hex digits; only the last 12 digits are significant.
pub fn decode_hex(s: &str) -> Result<BitVector48> {
    let t = s.trim();
    let digits = t
        .strip_prefix("0x")
        .or_else(|| t.strip_prefix("0X"))
        .unwrap_or(t);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ControlError::UnsupportedType(s.to_string()));
    }
    let tail = &digits[digits.len().saturating_sub(HEX_DIGITS)..];
    let value =
        u64::from_str_radix(tail, 16).map_err(|_| ControlError::UnsupportedType(s.to_string()))?;
    Ok(BitVector48::from_u64_masked(value))
}

/// Parse an MSB-first binary literal. Only the last 48 characters are kept and
/// shorter literals are zero-extended on the left.
pub fn decode_binary(s: &str) -> Result<BitVector48> {
    let t = s.trim();
    if !t.bytes().all(|b| b == b'0' || b == b'1') {
        return Err(ControlError::UnsupportedType(s.to_string()));
    }
    let tail = &t.as_bytes()[t.len().saturating_sub(STAGES)..];
    let v = tail
        .iter()
        .fold(0u64, |acc, &b| (acc << 1) | u64::from(b == b'1'));
    Ok(BitVector48::from_u64_masked(v))
}

/// Inverse of [`decode_bits`].
pub fn encode(v: BitVector48) -> Vec<u8> {
    v.to_bits()
}
