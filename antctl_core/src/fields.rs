//! Functional fields and the stages that carry their bits.

use std::fmt;
use std::str::FromStr;

use crate::error::{ControlError, Result};
use crate::wiring::StageMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Azimuth
    Az,
    /// Elevation
    El,
    /// Front-end mode
    Fm,
    /// Antenna test
    At,
    /// Power enables (bit 0 = 3V3, bit 1 = 8V0)
    Pe,
    /// Sensor select
    Ss,
}

impl Field {
    pub const ALL: [Field; 6] = [Field::Az, Field::El, Field::Fm, Field::At, Field::Pe, Field::Ss];

    pub const fn width(self) -> u32 {
        match self {
            Field::Az => 24,
            Field::El => 2,
            Field::Fm => 4,
            Field::At => 3,
            Field::Pe => 2,
            Field::Ss => 5,
        }
    }

    pub const fn max(self) -> u32 {
        (1 << self.width()) - 1
    }

    pub const fn name(self) -> &'static str {
        match self {
            Field::Az => "AZ",
            Field::El => "EL",
            Field::Fm => "FM",
            Field::At => "AT",
            Field::Pe => "PE",
            Field::Ss => "SS",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }

    /// Bit order within the field follows the label text, not a number.
    const fn ordered_by_label(self) -> bool {
        matches!(self, Field::Pe)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        let t = s.trim();
        Field::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(t))
            .ok_or_else(|| ControlError::UnknownField(t.to_string()))
    }
}

/// Ordered stage lists per field; element `i` carries bit `i` of the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldGroups {
    groups: [Vec<usize>; 6],
}

impl FieldGroups {
    pub fn from_stage_map(map: &StageMap) -> Result<Self> {
        let mut groups: [Vec<usize>; 6] = Default::default();
        for field in Field::ALL {
            let prefix = format!("{}_", field.name());
            let mut keyed: Vec<(String, u32, usize)> = Vec::new();
            for entry in map.entries() {
                let Some(suffix) = entry.signal.strip_prefix(prefix.as_str()) else {
                    continue;
                };
                let number = if field.ordered_by_label() {
                    0
                } else {
                    let n: u32 = suffix.parse().map_err(|_| {
                        ControlError::WiringTableInconsistency(format!(
                            "{} on pin {} has no numeric bit suffix",
                            entry.signal, entry.pin
                        ))
                    })?;
                    if n >= field.width() {
                        return Err(ControlError::WiringTableInconsistency(format!(
                            "{} on pin {} exceeds the {}-bit {field} field",
                            entry.signal,
                            entry.pin,
                            field.width()
                        )));
                    }
                    n
                };
                keyed.push((entry.signal.to_string(), number, entry.stage));
            }
            if field.ordered_by_label() {
                keyed.sort_by(|a, b| a.0.cmp(&b.0));
            } else {
                keyed.sort_by_key(|k| k.1);
            }
            let by_label = field.ordered_by_label();
            if let Some(dup) = keyed
                .windows(2)
                .find(|w| w[0].0 == w[1].0 || (!by_label && w[0].1 == w[1].1))
            {
                return Err(ControlError::WiringTableInconsistency(format!(
                    "{} bit {} appears on more than one stage",
                    field, dup[1].0
                )));
            }
            if keyed.len() != field.width() as usize {
                return Err(ControlError::WiringTableInconsistency(format!(
                    "{field} has {} stages, expected {}",
                    keyed.len(),
                    field.width()
                )));
            }
            groups[field.index()] = keyed.into_iter().map(|k| k.2).collect();
        }
        Ok(Self { groups })
    }

    pub fn stages(&self, field: Field) -> &[usize] {
        &self.groups[field.index()]
    }
}
