//! Read-modify-write overlay of field values onto the chain pattern.

use std::fmt;

use antctl_traits::ShiftLines;

use crate::bits::BitVector48;
use crate::bus::ShiftRegisterBus;
use crate::error::{ControlError, Result};
use crate::fields::{Field, FieldGroups};

/// Reject values wider than the field.
pub fn check_range(field: Field, value: u64) -> Result<u32> {
    if value > u64::from(field.max()) {
        return Err(ControlError::FieldRange {
            field,
            value,
            max: field.max(),
        });
    }
    // Lossless: bounded by `field.max()` above.
    Ok(value as u32)
}

/// Field values to overlay; unset fields keep whatever the chain holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldOverrides {
    values: [Option<u32>; 6],
}

impl FieldOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: Field, value: u64) -> Result<()> {
        self.values[field as usize] = Some(check_range(field, value)?);
        Ok(())
    }

    pub fn with(mut self, field: Field, value: u64) -> Result<Self> {
        self.set(field, value)?;
        Ok(self)
    }

    pub fn get(&self, field: Field) -> Option<u32> {
        self.values[field as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, u32)> + '_ {
        Field::ALL
            .into_iter()
            .filter_map(|f| self.get(f).map(|v| (f, v)))
    }
}

/// Pure overlay: `bit[group[i]] = (value >> i) & 1` for every overridden field.
pub fn overlay(
    snapshot: BitVector48,
    groups: &FieldGroups,
    overrides: &FieldOverrides,
) -> BitVector48 {
    let mut out = snapshot;
    for (field, value) in overrides.iter() {
        for (i, &stage) in groups.stages(field).iter().enumerate() {
            out.set_bit(stage, (value >> i) & 1 == 1);
        }
    }
    out
}

/// Reassemble one field from a pattern.
pub fn extract(pattern: BitVector48, groups: &FieldGroups, field: Field) -> u32 {
    groups
        .stages(field)
        .iter()
        .enumerate()
        .fold(0, |acc, (i, &stage)| acc | (u32::from(pattern.bit(stage)) << i))
}

/// Every field decoded from one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldValues {
    pub pattern: BitVector48,
    values: [u32; 6],
}

impl FieldValues {
    pub fn from_pattern(pattern: BitVector48, groups: &FieldGroups) -> Self {
        let mut values = [0; 6];
        for f in Field::ALL {
            values[f as usize] = extract(pattern, groups, f);
        }
        Self { pattern, values }
    }

    pub fn get(&self, field: Field) -> u32 {
        self.values[field as usize]
    }
}

impl fmt::Display for FieldValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pattern {}", self.pattern)?;
        for field in Field::ALL {
            write!(f, " {field}={}", self.get(field))?;
        }
        Ok(())
    }
}

/// Snapshot the chain and overlay `overrides`. Nothing is written.
pub fn build_pattern<L: ShiftLines>(
    bus: &mut ShiftRegisterBus<L>,
    groups: &FieldGroups,
    overrides: &FieldOverrides,
) -> Result<BitVector48> {
    let snapshot = bus.read()?;
    let out = overlay(snapshot, groups, overrides);
    tracing::debug!(%snapshot, pattern = %out, ?overrides, "pattern built");
    Ok(out)
}

pub fn read_field<L: ShiftLines>(
    bus: &mut ShiftRegisterBus<L>,
    groups: &FieldGroups,
    field: Field,
) -> Result<u32> {
    Ok(extract(bus.read()?, groups, field))
}

pub fn read_all_fields<L: ShiftLines>(
    bus: &mut ShiftRegisterBus<L>,
    groups: &FieldGroups,
) -> Result<FieldValues> {
    Ok(FieldValues::from_pattern(bus.read()?, groups))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiring::StageMap;

    fn groups() -> FieldGroups {
        FieldGroups::from_stage_map(&StageMap::board(&[]).unwrap()).unwrap()
    }

    #[test]
    fn overlay_of_nothing_is_identity() {
        let snap = BitVector48::from_u64_masked(0xdead_beef_cafe);
        assert_eq!(overlay(snap, &groups(), &FieldOverrides::new()), snap);
    }

    #[test]
    fn el_bit_zero_lands_on_el_00_stage() {
        let g = groups();
        let o = FieldOverrides::new().with(Field::El, 1).unwrap();
        let v = overlay(BitVector48::ZERO, &g, &o);
        // EL_00 is on pin 25, stage 27.
        assert_eq!(v.diff_indices(BitVector48::ZERO), vec![27]);
    }
}
