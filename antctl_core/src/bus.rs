//! Serial protocol for the 48-stage shift-register chain.

use std::time::Duration;

use antctl_traits::{ShiftLine, ShiftLines, spin_for};
use tracing::{debug, trace, warn};

use crate::bits::{BitVector48, STAGES};
use crate::error::Result;
use crate::hw_error::hw;

/// Result of a verified write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    pub written: BitVector48,
    pub readback: BitVector48,
}

impl WriteReport {
    pub fn matched(&self) -> bool {
        self.written == self.readback
    }

    /// Stages whose readback differs from what was written.
    pub fn mismatched_stages(&self) -> Vec<usize> {
        self.written.diff_indices(self.readback)
    }
}

pub struct ShiftRegisterBus<L> {
    lines: L,
    settle: Duration,
    last_written: Option<BitVector48>,
}

impl<L: ShiftLines> ShiftRegisterBus<L> {
    pub fn new(lines: L, settle: Duration) -> Self {
        Self {
            lines,
            settle,
            last_written: None,
        }
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }

    /// Pattern most recently latched by this bus, if any.
    pub fn last_written(&self) -> Option<BitVector48> {
        self.last_written
    }

    /// Borrow the underlying lines, e.g. to inspect a simulated chain.
    pub fn lines(&self) -> &L {
        &self.lines
    }

    fn set(&mut self, line: ShiftLine, high: bool) -> Result<()> {
        self.lines.write_line(line, high).map_err(hw)
    }

    fn pulse(&mut self, line: ShiftLine) -> Result<()> {
        self.set(line, true)?;
        spin_for(self.settle);
        self.set(line, false)
    }

    /// Shift `v` into the chain (index 0 first) and latch it onto the outputs.
    pub fn write(&mut self, v: BitVector48) -> Result<()> {
        self.set(ShiftLine::OutputEnableN, false)?;
        self.set(ShiftLine::LatchClock, false)?;
        for bit in v.iter() {
            self.set(ShiftLine::SerialData, bit)?;
            spin_for(self.settle);
            self.pulse(ShiftLine::ShiftClock)?;
        }
        self.pulse(ShiftLine::LatchClock)?;
        self.last_written = Some(v);
        trace!(pattern = %v, "chain written");
        Ok(())
    }

    /// Clock the chain contents out through the serial output. The chain is
    /// left shifted out; callers must latch a pattern again.
    fn shift_out(&mut self) -> Result<BitVector48> {
        self.pulse(ShiftLine::LatchClock)?;
        spin_for(self.settle);
        let mut v = BitVector48::ZERO;
        for index in 0..STAGES {
            let bit = self.lines.read_serial_out().map_err(hw)?;
            v.set_bit(index, bit);
            self.pulse(ShiftLine::ShiftClock)?;
            spin_for(self.settle);
        }
        Ok(v)
    }

    /// Read the chain, then latch the pattern that was on the outputs before.
    ///
    /// The restore uses the last pattern this bus wrote. Only when nothing has
    /// been written yet is the read value itself written back.
    pub fn read(&mut self) -> Result<BitVector48> {
        let v = self.shift_out()?;
        self.write(self.last_written.unwrap_or(v))?;
        trace!(pattern = %v, "chain read");
        Ok(v)
    }

    /// Write, then read back. A mismatch is logged and reported, never retried,
    /// and `v` stays latched either way.
    pub fn write_verified(&mut self, v: BitVector48) -> Result<WriteReport> {
        self.write(v)?;
        let readback = self.shift_out()?;
        self.write(v)?;
        let report = WriteReport {
            written: v,
            readback,
        };
        if report.matched() {
            debug!(pattern = %v, "chain write verified");
        } else {
            warn!(
                written = %v,
                readback = %readback,
                stages = ?report.mismatched_stages(),
                "chain readback mismatch"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use antctl_hardware::SimulatedShiftChain;

    fn bus() -> (ShiftRegisterBus<SimulatedShiftChain>, SimulatedShiftChain) {
        let chain = SimulatedShiftChain::new();
        (ShiftRegisterBus::new(chain.clone(), Duration::ZERO), chain)
    }

    #[test]
    fn write_latches_once_and_enables_outputs() {
        let (mut bus, chain) = bus();
        let v = BitVector48::from_u64_masked(0x8000_0000_0001);
        bus.write(v).unwrap();
        assert_eq!(chain.latched_value(), v.as_u64());
        assert_eq!(chain.latch_pulses(), 1);
        assert!(chain.outputs_enabled());
    }

    #[test]
    fn read_restores_outputs() {
        let (mut bus, chain) = bus();
        let v = BitVector48::from_u64_masked(0x1234_5678_9abc);
        bus.write(v).unwrap();
        assert_eq!(bus.read().unwrap(), v);
        assert_eq!(chain.latched_value(), v.as_u64());
    }

    #[test]
    fn stuck_serial_out_is_reported_as_mismatch() {
        let (mut bus, chain) = bus();
        chain.stick_serial_out(Some(false));
        let report = bus
            .write_verified(BitVector48::from_u64_masked(0b101))
            .unwrap();
        assert!(!report.matched());
        assert_eq!(report.mismatched_stages(), vec![0, 2]);
        assert_eq!(chain.latched_value(), 0b101);
    }

    #[test]
    fn faulty_readback_keeps_last_written_pattern() {
        let (mut bus, chain) = bus();
        let v = BitVector48::from_u64_masked(0x0f0f);
        bus.write(v).unwrap();
        chain.stick_serial_out(Some(true));
        assert_eq!(bus.read().unwrap(), BitVector48::from_u64_masked(u64::MAX));
        assert_eq!(chain.latched_value(), 0x0f0f);
    }
}
