//! A single pipeline: one per FPU operation type.
//!
//! `pipelined = false` units behave as a single non-overlapping execution
//! unit: the whole slot queue must drain before a new operand is admitted.
//! `pipelined = true` units accept a new operand every cycle as long as the
//! queue hasn't backed up to the unit's own latency (a head stall
//! propagating all the way to the tail).

use std::collections::VecDeque;

use mg_core::{CycleNo, RegAddr};

/// An operation in flight inside a [`Unit`].
#[derive(Debug, Clone)]
pub struct FpuResult {
    pub address: RegAddr,
    pub value: f64,
    pub source: usize,
    /// Cycles elapsed since admission. Ready for writeback once this
    /// reaches the unit's latency.
    pub state: u64,
}

#[derive(Debug)]
pub struct Unit {
    pub latency: CycleNo,
    pub pipelined: bool,
    pub slots: VecDeque<FpuResult>,
}

impl Unit {
    #[must_use]
    pub fn new(latency: u64, pipelined: bool) -> Self {
        Self { latency: CycleNo::new(latency), pipelined, slots: VecDeque::new() }
    }

    /// Whether a new operand can be admitted to the tail this cycle.
    #[must_use]
    pub fn can_admit(&self) -> bool {
        if self.pipelined {
            (self.slots.len() as u64) < self.latency.get().max(1)
        } else {
            self.slots.is_empty()
        }
    }

    pub fn admit(&mut self, result: FpuResult) -> bool {
        if !self.can_admit() {
            return false;
        }
        self.slots.push_back(result);
        true
    }

    /// Whether the head slot has aged enough to attempt writeback.
    #[must_use]
    pub fn head_ready(&self) -> bool {
        self.slots.front().is_some_and(|r| r.state >= self.latency.get())
    }

    /// Advances every in-flight slot's state by one cycle.
    pub fn age(&mut self) {
        for slot in &mut self.slots {
            slot.state += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mg_core::RegClass;

    fn sample(source: usize) -> FpuResult {
        FpuResult { address: RegAddr::new(RegClass::Float, 0), value: 1.0, source, state: 0 }
    }

    #[test]
    fn non_pipelined_unit_requires_empty_queue_to_admit() {
        let mut unit = Unit::new(2, false);
        assert!(unit.admit(sample(0)));
        assert!(!unit.admit(sample(1)), "non-pipelined unit is a single bubble");
    }

    #[test]
    fn pipelined_unit_admits_until_queue_reaches_latency() {
        let mut unit = Unit::new(3, true);
        assert!(unit.admit(sample(0)));
        assert!(unit.admit(sample(1)));
        assert!(unit.admit(sample(2)));
        assert!(!unit.admit(sample(3)), "head stall reaching the tail blocks admission");
    }

    #[test]
    fn head_becomes_ready_after_latency_cycles() {
        let mut unit = Unit::new(2, true);
        unit.admit(sample(0));
        assert!(!unit.head_ready());
        unit.age();
        assert!(!unit.head_ready());
        unit.age();
        assert!(unit.head_ready());
    }
}
