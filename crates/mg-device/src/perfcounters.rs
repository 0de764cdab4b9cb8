//! Read-only performance-counter MMIO region.
//!
//! Eighteen fixed 8-byte counters at word-indexed addresses. Indices
//! 13-15 are reserved — the original left them "free to reuse" and wired
//! them to read back as all-ones rather than zero, presumably so a probe
//! can tell a reserved counter from an absent one. We keep that exact
//! convention since it's observable behaviour client code may depend on.

use mg_core::{SimError, SimResult};

const NUM_COUNTERS: usize = 18;
const COUNTER_WIDTH: u32 = 8;

/// Which live statistic backs a given counter index. Indices outside this
/// set but below [`NUM_COUNTERS`] read back as `0`; at or above it, the
/// access is out of range.
fn is_reserved(index: usize) -> bool {
    (13..=15).contains(&index)
}

/// The performance-counter block. Counters are sourced lazily from
/// `provider`, a callback into whatever owns the live pipeline/memory
/// statistics — the counters themselves hold no state.
pub struct PerfCounters {
    provider: Box<dyn Fn(usize) -> u64>,
    num_cycle_sample_ops: u64,
    num_other_sample_ops: u64,
}

impl PerfCounters {
    pub fn new(provider: impl Fn(usize) -> u64 + 'static) -> Self {
        Self { provider: Box::new(provider), num_cycle_sample_ops: 0, num_other_sample_ops: 0 }
    }

    #[must_use]
    pub const fn size_bytes() -> usize {
        NUM_COUNTERS * COUNTER_WIDTH as usize
    }

    /// Reads one 8-byte counter at `address` (a byte offset into the
    /// region). Any other access size fails.
    pub fn read(&mut self, address: u64, size: u32) -> SimResult<u64> {
        if size != COUNTER_WIDTH {
            return Err(SimError::DeviceIo {
                address,
                reason: format!("performance counters only support {COUNTER_WIDTH}-byte reads"),
            });
        }
        let index = (address / u64::from(COUNTER_WIDTH)) as usize;
        let value = if is_reserved(index) {
            log::debug!("read of reserved performance counter {index}, returning all-ones");
            u64::MAX
        } else if index < NUM_COUNTERS {
            (self.provider)(index)
        } else {
            log::debug!("out-of-range performance counter read at index {index}");
            0
        };

        if index == 0 {
            self.num_cycle_sample_ops += 1;
        } else {
            self.num_other_sample_ops += 1;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_indices_read_back_as_all_ones() {
        let mut pc = PerfCounters::new(|_| 0);
        assert_eq!(pc.read(13 * 8, 8).unwrap(), u64::MAX);
        assert_eq!(pc.read(14 * 8, 8).unwrap(), u64::MAX);
        assert_eq!(pc.read(15 * 8, 8).unwrap(), u64::MAX);
    }

    #[test]
    fn a_real_counter_reads_through_the_provider() {
        let mut pc = PerfCounters::new(|index| if index == 1 { 42 } else { 0 });
        assert_eq!(pc.read(1 * 8, 8).unwrap(), 42);
        assert_eq!(pc.read(0, 8).unwrap(), 0);
    }

    #[test]
    fn wrong_size_access_fails() {
        let mut pc = PerfCounters::new(|_| 0);
        assert!(pc.read(0, 4).is_err());
    }

    #[test]
    fn out_of_range_index_reads_zero() {
        let mut pc = PerfCounters::new(|_| 0);
        assert_eq!(pc.read(100 * 8, 8).unwrap(), 0);
    }
}
