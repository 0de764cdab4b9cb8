//! Reproduces the reserved-counter read scenario: a read of index 13
//! must come back as all-ones regardless of what the stats provider
//! would otherwise report.

use mg_device::PerfCounters;

#[test]
fn reading_reserved_counter_thirteen_returns_all_ones() {
    let mut pc = PerfCounters::new(|_| 0xDEAD_BEEF);
    let value = pc.read(13 * 8, 8).unwrap();
    assert_eq!(value, u64::MAX);
}
