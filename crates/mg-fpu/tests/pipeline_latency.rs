//! Reproduces the latency/pipelining acceptance scenario: three additions
//! admitted on consecutive cycles into a latency-3 pipelined unit write
//! back in order three cycles later, and a refused write delays every
//! subsequent writeback by exactly one cycle.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mg_core::{CycleNo, Phase, Process, RegAddr};
use mg_fpu::{Fpu, FpuOperation, FpuSource, Size, UnitConfig};

fn add_only_fpu() -> [UnitConfig; 5] {
    [
        UnitConfig::new(3, true),
        UnitConfig::new(1, false),
        UnitConfig::new(1, false),
        UnitConfig::new(1, false),
        UnitConfig::new(1, false),
    ]
}

fn step(fpu: &mut Fpu, cycle: u64) {
    fpu.run(CycleNo::new(cycle), Phase::Check);
    fpu.run(CycleNo::new(cycle), Phase::Commit);
}

#[test]
fn pipelined_add_latency_three_writes_back_in_admission_order() {
    let written = Rc::new(RefCell::new(Vec::<(u64, RegAddr, f64)>::new()));
    let current_cycle = Rc::new(Cell::new(0u64));

    let mut fpu = Fpu::new("fpu0", add_only_fpu());

    let w = Rc::clone(&written);
    let cyc = Rc::clone(&current_cycle);
    let source = fpu.register_source(
        FpuSource::new("alu0", |_addr| true, move |addr, value| {
            w.borrow_mut().push((cyc.get(), addr, value));
            true
        }),
        vec![],
    );

    let dests = [RegAddr::float(1), RegAddr::float(2), RegAddr::float(3)];
    for (i, dest) in dests.iter().enumerate() {
        current_cycle.set(i as u64);
        assert!(fpu.queue_operation(source, FpuOperation::Add, Size::Double, 1.0, f64::from(i as u32), *dest));
        step(&mut fpu, i as u64);
    }
    for c in 3..6 {
        current_cycle.set(c);
        step(&mut fpu, c);
    }

    let log = written.borrow();
    assert_eq!(
        log.as_slice(),
        [(3, dests[0], 1.0), (4, dests[1], 2.0), (5, dests[2], 3.0)]
    );
}

#[test]
fn refused_writeback_delays_every_subsequent_write_by_one_cycle() {
    let written = Rc::new(RefCell::new(Vec::<(u64, RegAddr, f64)>::new()));
    let current_cycle = Rc::new(Cell::new(0u64));
    let refuse_at = Rc::new(Cell::new(None::<u64>));

    let mut fpu = Fpu::new("fpu0", add_only_fpu());

    let cyc_check = Rc::clone(&current_cycle);
    let refuse_check = Rc::clone(&refuse_at);
    let w = Rc::clone(&written);
    let cyc_write = Rc::clone(&current_cycle);
    let source = fpu.register_source(
        FpuSource::new(
            "alu0",
            move |_addr| refuse_check.get() != Some(cyc_check.get()),
            move |addr, value| {
                w.borrow_mut().push((cyc_write.get(), addr, value));
                true
            },
        ),
        vec![],
    );

    let dests = [RegAddr::float(1), RegAddr::float(2), RegAddr::float(3)];
    for (i, dest) in dests.iter().enumerate() {
        current_cycle.set(i as u64);
        fpu.queue_operation(source, FpuOperation::Add, Size::Double, 1.0, f64::from(i as u32), *dest);
        step(&mut fpu, i as u64);
    }

    refuse_at.set(Some(4));
    for c in 3..7 {
        current_cycle.set(c);
        step(&mut fpu, c);
    }

    let log = written.borrow();
    assert_eq!(
        log.as_slice(),
        [(3, dests[0], 1.0), (5, dests[1], 2.0), (6, dests[2], 3.0)],
        "a refusal at cycle 4 pushes the remaining writebacks out by one cycle each"
    );
}
