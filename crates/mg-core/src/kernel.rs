//! The clock & event wheel: advances simulated time and dispatches the
//! processes that are due each cycle.
//!
//! The kernel itself owns no component state — components and the
//! processes attached to them live in the wiring code (a `Directory`, a
//! `Fpu`, a `DCache`, ...). Each cycle the caller hands the kernel a dense
//! slice of `&mut dyn Process`, indexed by the stable [`ProcessId`] assigned
//! at [`Kernel::register_process`] time; the kernel decides which of them
//! run this cycle and in what phase.

use std::collections::VecDeque;

use crate::cycle::CycleNo;
use crate::error::SimError;
use crate::process::{Phase, Process, ProcessId, RunState};

/// Outcome of running exactly one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: CycleNo,
    pub committed: usize,
    /// True if no process was ready this cycle (normal idle, not a stall).
    pub quiescent: bool,
}

/// The discrete-event kernel.
pub struct Kernel {
    cycle: CycleNo,
    process_names: Vec<String>,
    ready: VecDeque<ProcessId>,
    in_ready: Vec<bool>,
}

impl Kernel {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cycle: CycleNo::ZERO,
            process_names: Vec::new(),
            ready: VecDeque::new(),
            in_ready: Vec::new(),
        }
    }

    #[must_use]
    pub fn cycle(&self) -> CycleNo {
        self.cycle
    }

    /// Registers a process during wiring, returning its dense id. The
    /// process starts ready so it gets a chance to run on cycle 0.
    pub fn register_process(&mut self, name: impl Into<String>) -> ProcessId {
        let id = self.process_names.len();
        self.process_names.push(name.into());
        self.ready.push_back(id);
        self.in_ready.push(true);
        id
    }

    /// Marks processes ready for the next time `run_cycle` is called.
    /// Called by component wiring after a commit-phase storage write
    /// drains that storage's sensitivity list.
    pub fn wake<I: IntoIterator<Item = ProcessId>>(&mut self, ids: I) {
        for id in ids {
            if !self.in_ready[id] {
                self.in_ready[id] = true;
                self.ready.push_back(id);
            }
        }
    }

    /// Runs exactly one cycle against the given processes, indexed by
    /// `ProcessId`. Returns `Err(SimError::Stall)` if the ready set was
    /// non-empty but nothing committed (deadlock).
    pub fn run_cycle(
        &mut self,
        processes: &mut [&mut dyn Process],
    ) -> Result<CycleReport, SimError> {
        let now = self.cycle;
        let ready_ids: Vec<ProcessId> = self.ready.drain(..).collect();
        for &id in &ready_ids {
            self.in_ready[id] = false;
        }

        if ready_ids.is_empty() {
            self.cycle = now.next();
            return Ok(CycleReport { cycle: now, committed: 0, quiescent: true });
        }

        let mut successes = Vec::new();
        let mut pending = Vec::new();
        for &id in &ready_ids {
            match processes[id].run(now, Phase::Check) {
                RunState::Success => successes.push(id),
                RunState::Failed | RunState::Delayed => pending.push(id),
            }
        }

        for &id in &successes {
            processes[id].run(now, Phase::Commit);
        }

        // Failed and Delayed processes both retry automatically next cycle.
        for id in pending.iter().copied() {
            if !self.in_ready[id] {
                self.in_ready[id] = true;
                self.ready.push_back(id);
            }
        }

        if successes.is_empty() {
            let names: Vec<String> = ready_ids.iter().map(|&id| self.process_names[id].clone()).collect();
            let process_names = &self.process_names;
            let storages = ready_ids
                .iter()
                .flat_map(|&id| {
                    let p = &processes[id];
                    p.read_trace()
                        .iter()
                        .chain(p.write_trace())
                        .map(move |sid| format!("{}:#{sid}", process_names[id]))
                })
                .collect();
            log::warn!("cycle {now}: stall, {} ready process(es) made no progress: {names:?}", names.len());
            self.cycle = now.next();
            return Err(SimError::Stall { cycle: now, processes: names, storages });
        }

        self.cycle = now.next();
        Ok(CycleReport { cycle: now, committed: successes.len(), quiescent: false })
    }

    /// Runs up to `n` cycles, or fewer if the system goes quiescent first
    /// (empty ready set with no pending wakeups). Returns the number of
    /// cycles actually run.
    pub fn advance(&mut self, n: u64, processes: &mut [&mut dyn Process]) -> Result<u64, SimError> {
        for i in 0..n {
            let report = self.run_cycle(processes)?;
            if report.quiescent {
                return Ok(i);
            }
        }
        Ok(n)
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BoundedBuffer;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Producer {
        out: Rc<RefCell<BoundedBuffer<u32>>>,
        next: u32,
        wake: Vec<ProcessId>,
    }

    struct Consumer {
        inp: Rc<RefCell<BoundedBuffer<u32>>>,
        received: Vec<u32>,
        wake: Vec<ProcessId>,
    }

    impl Process for Producer {
        fn name(&self) -> &str {
            "producer"
        }
        fn run(&mut self, _now: CycleNo, phase: Phase) -> RunState {
            if self.out.borrow().is_full() {
                return RunState::Failed;
            }
            let next = self.next;
            crate::process::commit(phase, || {
                self.out.borrow_mut().push(next, &mut self.wake);
                self.next += 1;
            });
            RunState::Success
        }
    }

    impl Process for Consumer {
        fn name(&self) -> &str {
            "consumer"
        }
        fn run(&mut self, _now: CycleNo, phase: Phase) -> RunState {
            if self.inp.borrow().is_empty() {
                return RunState::Failed;
            }
            let mut got = None;
            crate::process::commit(phase, || {
                got = self.inp.borrow_mut().pop(&mut self.wake);
            });
            if let Some(v) = got {
                self.received.push(v);
            }
            RunState::Success
        }
    }

    #[test]
    fn buffer_handoff_runs_to_quiescence() {
        let buf = Rc::new(RefCell::new(BoundedBuffer::new(1)));
        let mut kernel = Kernel::new();
        let producer_id = kernel.register_process("producer");
        let consumer_id = kernel.register_process("consumer");
        buf.borrow_mut().sensitive_to_writes(consumer_id);
        buf.borrow_mut().sensitive_to_reads(producer_id);

        let mut producer = Producer { out: Rc::clone(&buf), next: 0, wake: Vec::new() };
        let mut consumer = Consumer { inp: Rc::clone(&buf), received: Vec::new(), wake: Vec::new() };

        for _ in 0..6 {
            let mut procs: Vec<&mut dyn Process> = vec![&mut producer, &mut consumer];
            kernel.run_cycle(&mut procs).unwrap();
            let wakes = std::mem::take(&mut producer.wake);
            kernel.wake(wakes);
            let wakes = std::mem::take(&mut consumer.wake);
            kernel.wake(wakes);
        }

        assert_eq!(consumer.received, vec![0, 1, 2]);
    }

    #[test]
    fn zero_commits_with_nonempty_ready_set_is_a_stall() {
        struct AlwaysFails;
        impl Process for AlwaysFails {
            fn name(&self) -> &str {
                "stuck"
            }
            fn run(&mut self, _now: CycleNo, _phase: Phase) -> RunState {
                RunState::Failed
            }
        }

        let mut kernel = Kernel::new();
        kernel.register_process("stuck");
        let mut stuck = AlwaysFails;
        let mut procs: Vec<&mut dyn Process> = vec![&mut stuck];
        let err = kernel.run_cycle(&mut procs).unwrap_err();
        assert!(matches!(err, SimError::Stall { .. }));
    }
}
