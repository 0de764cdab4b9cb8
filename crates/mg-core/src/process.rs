//! Two-phase processes: the unit of work the kernel schedules.

use crate::cycle::CycleNo;

/// Which half of a cycle a process is currently executing.
///
/// A process body is invoked up to twice per cycle: once in [`Phase::Check`]
/// to decide whether it can make progress (querying storages only), and
/// again in [`Phase::Commit`] — only if the check succeeded — to actually
/// apply its mutations. The [`commit`] helper gates a block of code so it
/// only runs in the second invocation, mirroring the scoped "commit
/// construct" design note: write the body once, let the phase decide
/// whether its mutations take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Check,
    Commit,
}

/// Runs `f` only during the commit phase. Inert (a no-op) during the check
/// phase, so a process body can be written once with all of its observable
/// mutations wrapped in a call to this function.
#[inline]
pub fn commit(phase: Phase, f: impl FnOnce()) {
    if phase == Phase::Commit {
        f();
    }
}

/// Outcome of running a process for one phase of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// The process could make progress; its commit phase will run this cycle.
    Success,
    /// The process could not make progress this cycle (a precondition on a
    /// storage was not met). Retried automatically next cycle.
    Failed,
    /// The process voluntarily yielded (e.g. lost arbitration). Retried
    /// automatically next cycle, but never counted as evidence of deadlock.
    Delayed,
}

impl RunState {
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, RunState::Success)
    }
}

/// Dense identifier for a process, assigned by the kernel at registration.
pub type ProcessId = usize;

/// Dense identifier for a storage object, assigned by its owning component.
///
/// Storage ids are scoped to whichever component allocated them; the kernel
/// only uses them as opaque labels when reporting a deadlock.
pub type StorageId = usize;

/// A named, side-effectful routine attached to an [`Object`](crate::Object),
/// scheduled by the kernel whenever one of its sensitised storages changes.
///
/// Implementors declare the full set of storages they may read or write so
/// the kernel's static deadlock detector can reason about cyclic demand
/// without executing the body.
pub trait Process {
    /// Name used in deadlock reports and inspection output.
    fn name(&self) -> &str;

    /// Runs one phase of this process for the given cycle.
    ///
    /// Mutations must be guarded by [`commit`] (or an equivalent phase
    /// check) so that calling this twice per cycle — once to check, once to
    /// commit — only ever applies them once.
    fn run(&mut self, now: CycleNo, phase: Phase) -> RunState;

    /// Storages this process may read, for deadlock analysis.
    fn read_trace(&self) -> &[StorageId] {
        &[]
    }

    /// Storages this process may write, for deadlock analysis.
    fn write_trace(&self) -> &[StorageId] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        staged: u32,
        committed: u32,
    }

    impl Process for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn run(&mut self, _now: CycleNo, phase: Phase) -> RunState {
            self.staged += 1;
            commit(phase, || self.committed = self.staged);
            RunState::Success
        }
    }

    #[test]
    fn commit_is_inert_during_check_phase() {
        let mut p = Counter { staged: 0, committed: 0 };
        assert_eq!(p.run(CycleNo::ZERO, Phase::Check), RunState::Success);
        assert_eq!(p.committed, 0, "check phase must not mutate observable state");
        assert_eq!(p.run(CycleNo::ZERO, Phase::Commit), RunState::Success);
        assert_eq!(p.committed, p.staged);
    }
}
