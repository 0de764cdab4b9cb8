//! Typed storage objects: the only channel through which processes
//! communicate.
//!
//! Every storage keeps its own sensitivity list — the processes to mark
//! ready when it is written — so wiring code never has to hand-wire wakeup
//! propagation. Mutating methods take a `wake` buffer to append newly
//! sensitised process ids into; the caller (the kernel, via its owning
//! component) drains that buffer into the ready set at the start of the
//! next cycle.

use std::collections::VecDeque;

use crate::process::ProcessId;

/// A FIFO of bounded capacity. `push` fails when full; `pop`/`front` fail
/// when empty.
#[derive(Debug, Clone)]
pub struct BoundedBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
    /// Woken when the buffer becomes non-empty (the consumer side).
    consumers: Vec<ProcessId>,
    /// Woken when the buffer becomes non-full (the producer side).
    producers: Vec<ProcessId>,
}

impl<T> BoundedBuffer<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "a bounded buffer needs positive capacity");
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
            consumers: Vec::new(),
            producers: Vec::new(),
        }
    }

    pub fn sensitive_to_writes(&mut self, consumer: ProcessId) {
        self.consumers.push(consumer);
    }

    pub fn sensitive_to_reads(&mut self, producer: ProcessId) {
        self.producers.push(producer);
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    /// Appends `value`. Returns `false` (no mutation) if the buffer is full.
    pub fn push(&mut self, value: T, wake: &mut Vec<ProcessId>) -> bool {
        if self.is_full() {
            return false;
        }
        let was_empty = self.items.is_empty();
        self.items.push_back(value);
        if was_empty {
            wake.extend(self.consumers.iter().copied());
        }
        true
    }

    /// Removes and returns the front element, if any.
    pub fn pop(&mut self, wake: &mut Vec<ProcessId>) -> Option<T> {
        let was_full = self.is_full();
        let v = self.items.pop_front();
        if v.is_some() && was_full {
            wake.extend(self.producers.iter().copied());
        }
        v
    }
}

/// The presence state of a register cell's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegState<T> {
    Empty,
    /// A read arrived before the value; `waiters` is who is blocked on it.
    Waiting(Vec<ProcessId>),
    Full(T),
}

/// A single register-file slot: a value with a three-state presence bit.
///
/// Writing [`RegState::Full`] over [`RegState::Waiting`] wakes every waiter
/// that registered via [`RegisterCell::write_waiting`].
#[derive(Debug, Clone)]
pub struct RegisterCell<T> {
    state: RegState<T>,
}

impl<T: Clone> RegisterCell<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { state: RegState::Empty }
    }

    #[must_use]
    pub fn read(&self) -> RegState<T> {
        self.state.clone()
    }

    /// Unconditionally overwrites the cell, waking any registered waiters.
    pub fn write_full(&mut self, value: T, wake: &mut Vec<ProcessId>) {
        if let RegState::Waiting(waiters) = &self.state {
            wake.extend(waiters.iter().copied());
        }
        self.state = RegState::Full(value);
    }

    /// Registers `waiter` as blocked on this cell. Only valid while the
    /// cell is [`RegState::Empty`]; returns `false` otherwise.
    pub fn write_waiting(&mut self, waiter: ProcessId) -> bool {
        match &mut self.state {
            RegState::Empty => {
                self.state = RegState::Waiting(vec![waiter]);
                true
            }
            RegState::Waiting(waiters) => {
                waiters.push(waiter);
                true
            }
            RegState::Full(_) => false,
        }
    }

    pub fn clear(&mut self) {
        self.state = RegState::Empty;
    }
}

impl<T: Clone> Default for RegisterCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A payload-free storage granting exclusive priority access per cycle.
///
/// Every contending process calls [`ArbitratedService::invoke`] during its
/// check phase; [`ArbitratedService::arbitrate`] picks exactly one winner by
/// strict priority (lower value wins) with round-robin tie-break among
/// equal priorities, then clears all requests for the next cycle. Losers
/// observe [`crate::RunState::Delayed`].
#[derive(Debug, Default)]
pub struct ArbitratedService {
    requests: Vec<(ProcessId, u32)>,
    round_robin_cursor: usize,
}

impl ArbitratedService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invoke(&mut self, requester: ProcessId, priority: u32) {
        self.requests.push((requester, priority));
    }

    /// Picks and returns the winner, clearing all requests for next cycle.
    pub fn arbitrate(&mut self) -> Option<ProcessId> {
        if self.requests.is_empty() {
            return None;
        }
        let best_priority = self.requests.iter().map(|(_, p)| *p).min().unwrap();
        let contenders: Vec<ProcessId> = self
            .requests
            .iter()
            .filter(|(_, p)| *p == best_priority)
            .map(|(id, _)| *id)
            .collect();

        let pick_index = self.round_robin_cursor % contenders.len();
        let winner = contenders[pick_index];
        self.round_robin_cursor = self.round_robin_cursor.wrapping_add(1);

        self.requests.clear();
        Some(winner)
    }
}
