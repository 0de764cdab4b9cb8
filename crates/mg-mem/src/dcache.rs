//! The L1 data cache: set-associative, with outstanding misses tracked per
//! line and multi-register loads drained through an arbitrated writeback
//! port one register per cycle.

use mg_core::{ArbitratedService, CycleNo, ProcessId, RegAddr};

use crate::addr::{MemAddr, MemSize};
use crate::line::{Line, LineState, WritebackState};
use crate::selector::BankSelector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadResult {
    Hit,
    MissStarted,
    MissPending,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteResult {
    Issued,
    Failed,
}

/// A request queued toward the memory bus.
#[derive(Debug, Clone)]
pub struct MemoryRequest {
    pub address: MemAddr,
    pub size: MemSize,
    pub write: bool,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct DCacheStats {
    pub num_r_hits: u64,
    pub num_delayed_reads: u64,
    pub num_empty_r_misses: u64,
    pub num_invalid_r_misses: u64,
    pub num_loading_r_misses: u64,
    pub num_hard_conflicts: u64,
    pub num_resolved_conflicts: u64,
    pub num_w_accesses: u64,
    pub num_w_hits: u64,
    pub num_pass_through_w_misses: u64,
    pub num_loading_w_misses: u64,
    pub num_stalling_r_misses: u64,
    pub num_stalling_w_misses: u64,
    pub num_snoops: u64,
}

pub struct DCache {
    name: String,
    assoc: usize,
    sets: usize,
    line_size: usize,
    selector: Box<dyn BankSelector>,
    lines: Vec<Line>,
    outgoing: Vec<MemoryRequest>,
    outgoing_capacity: usize,
    wbstate: Option<WritebackState>,
    wbstate_line: Option<usize>,
    pub stats: DCacheStats,
}

impl DCache {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        assoc: usize,
        sets: usize,
        line_size: usize,
        selector: Box<dyn BankSelector>,
        outgoing_capacity: usize,
    ) -> Self {
        Self {
            name: name.into(),
            assoc,
            sets,
            line_size,
            selector,
            lines: (0..assoc * sets).map(|_| Line::empty(line_size)).collect(),
            outgoing: Vec::new(),
            outgoing_capacity,
            wbstate: None,
            wbstate_line: None,
            stats: DCacheStats::default(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn line(&self, index: usize) -> &Line {
        &self.lines[index]
    }

    fn way_range(&self, set: usize) -> std::ops::Range<usize> {
        set * self.assoc..set * self.assoc + self.assoc
    }

    fn locate(&self, address: MemAddr) -> (MemAddr, usize) {
        let line_address = address / self.line_size as MemAddr;
        self.selector.map(line_address, self.sets)
    }

    fn find_line(&self, tag: MemAddr, set: usize) -> Option<usize> {
        self.way_range(set)
            .find(|&i| self.lines[i].tag == tag && !matches!(self.lines[i].state, LineState::Empty))
    }

    fn find_victim(&self, set: usize) -> Option<usize> {
        let range = self.way_range(set);
        range
            .clone()
            .find(|&i| matches!(self.lines[i].state, LineState::Empty))
            .or_else(|| {
                range
                    .clone()
                    .filter(|&i| matches!(self.lines[i].state, LineState::Invalid))
                    .min_by_key(|&i| self.lines[i].access.get())
            })
            .or_else(|| {
                range
                    .filter(|&i| matches!(self.lines[i].state, LineState::Full))
                    .min_by_key(|&i| self.lines[i].access.get())
            })
    }

    fn issue_request(&mut self, req: MemoryRequest) -> bool {
        if self.outgoing.len() >= self.outgoing_capacity {
            return false;
        }
        self.outgoing.push(req);
        true
    }

    fn start_miss(&mut self, tag: MemAddr, set: usize, idx: usize, dest: RegAddr, now: CycleNo) -> ReadResult {
        let line_address = tag * self.sets as MemAddr + set as MemAddr;
        let address = line_address * self.line_size as MemAddr;
        if !self.issue_request(MemoryRequest {
            address,
            size: self.line_size as MemSize,
            write: false,
            data: Vec::new(),
        }) {
            self.stats.num_stalling_r_misses += 1;
            return ReadResult::Failed;
        }
        let line = &mut self.lines[idx];
        line.tag = tag;
        line.state = LineState::Loading;
        line.waiting = vec![dest];
        line.access = now;
        ReadResult::MissStarted
    }

    /// Attempts a read. `address` need not be line-aligned.
    pub fn read(&mut self, now: CycleNo, address: MemAddr, dest: RegAddr) -> ReadResult {
        let (tag, set) = self.locate(address);
        if let Some(idx) = self.find_line(tag, set) {
            match self.lines[idx].state {
                LineState::Full => {
                    self.lines[idx].access = now;
                    self.stats.num_r_hits += 1;
                    ReadResult::Hit
                }
                LineState::Loading => {
                    self.lines[idx].waiting.push(dest);
                    self.stats.num_loading_r_misses += 1;
                    self.stats.num_delayed_reads += 1;
                    ReadResult::MissPending
                }
                LineState::Invalid => {
                    self.stats.num_invalid_r_misses += 1;
                    self.start_miss(tag, set, idx, dest, now)
                }
                LineState::Empty => unreachable!("find_line never returns an empty line"),
            }
        } else {
            match self.find_victim(set) {
                Some(idx) => {
                    if matches!(self.lines[idx].state, LineState::Empty) {
                        self.stats.num_empty_r_misses += 1;
                    } else {
                        self.stats.num_resolved_conflicts += 1;
                    }
                    self.start_miss(tag, set, idx, dest, now)
                }
                None => {
                    self.stats.num_hard_conflicts += 1;
                    ReadResult::Failed
                }
            }
        }
    }

    /// Issues a write, pass-through to memory, with an opportunistic local
    /// fill if the line is resident and full.
    pub fn write(&mut self, address: MemAddr, data: &[u8]) -> WriteResult {
        self.stats.num_w_accesses += 1;
        let (tag, set) = self.locate(address);
        if !self.issue_request(MemoryRequest {
            address,
            size: data.len() as MemSize,
            write: true,
            data: data.to_vec(),
        }) {
            self.stats.num_stalling_w_misses += 1;
            return WriteResult::Failed;
        }
        match self.find_line(tag, set) {
            Some(idx) if matches!(self.lines[idx].state, LineState::Full) => {
                self.stats.num_w_hits += 1;
                let offset = (address % self.line_size as MemAddr) as usize;
                let end = (offset + data.len()).min(self.lines[idx].data.len());
                self.lines[idx].data[offset..end].copy_from_slice(&data[..end - offset]);
            }
            Some(idx) if matches!(self.lines[idx].state, LineState::Loading) => {
                self.stats.num_loading_w_misses += 1;
            }
            _ => {
                self.stats.num_pass_through_w_misses += 1;
            }
        }
        WriteResult::Issued
    }

    #[must_use]
    pub fn pop_outgoing(&mut self) -> Option<MemoryRequest> {
        if self.outgoing.is_empty() {
            None
        } else {
            Some(self.outgoing.remove(0))
        }
    }

    /// Completes a fill: marks the line Full and, if registers were
    /// waiting, begins draining them through the writeback cursor.
    pub fn on_read_completed(&mut self, address: MemAddr, data: &[u8], now: CycleNo) -> bool {
        let (tag, set) = self.locate(address);
        let Some(idx) = self.find_line(tag, set) else {
            return false;
        };
        if !matches!(self.lines[idx].state, LineState::Loading) {
            return false;
        }
        let line = &mut self.lines[idx];
        let n = data.len().min(line.data.len());
        line.data[..n].copy_from_slice(&data[..n]);
        line.valid.iter_mut().for_each(|v| *v = true);
        line.state = LineState::Full;
        line.access = now;
        if let Some(&first) = line.waiting.first() {
            let count = line.waiting.len() as u32;
            self.wbstate = Some(WritebackState::new(first, count, 0));
            self.wbstate_line = Some(idx);
            self.lines[idx].waiting.clear();
        }
        true
    }

    pub fn on_write_completed(&mut self) -> bool {
        true
    }

    /// A snoop updates whatever bytes `mask` covers without touching state.
    pub fn on_snooped(&mut self, address: MemAddr, data: &[u8], mask: &[bool]) -> bool {
        let (tag, set) = self.locate(address);
        let Some(idx) = self.find_line(tag, set) else {
            return false;
        };
        self.stats.num_snoops += 1;
        self.lines[idx].merge_snoop(data, mask);
        true
    }

    /// Invalidates a resident line: Full becomes Invalid; a Loading line
    /// drops its pending fill back to Invalid too (its waiters are lost,
    /// matching the upstream protocol which re-issues on conflict).
    pub fn on_invalidated(&mut self, address: MemAddr) -> bool {
        let (tag, set) = self.locate(address);
        let Some(idx) = self.find_line(tag, set) else {
            return false;
        };
        self.lines[idx].state = LineState::Invalid;
        true
    }

    /// Registers this cache's pending multi-register writeback as a
    /// contender for the shared register-file port, if one is in flight.
    pub fn request_writeback(&self, service: &mut ArbitratedService, my_id: ProcessId) {
        if self.wbstate.as_ref().is_some_and(|s| !s.is_done()) {
            service.invoke(my_id, 0);
        }
    }

    /// Called once this cache has won the writeback port arbitration for
    /// the cycle; stages and emits exactly one register.
    pub fn service_writeback(&mut self) -> Option<(RegAddr, u64)> {
        let idx = self.wbstate_line?;
        let (addr, value) = {
            let line = &self.lines[idx];
            let wbs = self.wbstate.as_mut()?;
            wbs.stage_from_line(line);
            wbs.advance()
        };
        if self.wbstate.as_ref().is_some_and(WritebackState::is_done) {
            self.wbstate = None;
            self.wbstate_line = None;
        }
        Some((addr, value))
    }

    #[must_use]
    pub fn associativity(&self) -> usize {
        self.assoc
    }

    #[must_use]
    pub fn num_sets(&self) -> usize {
        self.sets
    }

    #[must_use]
    pub fn num_lines(&self) -> usize {
        self.lines.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::DirectBankSelector;
    use mg_core::RegClass;

    fn new_cache() -> DCache {
        DCache::new("dcache0", 2, 4, 8, Box::new(DirectBankSelector), 4)
    }

    #[test]
    fn first_read_misses_and_starts_a_fetch() {
        let mut c = new_cache();
        let dest = RegAddr::new(RegClass::Integer, 1);
        let r = c.read(CycleNo::new(0), 0x1000, dest);
        assert_eq!(r, ReadResult::MissStarted);
        assert_eq!(c.stats.num_empty_r_misses, 1);
    }

    #[test]
    fn second_read_to_loading_line_is_miss_pending() {
        let mut c = new_cache();
        let dest1 = RegAddr::new(RegClass::Integer, 1);
        let dest2 = RegAddr::new(RegClass::Integer, 2);
        c.read(CycleNo::new(0), 0x1000, dest1);
        let r = c.read(CycleNo::new(1), 0x1000, dest2);
        assert_eq!(r, ReadResult::MissPending);
    }

    #[test]
    fn fill_completion_promotes_line_to_full_and_then_hits() {
        let mut c = new_cache();
        let dest = RegAddr::new(RegClass::Integer, 1);
        c.read(CycleNo::new(0), 0x1000, dest);
        let fill = [1u8; 8];
        assert!(c.on_read_completed(0x1000, &fill, CycleNo::new(1)));
        let r = c.read(CycleNo::new(2), 0x1000, dest);
        assert_eq!(r, ReadResult::Hit);
    }

    #[test]
    fn hard_conflict_with_all_ways_loading_fails() {
        let mut c = new_cache();
        let dest = RegAddr::new(RegClass::Integer, 1);
        // Set 0 has 2 ways (assoc=2). Fill both with distinct Loading tags.
        assert_eq!(c.read(CycleNo::new(0), 0x0000, dest), ReadResult::MissStarted);
        assert_eq!(c.read(CycleNo::new(0), 0x0020, dest), ReadResult::MissStarted);
        assert_eq!(c.read(CycleNo::new(0), 0x0040, dest), ReadResult::Failed);
        assert_eq!(c.stats.num_hard_conflicts, 1);
    }
}
