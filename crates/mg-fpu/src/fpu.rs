//! The shared pipelined floating-point unit.
//!
//! One [`Unit`] per operation type; any number of sources queue operands
//! onto them via [`Fpu::queue_operation`] and are writeback targets picked
//! round-robin by [`Fpu::last_source`] whenever more than one unit's head
//! is ready in the same cycle.

use std::fmt;

use mg_core::{commit, CycleNo, Inspect, Phase, Process, RegAddr, RunState, StorageId, Value};

use crate::client::FpuSource;
use crate::op::{evaluate, FpuOperation, Size};
use crate::unit::{FpuResult, Unit};

fn op_index(op: FpuOperation) -> usize {
    match op {
        FpuOperation::Add => 0,
        FpuOperation::Sub => 1,
        FpuOperation::Mul => 2,
        FpuOperation::Div => 3,
        FpuOperation::Sqrt => 4,
    }
}

/// Per-operation pipeline configuration, indexed in `FpuOperation::ALL` order.
#[derive(Debug, Clone, Copy)]
pub struct UnitConfig {
    pub latency: u64,
    pub pipelined: bool,
}

impl UnitConfig {
    #[must_use]
    pub const fn new(latency: u64, pipelined: bool) -> Self {
        Self { latency, pipelined }
    }
}

pub struct Fpu {
    name: String,
    units: [Unit; 5],
    sources: Vec<FpuSource>,
    source_traces: Vec<Vec<StorageId>>,
    last_source: usize,
    queued: u64,
    written_back: u64,
}

impl Fpu {
    #[must_use]
    pub fn new(name: impl Into<String>, config: [UnitConfig; 5]) -> Self {
        Self {
            name: name.into(),
            units: config.map(|c| Unit::new(c.latency, c.pipelined)),
            sources: Vec::new(),
            source_traces: Vec::new(),
            last_source: 0,
            queued: 0,
            written_back: 0,
        }
    }

    /// Registers a writeback target during wiring, returning the dense
    /// source id to pass to [`Fpu::queue_operation`].
    pub fn register_source(&mut self, client: FpuSource, output_trace: Vec<StorageId>) -> usize {
        self.sources.push(client);
        self.source_traces.push(output_trace);
        self.sources.len() - 1
    }

    /// Attempts to admit an operation into the pipeline for `op`. Returns
    /// `false` if that pipeline has no free head slot this cycle.
    pub fn queue_operation(
        &mut self,
        source: usize,
        op: FpuOperation,
        size: Size,
        ra: f64,
        rb: f64,
        dest: RegAddr,
    ) -> bool {
        let value = evaluate(op, size, ra, rb);
        let admitted = self.units[op_index(op)].admit(FpuResult { address: dest, value, source, state: 0 });
        if admitted {
            self.queued += 1;
        }
        admitted
    }

    #[must_use]
    pub fn get_source_trace(&self, source: usize) -> &[StorageId] {
        self.source_traces.get(source).map_or(&[], Vec::as_slice)
    }

    fn ready_units(&self) -> Vec<usize> {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.head_ready())
            .map(|(i, _)| i)
            .collect()
    }

    /// Picks the ready unit whose head's source id comes next after
    /// `last_source` in round-robin order.
    fn pick_winner(&self, ready: &[usize]) -> usize {
        let n = self.sources.len().max(1);
        let start = (self.last_source + 1) % n;
        *ready
            .iter()
            .min_by_key(|&&u| {
                let src = self.units[u].slots.front().expect("ready unit has a head").source;
                (src + n - start) % n
            })
            .expect("ready list is non-empty")
    }
}

impl Process for Fpu {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, _now: CycleNo, phase: Phase) -> RunState {
        let ready = self.ready_units();
        if ready.is_empty() {
            commit(phase, || {
                for unit in &mut self.units {
                    unit.age();
                }
            });
            return RunState::Success;
        }

        let winner = self.pick_winner(&ready);
        let (src, addr, value) = {
            let r = self.units[winner].slots.front().expect("winner has a head");
            (r.source, r.address, r.value)
        };
        let available = (self.sources[src].check_output_availability)(addr);

        commit(phase, || {
            if available && (self.sources[src].write_result)(addr, value) {
                self.units[winner].slots.pop_front();
                self.last_source = src;
                self.written_back += 1;
            } else {
                log::debug!("{}: writeback to source {src} refused this cycle, retrying", self.name);
            }
            for unit in &mut self.units {
                unit.age();
            }
        });
        RunState::Success
    }
}

impl Inspect for Fpu {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "last_source" => Some(Value::U64(self.last_source as u64)),
            "queued" => Some(Value::U64(self.queued)),
            "written_back" => Some(Value::U64(self.written_back)),
            _ => {
                let (op_name, rest) = path.split_once('.')?;
                let op = FpuOperation::ALL.iter().find(|o| o.as_str() == op_name)?;
                match rest {
                    "depth" => Some(Value::U64(self.units[op_index(*op)].slots.len() as u64)),
                    _ => None,
                }
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "last_source",
            "queued",
            "written_back",
            "add.depth",
            "sub.depth",
            "mul.depth",
            "div.depth",
            "sqrt.depth",
        ]
    }

    fn describe(&self) -> String {
        format!(
            "{}: shared FPU, {} sources registered, {} ops queued, {} written back",
            self.name,
            self.sources.len(),
            self.queued,
            self.written_back
        )
    }

    fn dump(&self, out: &mut dyn fmt::Write, _args: &[String]) -> fmt::Result {
        writeln!(out, "unit       latency  pipelined  depth")?;
        for op in FpuOperation::ALL {
            let unit = &self.units[op_index(op)];
            writeln!(
                out,
                "{op:<10} {:<8} {:<10} {}",
                unit.latency,
                unit.pipelined,
                unit.slots.len()
            )?;
        }
        Ok(())
    }
}

