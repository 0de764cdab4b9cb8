//! Discrete-event kernel: clock, two-phase processes, sensitised storages,
//! the static object tree and the inspection surface they all share.
//!
//! Every component wires its processes and storages once, during startup;
//! from then on the [`Kernel`] decides what runs each cycle purely from
//! which storages changed last cycle. No component ever calls another
//! component's methods outside of a storage read/write.

mod clock;
mod cycle;
mod error;
mod kernel;
mod object;
mod observable;
mod process;
mod regaddr;
mod storage;

pub use clock::{gcd, lcm, lockstep_period, Clock};
pub use cycle::CycleNo;
pub use error::{SimError, SimResult};
pub use kernel::{CycleReport, Kernel};
pub use object::Object;
pub use observable::{Inspect, Value};
pub use process::{commit, Phase, Process, ProcessId, RunState, StorageId};
pub use regaddr::{RegAddr, RegClass};
pub use storage::{ArbitratedService, BoundedBuffer, RegState, RegisterCell};
