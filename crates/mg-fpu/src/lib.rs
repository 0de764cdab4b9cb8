//! Shared pipelined floating-point unit.
//!
//! One pipeline per operation type; any number of register-file sources
//! queue operands onto it and race for writeback, arbitrated round-robin
//! whenever more than one pipeline's head is ready in the same cycle.

mod client;
mod fpu;
mod op;
mod unit;

pub use client::FpuSource;
pub use fpu::{Fpu, UnitConfig};
pub use op::{evaluate, FpuOperation, Size};
pub use unit::{FpuResult, Unit};
