//! Memory-mapped devices: the performance-counter block, the symbol table
//! loaded alongside a program image, and the boot ROM.

mod perfcounters;
mod rom;
mod symtable;

pub use perfcounters::PerfCounters;
pub use rom::Rom;
pub use symtable::{Symbol, SymbolTable};
