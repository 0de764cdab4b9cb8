//! The kernel's error taxonomy.
//!
//! Each variant corresponds to one of the error kinds named in the design's
//! error-handling section. Configuration and wiring errors are fatal before
//! the first cycle runs; the rest surface from `Kernel::advance`.

use thiserror::Error;

use crate::cycle::CycleNo;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("configuration error at '{path}': {reason}")]
    Configuration { path: String, reason: String },

    #[error("wiring error in process '{process}': {reason}")]
    Wiring { process: String, reason: String },

    #[error("simulation stalled at cycle {cycle}: {processes:?} blocked on {storages:?}")]
    Stall {
        cycle: CycleNo,
        processes: Vec<String>,
        storages: Vec<String>,
    },

    #[error("invariant violated: {detail}")]
    Invariant { detail: String },

    #[error("device I/O error at address {address:#x}: {reason}")]
    DeviceIo { address: u64, reason: String },
}

pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stall_error_names_implicated_processes_and_storages() {
        let err = SimError::Stall {
            cycle: CycleNo::new(3),
            processes: vec!["a".into(), "b".into()],
            storages: vec!["fifo_ab".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains("fifo_ab"));
    }
}
