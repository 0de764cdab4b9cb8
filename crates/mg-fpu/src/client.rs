//! The FPU's view of a writeback target.
//!
//! A source doesn't implement a trait the FPU downcasts to; it hands the
//! FPU a capability record at registration time — a name plus the two
//! functions the FPU ever calls. This keeps the FPU decoupled from
//! whatever owns the register file on the other end.

use mg_core::RegAddr;

/// The two operations the FPU needs from whatever queued an operation on
/// its behalf, bundled at [`crate::Fpu::register_source`] time.
pub struct FpuSource {
    pub(crate) name: String,
    pub(crate) check_output_availability: Box<dyn FnMut(RegAddr) -> bool>,
    pub(crate) write_result: Box<dyn FnMut(RegAddr, f64) -> bool>,
}

impl FpuSource {
    pub fn new(
        name: impl Into<String>,
        check_output_availability: impl FnMut(RegAddr) -> bool + 'static,
        write_result: impl FnMut(RegAddr, f64) -> bool + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            check_output_availability: Box::new(check_output_availability),
            write_result: Box::new(write_result),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}
