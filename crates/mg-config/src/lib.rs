//! Configuration store, CLI surface, and the sampling/monitor protocol
//! that feeds an offline trace file while the simulation runs.

mod cli;
mod sampling;
mod store;

pub use cli::Cli;
pub use sampling::{Monitor, SampleRegistry, Sampler, TypeTag};
pub use store::{ConfigError, ConfigStore};
