//! L1 data cache and the ZLCDMA token-coherence directory.

mod addr;
mod dcache;
mod directory;
mod line;
mod message;
mod selector;

pub use addr::{MemAddr, MemSize, MAX_MEMORY_OPERATION_SIZE};
pub use dcache::{DCache, DCacheStats, MemoryRequest, ReadResult, WriteResult};
pub use directory::{BottomPort, DirLine, Directory, TopPort};
pub use line::{Line, LineState, WritebackState};
pub use message::{CacheId, Message, MessageKind};
pub use selector::{BankSelector, DirectBankSelector};
