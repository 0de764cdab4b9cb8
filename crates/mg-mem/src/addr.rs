//! Address and size types shared by the cache and the directory.

pub type MemAddr = u64;
pub type MemSize = u32;

/// Maximum payload handled by any single memory operation (one cache line
/// worth of bytes, bounded to keep request buffers of fixed element size).
pub const MAX_MEMORY_OPERATION_SIZE: usize = 64;
