//! Ring messages carried between directories.

use crate::addr::MemAddr;

pub type CacheId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Read,
    AcquireTokens,
    Eviction,
    LocalDirNotification,
}

/// A coherence message in flight on one of the two rings.
///
/// `ignore` is set when a top-ring message is diverted to the bottom ring
/// after failing to find shortcut space: the hop that re-sends it must not
/// re-run the top-ring accounting a second time. It is never meaningful
/// once a message leaves a directory's hands.
#[derive(Debug, Clone)]
pub struct Message {
    pub kind: MessageKind,
    pub address: MemAddr,
    pub tokens: u32,
    pub transient: bool,
    pub source: CacheId,
    pub ignore: bool,
}

impl Message {
    #[must_use]
    pub fn new(kind: MessageKind, address: MemAddr, tokens: u32, transient: bool, source: CacheId) -> Self {
        Self { kind, address, tokens, transient, source, ignore: false }
    }
}
