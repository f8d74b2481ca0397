use crate::api::Peer;
use crate::partition::PartitionError;
use crate::raft::{ConfChange, FatalError, WriteOpDecodeError};
use bytes::Bytes;
use std::io;

/// StateMachine is what the consensus engine drives for one partition. Callbacks for different
/// indices may run concurrently with each other and with the partition's scheduler, so every
/// method takes `&self`.
///
/// An `Err` from `apply` or `apply_member_change` means the partition has already been stopped
/// and detached. The engine must not apply any later index for it.
pub trait StateMachine: Send + Sync {
    fn apply(&self, command: &[u8], index: u64) -> Result<(), ApplyError>;

    fn apply_member_change(&self, change: &ConfChange, index: u64) -> Result<(), ApplyError>;

    /// Every replica already holds a full copy of the extent data, so a snapshot carries no
    /// payload. It only marks the log prefix the receiving peer may skip.
    fn snapshot(&self, recover_node: u64) -> SnapshotIterator;

    fn apply_snapshot(
        &self,
        peers: &[Peer],
        iterator: &mut dyn Iterator<Item = io::Result<Bytes>>,
    ) -> Result<(), ApplyError>;

    fn handle_fatal_event(&self, err: &FatalError);

    fn handle_leader_change(&self, leader: u64);

    /// Build the payload that restores the bytes an abandoned write would have overwritten.
    fn ask_rollback(&self, original: &[u8]) -> Result<Bytes, ApplyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("undecodable write payload: {0}")]
    Decode(#[from] WriteOpDecodeError),
    #[error("write payload CRC mismatch for extent {extent_id} at offset {offset}")]
    CrcMismatch { extent_id: u64, offset: u64 },
    #[error("extent store error: {0}")]
    Store(#[from] io::Error),
    #[error("undecodable member change context: {0}")]
    MemberChangeContext(#[from] serde_json::Error),
    #[error("persist failed: {0}")]
    Persist(#[from] PartitionError),
    #[error("illegal snapshot: replica has already caught up")]
    IllegalSnapshot,
    #[error("partition is stopped")]
    Stopped,
}

/// A payload-free snapshot. `index()` is the staged truncation index of the producing replica.
#[derive(Debug)]
pub struct SnapshotIterator {
    index: u64,
}

impl SnapshotIterator {
    pub fn new(index: u64) -> Self {
        SnapshotIterator { index }
    }

    pub fn index(&self) -> u64 {
        self.index
    }
}

impl Iterator for SnapshotIterator {
    type Item = io::Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        None
    }
}
