use crate::api::{Learner, Peer};
use crate::raft::StateMachine;
use bytes::Bytes;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything the consensus engine needs to host one partition's raft group.
#[derive(Clone, Debug)]
pub struct RaftPartitionConfig {
    pub partition_id: u64,
    pub node_id: u64,
    pub wal_path: PathBuf,
    pub peers: Vec<Peer>,
    pub learners: Vec<Learner>,
    /// Log entries up to here are already reflected in the extent store.
    pub applied: u64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfChangeType {
    AddNode,
    RemoveNode,
    UpdateNode,
    AddLearner,
    PromoteLearner,
}

/// A membership change committed through the log. `context` carries the JSON encoded request
/// that produced it.
#[derive(Clone, Debug)]
pub struct ConfChange {
    pub change_type: ConfChangeType,
    pub peer: Peer,
    pub context: Bytes,
}

/// Unrecoverable error raised by the engine for one partition.
#[derive(Debug)]
pub struct FatalError {
    pub partition_id: u64,
    pub err: io::Error,
}

#[derive(Debug, thiserror::Error)]
pub enum RaftError {
    #[error("raft is not started for this partition")]
    NotStarted,
    #[error("not the raft leader")]
    NotLeader,
    #[error("raft partition is stopped")]
    Stopped,
    #[error("raft io error: {0}")]
    Io(#[from] io::Error),
    #[error("raft error: {0}")]
    Other(String),
}

/// The node-wide consensus engine.
pub trait RaftStore: Send + Sync {
    fn create_partition(
        &self,
        config: RaftPartitionConfig,
        state_machine: Arc<dyn StateMachine>,
    ) -> Result<Arc<dyn RaftPartition>, RaftError>;
}

/// Handle to one partition's raft group. Implementations invoke the `StateMachine` they were
/// created with; they never call back into it while holding a lock `submit` waits on.
#[async_trait::async_trait]
pub trait RaftPartition: Send + Sync {
    /// Propose `command`; resolves with its log index once committed and applied.
    async fn submit(&self, command: Bytes) -> Result<u64, RaftError>;

    async fn change_member(&self, change: ConfChange) -> Result<(), RaftError>;

    async fn reset_member(&self, peers: Vec<Peer>, context: Bytes) -> Result<(), RaftError>;

    fn try_to_leader(&self) -> Result<(), RaftError>;

    /// Returns `(leader node id, term)`. Leader id is 0 when unknown.
    fn leader_term(&self) -> (u64, u64);

    fn committed_index(&self) -> u64;

    fn flush_wal(&self) -> Result<(), RaftError>;

    /// Discard log entries up to and including `index`.
    fn truncate(&self, index: u64);

    fn stop(&self);

    /// Stop and remove the raft log permanently.
    fn delete(&self) -> Result<(), RaftError>;

    /// Stop and leave the raft log in place for later reclamation.
    fn expire(&self) -> Result<(), RaftError>;
}
