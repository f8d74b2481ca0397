use crate::master::MasterError;
use crate::raft::RaftError;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("metadata is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid partition metadata: {0}")]
    InvalidMetadata(String),
    #[error("illegal apply state: applied {applied}, last truncate {last_truncate}")]
    IllegalApplyState { applied: u64, last_truncate: u64 },
    #[error(transparent)]
    Raft(#[from] RaftError),
    #[error(transparent)]
    Master(#[from] MasterError),
    #[error("partition {0} already exists with a different layout: {1}")]
    CreateMismatch(u64, String),
    #[error("partition is stopped")]
    Stopped,
    #[error("disk has been removed")]
    DiskGone,
}
