use crate::repair::RepairTask;
use crate::storage::{ExtentInfo, ExtentType};
use bytes::Bytes;

/// One replica's extents of a given class, plus its tiny delete record log length.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RemoteExtents {
    pub extents: Vec<ExtentInfo>,
    pub tiny_delete_record_size: u64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TinyDeleteBatch {
    pub data: Bytes,
    /// CRC32 of `data`, computed by the sender.
    pub crc: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("invalid peer address '{0}'")]
    InvalidAddr(String),
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: tonic::transport::Error,
    },
    #[error("rpc to {addr} failed: {status}")]
    Rpc { addr: String, status: tonic::Status },
    #[error("peer {0} is not reachable")]
    Unreachable(String),
    #[error("partition {0} is not hosted by the peer")]
    PartitionNotFound(u64),
    #[error("peer storage error: {0}")]
    Storage(String),
}

impl PeerError {
    /// Transport failures are worth retrying; answers from a healthy peer are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            PeerError::Connect { .. } | PeerError::Unreachable(_) => true,
            PeerError::Rpc { status, .. } => matches!(
                status.code(),
                tonic::Code::Unavailable | tonic::Code::DeadlineExceeded | tonic::Code::Unknown
            ),
            PeerError::InvalidAddr(_) | PeerError::PartitionNotFound(_) | PeerError::Storage(_) => false,
        }
    }
}

/// Calls this node makes to other replicas of a partition. Addresses are `ip:port`.
#[async_trait::async_trait]
pub trait PeerClient: Send + Sync {
    async fn get_extents_info(
        &self,
        addr: &str,
        partition_id: u64,
        extent_type: ExtentType,
    ) -> Result<RemoteExtents, PeerError>;

    /// Returns the bytes at `[offset, offset+size)` and their CRC32.
    async fn read_extent(
        &self,
        addr: &str,
        partition_id: u64,
        extent_id: u64,
        offset: u64,
        size: u64,
    ) -> Result<(Bytes, u32), PeerError>;

    /// Hand a repair task to a follower. The follower runs it in the background.
    async fn notify_repair(&self, addr: &str, task: RepairTask) -> Result<(), PeerError>;

    async fn read_tiny_delete_records(
        &self,
        addr: &str,
        partition_id: u64,
        offset: u64,
        max_size: u64,
    ) -> Result<TinyDeleteBatch, PeerError>;
}
