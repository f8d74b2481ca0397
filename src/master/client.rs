use crate::api::{CrossRegionHaType, Peer};

/// Volume policy as the master sees it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeSimpleInfo {
    pub cross_region_ha_type: CrossRegionHaType,
    pub replica_num: u8,
}

/// The master's view of one partition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DataPartitionInfo {
    pub hosts: Vec<String>,
    pub peers: Vec<Peer>,
    /// Node id of the replica being taken offline, 0 if none.
    pub offline_peer_id: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum MasterError {
    #[error("master unavailable: {0}")]
    Unavailable(String),
    #[error("not found on master: {0}")]
    NotFound(String),
}

/// The calls this subsystem makes to the cluster master. The master itself is a separate
/// service; nodes plug in whatever client they use to reach it.
#[async_trait::async_trait]
pub trait MasterClient: Send + Sync {
    async fn get_volume_simple_info(&self, volume_id: &str) -> Result<VolumeSimpleInfo, MasterError>;

    async fn get_data_partition(&self, volume_id: &str, partition_id: u64) -> Result<DataPartitionInfo, MasterError>;
}
