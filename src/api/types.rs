use serde::{Deserialize, Serialize};

/// A voting member of a partition's raft group.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub id: u64,
    pub addr: String,
}

impl Peer {
    pub fn new<S: Into<String>>(id: u64, addr: S) -> Self {
        Peer { id, addr: addr.into() }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PromoteConfig {
    pub auto_promote: bool,
    pub promote_threshold: u8,
}

/// A non-voting member that can later be promoted to a voting peer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Learner {
    pub id: u64,
    pub addr: String,
    #[serde(default)]
    pub promote_config: PromoteConfig,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CreateType {
    Normal,
    /// Created on a new node to replace a decommissioned replica. The replica repairs itself
    /// from the leader before joining raft.
    DecommissionedRecovering,
}

impl Default for CreateType {
    fn default() -> Self {
        CreateType::Normal
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ConsistencyMode {
    Standard,
    Strict,
}

impl Default for ConsistencyMode {
    fn default() -> Self {
        ConsistencyMode::Standard
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CrossRegionHaType {
    Default,
    Quorum,
}

impl Default for CrossRegionHaType {
    fn default() -> Self {
        CrossRegionHaType::Default
    }
}

/// Serving status. Ordered from least to most healthy so the effective status of a partition
/// is `min(partition, disk)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum PartitionStatus {
    Unavailable,
    ReadOnly,
    ReadWrite,
}

/// Request from the master to create a new partition replica on this node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatePartitionRequest {
    pub volume_id: String,
    pub partition_id: u64,
    pub partition_size: u64,
    pub replica_num: u8,
    pub hosts: Vec<String>,
    pub members: Vec<Peer>,
    #[serde(default)]
    pub learners: Vec<Learner>,
    #[serde(default)]
    pub create_type: CreateType,
    #[serde(default)]
    pub ha_type: CrossRegionHaType,
    #[serde(default)]
    pub consistency_mode: ConsistencyMode,
}

/// Hosts are `ip:port`. Returns the trimmed ip part, or None if `addr` is not in that form.
pub(crate) fn host_ip(addr: &str) -> Option<&str> {
    let mut parts = addr.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(ip), Some(_), None) => Some(ip.trim()),
        _ => None,
    }
}
