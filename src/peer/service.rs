use crate::partition::{DataPartition, Disk};
use crate::peer::{PeerError, RemoteExtents, TinyDeleteBatch};
use crate::repair::RepairTask;
use crate::storage::ExtentType;
use bytes::Bytes;
use std::sync::Arc;

/// Upper bound on one tiny delete record batch, regardless of what the caller asks for.
/// A whole number of records.
pub const MAX_TINY_DELETE_BATCH_SIZE: u64 = 2_400_000;

/// RepairService answers repair RPCs from the partitions hosted on this node's disks. It is
/// transport agnostic: `RepairServer` exposes it over gRPC and `LocalPeerClient` calls it
/// in-process.
#[derive(Clone)]
pub struct RepairService {
    logger: slog::Logger,
    disks: Arc<Vec<Arc<Disk>>>,
}

impl RepairService {
    pub fn new(logger: slog::Logger, disks: Vec<Arc<Disk>>) -> Self {
        RepairService {
            logger,
            disks: Arc::new(disks),
        }
    }

    fn partition(&self, partition_id: u64) -> Result<Arc<DataPartition>, PeerError> {
        self.disks
            .iter()
            .find_map(|disk| disk.partition(partition_id))
            .ok_or(PeerError::PartitionNotFound(partition_id))
    }

    pub fn get_extents_info(&self, partition_id: u64, extent_type: ExtentType) -> Result<RemoteExtents, PeerError> {
        let dp = self.partition(partition_id)?;
        Ok(dp.extents_info(extent_type))
    }

    pub fn read_extent(
        &self,
        partition_id: u64,
        extent_id: u64,
        offset: u64,
        size: u64,
    ) -> Result<(Bytes, u32), PeerError> {
        let dp = self.partition(partition_id)?;
        dp.extent_store()
            .read(extent_id, offset, size)
            .map_err(|e| PeerError::Storage(e.to_string()))
    }

    /// Starts the repair in the background and returns immediately.
    pub fn notify_repair(&self, task: RepairTask) -> Result<(), PeerError> {
        let dp = self.partition(task.partition_id)?;
        slog::info!(
            self.logger,
            "Partition {} received repair task from {}: {} to create, {} to repair",
            task.partition_id,
            task.leader_addr,
            task.extents_to_be_created.len(),
            task.extents_to_be_repaired.len()
        );
        tokio::spawn(async move {
            dp.repair_on_follower(task).await;
        });
        Ok(())
    }

    pub fn read_tiny_delete_records(
        &self,
        partition_id: u64,
        offset: u64,
        max_size: u64,
    ) -> Result<TinyDeleteBatch, PeerError> {
        let dp = self.partition(partition_id)?;
        let data = dp
            .extent_store()
            .read_tiny_delete_records(offset, max_size.min(MAX_TINY_DELETE_BATCH_SIZE))
            .map_err(|e| PeerError::Storage(e.to_string()))?;
        let crc = crc32fast::hash(&data);
        Ok(TinyDeleteBatch { data, crc })
    }
}
