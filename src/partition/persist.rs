use crate::partition::metadata::{write_apply_file, PartitionMetadata, CREATE_TIME_FORMAT};
use crate::partition::partition::Persisted;
use crate::partition::{DataPartition, PartitionError};
use crate::raft::ApplyStatus;
use std::sync::atomic::Ordering;

impl DataPartition {
    /// Make the partition durable up to `status` (the tracker's current status if None).
    ///
    /// Order matters: extent data and the raft WAL are flushed before the applied index that
    /// depends on them is written, and the raft log is only truncated once `META` records the
    /// truncate index. Concurrent calls are serialized.
    pub(crate) fn persist(&self, status: Option<ApplyStatus>) -> Result<(), PartitionError> {
        let mut persisted = self
            .persisted
            .lock()
            .expect("DataPartition.persisted mutex poisoned");
        let status = status.unwrap_or_else(|| self.apply_tracker.snap());
        let stopped = self.is_stopped();

        if !stopped {
            self.store.flush()?;
            if let Some(raft) = self.raft() {
                raft.flush_wal()?;
            }
        }

        self.persist_applied(&mut persisted, &status)?;
        self.persist_metadata(&mut persisted, Some(&status))?;

        if !stopped && status.last_truncate > 0 {
            if let Some(raft) = self.raft() {
                raft.truncate(status.last_truncate);
            }
        }
        Ok(())
    }

    /// Write `META` alone. Used when only the layout or a flag changed.
    pub(crate) fn persist_metadata_only(&self) -> Result<(), PartitionError> {
        let mut persisted = self
            .persisted
            .lock()
            .expect("DataPartition.persisted mutex poisoned");
        self.persist_metadata(&mut persisted, None)
    }

    fn persist_applied(&self, persisted: &mut Persisted, status: &ApplyStatus) -> Result<(), PartitionError> {
        if status.applied == 0 || status.applied <= persisted.applied {
            return Ok(());
        }
        write_apply_file(&self.path, status.applied, status.last_truncate)?;
        slog::debug!(
            self.logger,
            "Persisted applied {} (was {}), last truncate {}",
            status.applied,
            persisted.applied,
            status.last_truncate
        );
        persisted.applied = status.applied;
        Ok(())
    }

    fn persist_metadata(&self, persisted: &mut Persisted, status: Option<&ApplyStatus>) -> Result<(), PartitionError> {
        let previous = persisted.metadata.as_ref();
        let metadata = self.current_metadata(previous, status);
        if previous == Some(&metadata) {
            return Ok(());
        }

        metadata.write_to(&self.path)?;
        slog::info!(
            self.logger,
            "Persisted metadata: peers {:?}, hosts {:?}, last truncate {}",
            metadata.peers,
            metadata.hosts,
            metadata.last_truncate_id
        );
        persisted.metadata = Some(metadata);
        Ok(())
    }

    /// The `META` contents for the partition as it is now. The creation time of an earlier
    /// copy is kept, and the truncate index never moves backwards.
    fn current_metadata(&self, previous: Option<&PartitionMetadata>, status: Option<&ApplyStatus>) -> PartitionMetadata {
        let config = self.config.read().expect("DataPartition.config lock poisoned");
        let mut peers = config.peers.clone();
        peers.sort_by_key(|peer| peer.id);

        let create_time = previous
            .map(|meta| meta.create_time.clone())
            .filter(|time| !time.is_empty())
            .unwrap_or_else(|| chrono::Local::now().format(CREATE_TIME_FORMAT).to_string());
        let previous_truncate = previous.map(|meta| meta.last_truncate_id).unwrap_or(0);
        let last_truncate_id = status
            .map(|s| s.last_truncate)
            .unwrap_or(0)
            .max(previous_truncate);

        PartitionMetadata {
            volume_id: config.volume_id.clone(),
            partition_id: self.partition_id,
            partition_size: config.partition_size,
            create_time,
            peers,
            hosts: config.hosts.clone(),
            learners: config.learners.clone(),
            replica_num: config.replica_num,
            create_type: config.create_type,
            last_truncate_id,
            ha_type: config.ha_type,
            consistency_mode: config.consistency_mode,
            is_catch_up: self.is_catch_up.load(Ordering::Acquire),
            need_server_fault_check: self.need_server_fault_check.load(Ordering::Acquire),
        }
    }
}
