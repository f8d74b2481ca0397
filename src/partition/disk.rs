use crate::api::{CreatePartitionRequest, PartitionStatus};
use crate::node::NodeContext;
use crate::partition::metadata::parse_partition_dir_name;
use crate::partition::{DataPartition, PartitionError};
use crate::repair::TinyDeleteGate;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::Semaphore;

/// Disk owns the partitions stored under one data directory, and the resources they share:
/// one tiny delete record sync at a time, and a bounded number of concurrent extent repairs.
pub struct Disk {
    logger: slog::Logger,
    path: PathBuf,
    status: Mutex<PartitionStatus>,
    partitions: RwLock<HashMap<u64, Arc<DataPartition>>>,
    tiny_delete_gate: Arc<TinyDeleteGate>,
    repair_permits: Arc<Semaphore>,
    allocated: AtomicU64,
}

impl Disk {
    pub fn new(logger: &slog::Logger, path: impl Into<PathBuf>, repair_permits: usize) -> Self {
        let path = path.into();
        Disk {
            logger: logger.new(slog::o!("Disk" => path.display().to_string())),
            path,
            status: Mutex::new(PartitionStatus::ReadWrite),
            partitions: RwLock::new(HashMap::new()),
            tiny_delete_gate: Arc::new(TinyDeleteGate::new()),
            repair_permits: Arc::new(Semaphore::new(repair_permits)),
            allocated: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> PartitionStatus {
        *self.status.lock().expect("Disk.status mutex poisoned")
    }

    pub fn set_status(&self, status: PartitionStatus) {
        let mut current = self.status.lock().expect("Disk.status mutex poisoned");
        if *current != status {
            slog::warn!(self.logger, "Disk status {:?} -> {:?}", *current, status);
            *current = status;
        }
    }

    pub fn partition(&self, partition_id: u64) -> Option<Arc<DataPartition>> {
        self.partitions
            .read()
            .expect("Disk.partitions lock poisoned")
            .get(&partition_id)
            .cloned()
    }

    /// Attached partitions, by id.
    pub fn partitions(&self) -> Vec<Arc<DataPartition>> {
        let mut partitions: Vec<_> = self
            .partitions
            .read()
            .expect("Disk.partitions lock poisoned")
            .values()
            .cloned()
            .collect();
        partitions.sort_by_key(|dp| dp.partition_id());
        partitions
    }

    /// Bytes reserved by attached partitions.
    pub fn allocated_size(&self) -> u64 {
        self.allocated.load(Ordering::Acquire)
    }

    pub(crate) fn attach(&self, dp: Arc<DataPartition>) {
        let size = dp.size();
        let previous = self
            .partitions
            .write()
            .expect("Disk.partitions lock poisoned")
            .insert(dp.partition_id(), dp);
        if previous.is_none() {
            self.allocated.fetch_add(size, Ordering::AcqRel);
        }
    }

    pub(crate) fn detach(&self, partition_id: u64) -> Option<Arc<DataPartition>> {
        let removed = self
            .partitions
            .write()
            .expect("Disk.partitions lock poisoned")
            .remove(&partition_id);
        if let Some(dp) = &removed {
            self.allocated.fetch_sub(dp.size(), Ordering::AcqRel);
            slog::info!(self.logger, "Detached partition {}", partition_id);
        }
        removed
    }

    pub(crate) fn tiny_delete_gate(&self) -> &Arc<TinyDeleteGate> {
        &self.tiny_delete_gate
    }

    pub(crate) fn repair_permits(&self) -> &Arc<Semaphore> {
        &self.repair_permits
    }

    /// Create the partition a master request describes. A repeated request for an existing
    /// partition succeeds if it describes the same layout.
    pub fn create_partition(
        self: &Arc<Self>,
        ctx: &Arc<NodeContext>,
        request: &CreatePartitionRequest,
    ) -> Result<Arc<DataPartition>, PartitionError> {
        if let Some(existing) = self.partition(request.partition_id) {
            existing.is_equal_create_request(request)?;
            return Ok(existing);
        }
        DataPartition::create(ctx.clone(), self, request)
    }

    /// Load every partition directory on this disk. A partition that fails to load is logged
    /// and left out; it is not brought up.
    pub fn restore_partitions(
        self: &Arc<Self>,
        ctx: &Arc<NodeContext>,
        latest_flush_time: i64,
    ) -> io::Result<Vec<Arc<DataPartition>>> {
        let mut loaded = Vec::new();
        let mut entries: Vec<_> = fs::read_dir(&self.path)?.collect::<Result<_, _>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !entry.file_type()?.is_dir() || parse_partition_dir_name(&name).is_none() {
                continue;
            }
            match DataPartition::load(ctx.clone(), self, &entry.path(), latest_flush_time) {
                Ok(dp) => loaded.push(dp),
                Err(e) => slog::error!(self.logger, "Failed to load partition from {}: {}", name, e),
            }
        }
        slog::info!(self.logger, "Restored {} partitions", loaded.len());
        Ok(loaded)
    }
}
