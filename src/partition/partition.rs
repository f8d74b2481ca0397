use crate::api::{
    host_ip, ConsistencyMode, CreatePartitionRequest, CreateType, CrossRegionHaType, Learner, PartitionStatus, Peer,
};
use crate::issue::{scan_issue_fragments, IssueTracker};
use crate::node::NodeContext;
use crate::partition::holder::InFlightHolder;
use crate::partition::metadata::{expired_dir_name, partition_dir_name, read_apply_file, PartitionMetadata};
use crate::partition::{Disk, PartitionError, PartitionStateMachine};
use crate::peer::RemoteExtents;
use crate::raft::{
    ApplyStatus, ApplyTracker, RaftError, RaftPartition, RaftPartitionConfig, RandomWriteOp, OP_RANDOM_WRITE,
    OP_SYNC_RANDOM_WRITE,
};
use crate::repair::TinyDeleteSyncState;
use crate::shutdown::{shutdown_signal, ShutdownHandle, ShutdownSignal};
use crate::storage::{extents_of_type, ExtentId, ExtentStore, ExtentType, MAX_EXTENT_COUNT};
use bytes::Bytes;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Instant;
use tokio::sync::mpsc;

/// Replicated layout of a partition. Persisted in `META`.
#[derive(Clone, Debug)]
pub(crate) struct PartitionConfig {
    pub volume_id: String,
    pub partition_size: u64,
    pub replica_num: u8,
    pub peers: Vec<Peer>,
    pub hosts: Vec<String>,
    pub learners: Vec<Learner>,
    pub create_type: CreateType,
    pub ha_type: CrossRegionHaType,
    pub consistency_mode: ConsistencyMode,
}

/// The host list this replica currently acts on, as last refreshed from the master.
pub(crate) struct ReplicaView {
    pub hosts: Vec<String>,
    pub is_leader: bool,
    pub refreshed_at: Option<Instant>,
}

struct Usage {
    status: PartitionStatus,
    used: u64,
    refreshed_at: Option<Instant>,
}

/// What is on disk right now. Holding the lock serializes persists.
pub(crate) struct Persisted {
    pub metadata: Option<PartitionMetadata>,
    pub applied: u64,
}

pub(crate) struct SchedulerInputs {
    pub repair_rx: mpsc::Receiver<()>,
    pub volume_info_rx: mpsc::Receiver<()>,
    pub stop: ShutdownSignal,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Lifecycle {
    Active,
    Stopped,
    Deleted,
    Expired,
}

/// DataPartition is one replica of a raft-replicated shard of extent data.
///
/// It is created fresh from a master request or loaded from its directory, then started. From
/// then on the consensus engine drives it through `PartitionStateMachine` while its scheduler
/// repairs, validates and persists it in the background. `stop()` ends both.
pub struct DataPartition {
    pub(crate) logger: slog::Logger,
    pub(crate) partition_id: u64,
    pub(crate) path: PathBuf,
    pub(crate) ctx: Arc<NodeContext>,
    pub(crate) disk: Weak<Disk>,
    pub(crate) store: Arc<dyn ExtentStore>,
    pub(crate) config: RwLock<PartitionConfig>,
    pub(crate) replicas: RwLock<ReplicaView>,
    pub(crate) apply_tracker: ApplyTracker,
    pub(crate) is_catch_up: AtomicBool,
    pub(crate) need_server_fault_check: AtomicBool,
    pub(crate) is_raft_leader: AtomicBool,
    usage: Mutex<Usage>,
    pub(crate) raft: RwLock<Option<Arc<dyn RaftPartition>>>,
    pub(crate) issues: Arc<IssueTracker>,
    pub(crate) in_flight: InFlightHolder,
    pub(crate) persisted: Mutex<Persisted>,
    lifecycle: Mutex<Lifecycle>,
    torn_down: Mutex<bool>,
    repair_tx: mpsc::Sender<()>,
    volume_info_tx: mpsc::Sender<()>,
    scheduler_inputs: Mutex<Option<SchedulerInputs>>,
    stop_handle: Mutex<Option<ShutdownHandle>>,
    pub(crate) tiny_sync_state: Arc<Mutex<TinyDeleteSyncState>>,
}

impl DataPartition {
    fn assemble(
        ctx: Arc<NodeContext>,
        disk: &Arc<Disk>,
        path: PathBuf,
        partition_id: u64,
        config: PartitionConfig,
        store: Arc<dyn ExtentStore>,
        issues: IssueTracker,
    ) -> Self {
        let logger = ctx.logger().new(slog::o!("PartitionId" => partition_id));
        let (repair_tx, repair_rx) = mpsc::channel(1);
        let (volume_info_tx, volume_info_rx) = mpsc::channel(1);
        let (stop_handle, stop) = shutdown_signal();
        let replicas = ReplicaView {
            is_leader: is_host_leader(&config.hosts, ctx.local_ip()),
            hosts: config.hosts.clone(),
            refreshed_at: None,
        };
        let now = chrono::Utc::now().timestamp();

        DataPartition {
            logger,
            partition_id,
            path,
            disk: Arc::downgrade(disk),
            store,
            config: RwLock::new(config),
            replicas: RwLock::new(replicas),
            apply_tracker: ApplyTracker::new(),
            is_catch_up: AtomicBool::new(false),
            need_server_fault_check: AtomicBool::new(false),
            is_raft_leader: AtomicBool::new(false),
            usage: Mutex::new(Usage {
                status: PartitionStatus::ReadWrite,
                used: 0,
                refreshed_at: None,
            }),
            raft: RwLock::new(None),
            issues: Arc::new(issues),
            in_flight: InFlightHolder::new(),
            persisted: Mutex::new(Persisted {
                metadata: None,
                applied: 0,
            }),
            lifecycle: Mutex::new(Lifecycle::Active),
            torn_down: Mutex::new(false),
            repair_tx,
            volume_info_tx,
            scheduler_inputs: Mutex::new(Some(SchedulerInputs {
                repair_rx,
                volume_info_rx,
                stop,
            })),
            stop_handle: Mutex::new(Some(stop_handle)),
            tiny_sync_state: Arc::new(Mutex::new(TinyDeleteSyncState::new(now))),
            ctx,
        }
    }

    /// Create a brand new replica on `disk`. A fresh partition has nothing to distrust, so its
    /// issue tracker starts empty.
    pub fn create(
        ctx: Arc<NodeContext>,
        disk: &Arc<Disk>,
        request: &CreatePartitionRequest,
    ) -> Result<Arc<Self>, PartitionError> {
        let path = disk
            .path()
            .join(partition_dir_name(request.partition_id, request.partition_size));
        fs::create_dir_all(&path)?;

        let store = ctx.store_factory.open(&path, request.partition_id, true)?;
        store.load()?;

        let config = PartitionConfig {
            volume_id: request.volume_id.clone(),
            partition_size: request.partition_size,
            replica_num: request.replica_num,
            peers: request.members.clone(),
            hosts: request.hosts.clone(),
            learners: request.learners.clone(),
            create_type: request.create_type,
            ha_type: request.ha_type,
            consistency_mode: request.consistency_mode,
        };
        let issues = IssueTracker::new(ctx.logger().clone(), vec![]);
        let dp = Arc::new(Self::assemble(
            ctx,
            disk,
            path,
            request.partition_id,
            config,
            store,
            issues,
        ));

        dp.persist_metadata_only()?;
        disk.attach(dp.clone());
        slog::info!(dp.logger, "Created partition at {}", dp.path.display());
        Ok(dp)
    }

    /// Load a replica from its directory. `latest_flush_time` is the last time (unix seconds)
    /// the node confirmed a flush; it bounds the post-crash scan.
    pub fn load(
        ctx: Arc<NodeContext>,
        disk: &Arc<Disk>,
        path: &Path,
        latest_flush_time: i64,
    ) -> Result<Arc<Self>, PartitionError> {
        let mut meta = PartitionMetadata::read_from(path)?;
        meta.validate()?;

        let store = ctx.store_factory.open(path, meta.partition_id, false)?;
        store.load()?;
        let (applied, last_truncate) = read_apply_file(path, meta.last_truncate_id)?;

        let fragments = if meta.need_server_fault_check {
            scan_issue_fragments(store.as_ref(), latest_flush_time)?
        } else {
            Vec::new()
        };
        let logger = ctx.logger().new(slog::o!("PartitionId" => meta.partition_id));
        let issues = IssueTracker::new(logger, fragments);

        let config = PartitionConfig {
            volume_id: meta.volume_id.clone(),
            partition_size: meta.partition_size,
            replica_num: meta.replica_num,
            peers: meta.peers.clone(),
            hosts: meta.hosts.clone(),
            learners: meta.learners.clone(),
            create_type: meta.create_type,
            ha_type: meta.ha_type,
            consistency_mode: meta.consistency_mode,
        };
        let dp = Self::assemble(
            ctx,
            disk,
            path.to_path_buf(),
            meta.partition_id,
            config,
            store,
            issues,
        );

        if !dp.apply_tracker.init(applied, last_truncate) {
            return Err(PartitionError::IllegalApplyState {
                applied,
                last_truncate,
            });
        }
        dp.is_catch_up.store(meta.is_catch_up, Ordering::Release);
        dp.need_server_fault_check
            .store(meta.need_server_fault_check, Ordering::Release);

        let volume_info_stale = (meta.hosts.len() > 3 && meta.ha_type == CrossRegionHaType::Default)
            || (meta.hosts.len() <= 3 && meta.ha_type == CrossRegionHaType::Quorum)
            || meta.replica_num == 0
            || meta.hosts.len() != meta.replica_num as usize;

        {
            let mut persisted = dp.persisted.lock().expect("DataPartition.persisted mutex poisoned");
            persisted.applied = applied;
            persisted.metadata = Some(meta);
        }

        let dp = Arc::new(dp);
        disk.attach(dp.clone());
        if volume_info_stale {
            dp.propose_update_volume_info();
        }

        slog::info!(
            dp.logger,
            "Loaded partition: applied {}, last truncate {}, catch up {}, {} unverified extents",
            applied,
            last_truncate,
            dp.is_catch_up(),
            dp.issues.fragments().len()
        );
        Ok(dp)
    }

    /// Verify that a repeated create request describes this partition.
    pub fn is_equal_create_request(&self, request: &CreatePartitionRequest) -> Result<(), PartitionError> {
        let config = self.config.read().expect("DataPartition.config lock poisoned");
        let mismatch = |what: String| Err(PartitionError::CreateMismatch(self.partition_id, what));

        if config.peers != request.members {
            return mismatch(format!("peers {:?}, requested {:?}", config.peers, request.members));
        }
        if !request.hosts.starts_with(&config.hosts) {
            return mismatch(format!("hosts {:?}, requested {:?}", config.hosts, request.hosts));
        }
        let learners_match = config.learners.len() <= request.learners.len()
            && config
                .learners
                .iter()
                .zip(request.learners.iter())
                .all(|(a, b)| a.id == b.id && a.addr == b.addr);
        if !learners_match {
            return mismatch(format!("learners {:?}, requested {:?}", config.learners, request.learners));
        }
        if config.volume_id != request.volume_id {
            return mismatch(format!("volume {}, requested {}", config.volume_id, request.volume_id));
        }
        Ok(())
    }

    /// Start the scheduler, and raft. A replica created to replace a decommissioned one first
    /// repairs itself from the leader and only then joins raft.
    pub fn start(self: &Arc<Self>) -> Result<(), PartitionError> {
        let inputs = self
            .scheduler_inputs
            .lock()
            .expect("DataPartition.scheduler_inputs mutex poisoned")
            .take();
        let inputs = match inputs {
            Some(inputs) => inputs,
            None => {
                slog::warn!(self.logger, "Partition already started");
                return Ok(());
            }
        };
        if self.is_stopped() {
            return Err(PartitionError::Stopped);
        }

        tokio::spawn(self.clone().run_scheduler(inputs));

        if self.create_type() == CreateType::DecommissionedRecovering {
            tokio::spawn(self.clone().recover_then_join());
            return Ok(());
        }
        self.start_raft()
    }

    pub(crate) fn start_raft(self: &Arc<Self>) -> Result<(), PartitionError> {
        let (peers, learners) = {
            let config = self.config.read().expect("DataPartition.config lock poisoned");
            (config.peers.clone(), config.learners.clone())
        };
        let raft_config = RaftPartitionConfig {
            partition_id: self.partition_id,
            node_id: self.ctx.node_id(),
            wal_path: self.path.join(format!("wal_{}", self.partition_id)),
            peers,
            learners,
            applied: self.apply_tracker.applied(),
        };

        let state_machine = Arc::new(PartitionStateMachine::new(Arc::downgrade(self)));
        let raft = self.ctx.raft_store.create_partition(raft_config, state_machine)?;
        *self.raft.write().expect("DataPartition.raft lock poisoned") = Some(raft);
        slog::info!(self.logger, "Raft started at applied {}", self.apply_tracker.applied());
        Ok(())
    }

    pub(crate) fn stop_raft(&self) {
        if let Some(raft) = self.raft() {
            raft.stop();
        }
    }

    /// Stop the scheduler and the issue tracker, close the store, stop raft and persist. The
    /// teardown runs once; concurrent callers block until it has finished.
    pub fn stop(&self) {
        let mut torn_down = self.torn_down.lock().expect("DataPartition.torn_down mutex poisoned");
        if *torn_down {
            return;
        }
        {
            let mut lifecycle = self.lifecycle.lock().expect("DataPartition.lifecycle mutex poisoned");
            if *lifecycle == Lifecycle::Active {
                *lifecycle = Lifecycle::Stopped;
            }
        }

        self.stop_handle
            .lock()
            .expect("DataPartition.stop_handle mutex poisoned")
            .take();
        self.issues.stop();
        if let Err(e) = self.store.flush() {
            slog::warn!(self.logger, "Flush before close failed: {}", e);
        }
        self.store.close();
        self.stop_raft();
        if let Err(e) = self.persist(None) {
            slog::error!(self.logger, "Persist on stop failed: {}", e);
        }
        *torn_down = true;
        slog::info!(self.logger, "Partition stopped");
    }

    /// Stop after an error that makes this replica untrustworthy. The partition stops serving
    /// and is detached from its disk; nothing else on the node is affected.
    pub(crate) fn stop_for_fatal(&self, reason: &str) {
        slog::crit!(
            self.logger,
            "Partition on {} will be stopped: {}",
            self.path.display(),
            reason
        );
        if let Some(disk) = self.disk.upgrade() {
            disk.detach(self.partition_id);
        }
        self.stop();
    }

    /// Stop, then remove the raft log and the partition directory for good.
    pub fn delete(&self) -> Result<(), PartitionError> {
        self.stop();
        if !self.finish(Lifecycle::Deleted) {
            return Ok(());
        }
        if let Some(disk) = self.disk.upgrade() {
            disk.detach(self.partition_id);
        }
        match self.raft.write().expect("DataPartition.raft lock poisoned").take() {
            Some(raft) => {
                if let Err(e) = raft.delete() {
                    slog::warn!(self.logger, "Deleting raft log failed: {}", e);
                }
            }
            None => slog::warn!(self.logger, "Raft was never started, nothing to delete"),
        }
        fs::remove_dir_all(&self.path)?;
        slog::info!(self.logger, "Partition deleted");
        Ok(())
    }

    /// Stop, leave raft, and rename the directory so it can be reclaimed later.
    pub fn expire(&self) -> Result<PathBuf, PartitionError> {
        self.stop();
        if !self.finish(Lifecycle::Expired) {
            return Ok(self.path.clone());
        }
        if let Some(disk) = self.disk.upgrade() {
            disk.detach(self.partition_id);
        }
        match self.raft.write().expect("DataPartition.raft lock poisoned").take() {
            Some(raft) => {
                if let Err(e) = raft.expire() {
                    slog::warn!(self.logger, "Expiring raft partition failed: {}", e);
                }
            }
            None => slog::warn!(self.logger, "Raft was never started, nothing to expire"),
        }

        let dir_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| partition_dir_name(self.partition_id, self.size()));
        let new_path = self
            .path
            .with_file_name(expired_dir_name(&dir_name, chrono::Utc::now().timestamp()));
        fs::rename(&self.path, &new_path)?;
        slog::info!(self.logger, "Partition expired to {}", new_path.display());
        Ok(new_path)
    }

    fn finish(&self, end: Lifecycle) -> bool {
        let mut lifecycle = self.lifecycle.lock().expect("DataPartition.lifecycle mutex poisoned");
        if *lifecycle != Lifecycle::Stopped {
            return false;
        }
        *lifecycle = end;
        true
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock().expect("DataPartition.lifecycle mutex poisoned")
    }

    pub fn is_stopped(&self) -> bool {
        self.lifecycle() != Lifecycle::Active
    }

    /// Recompute the serving status from used space, extent count and disk health. Unavailable
    /// is sticky, and a partition is never healthier than its disk.
    pub fn update_status(&self) {
        self.compute_usage();

        let disk_status = self
            .disk
            .upgrade()
            .map(|disk| disk.status())
            .unwrap_or(PartitionStatus::Unavailable);
        let extent_count = self.store.extent_count();
        let size = self.size();

        let mut usage = self.usage.lock().expect("DataPartition.usage mutex poisoned");
        let mut status = PartitionStatus::ReadWrite;
        if usage.used >= size || extent_count >= MAX_EXTENT_COUNT {
            status = PartitionStatus::ReadOnly;
        }
        if usage.status == PartitionStatus::Unavailable {
            status = PartitionStatus::Unavailable;
        }
        usage.status = status.min(disk_status);
    }

    fn compute_usage(&self) {
        let interval = self.ctx.options().usage_refresh_interval;
        let mut usage = self.usage.lock().expect("DataPartition.usage mutex poisoned");
        if let Some(refreshed_at) = usage.refreshed_at {
            if refreshed_at.elapsed() < interval {
                return;
            }
        }
        usage.used = self.store.used_size();
        usage.refreshed_at = Some(Instant::now());
    }

    pub fn status(&self) -> PartitionStatus {
        self.usage.lock().expect("DataPartition.usage mutex poisoned").status
    }

    pub fn used(&self) -> u64 {
        self.usage.lock().expect("DataPartition.usage mutex poisoned").used
    }

    /// Returns true if `err` points at a failing disk. The disk is then marked unavailable and
    /// this partition leaves raft.
    pub fn check_is_disk_error(&self, err: &io::Error) -> bool {
        if !is_disk_error(err) {
            return false;
        }

        slog::error!(self.logger, "Disk {} error on {}: {}", self.path.display(), self.ctx.local_ip(), err);
        self.stop_raft();
        if let Some(disk) = self.disk.upgrade() {
            disk.set_status(PartitionStatus::Unavailable);
        }
        self.update_status();
        true
    }

    /// Propose a random write through raft. Resolves with the log index once it is applied.
    /// Until then reads that overlap the range are verified against the other replicas.
    pub async fn submit_random_write(
        &self,
        extent_id: ExtentId,
        offset: u64,
        data: Bytes,
        sync: bool,
    ) -> Result<u64, PartitionError> {
        let raft = self.raft().ok_or(RaftError::NotStarted)?;
        let _in_flight = self.in_flight.register(extent_id, offset, data.len() as u64);
        let opcode = if sync { OP_SYNC_RANDOM_WRITE } else { OP_RANDOM_WRITE };
        let op = RandomWriteOp::new(opcode, extent_id, offset, data);
        Ok(raft.submit(op.encode()).await?)
    }

    pub fn check_issue(&self, extent_id: ExtentId, offset: u64, size: u64) -> bool {
        self.issues.check_issue(extent_id, offset, size)
    }

    pub fn remove_issue_extent(&self, extent_id: ExtentId) {
        self.issues.remove_issue_extent(extent_id)
    }

    /// True if a read of this range must be checked against another replica: it touches an
    /// unverified fragment or a write that is being applied.
    pub fn should_verify_remotely(&self, extent_id: ExtentId, offset: u64, size: u64) -> bool {
        self.check_issue(extent_id, offset, size) || self.in_flight.overlaps(extent_id, offset, size)
    }

    pub(crate) fn propose_update_volume_info(&self) {
        let _ = self.volume_info_tx.try_send(());
    }

    /// Ask the scheduler for a full repair pass. Requests made while one is pending collapse
    /// into it.
    pub fn request_repair(&self) {
        let _ = self.repair_tx.try_send(());
    }

    /// Stage everything applied so far for truncation and persist. The previously staged index
    /// becomes the last truncate index and the raft log is cut there.
    pub(crate) fn propose_truncate(&self) {
        let applied = self.apply_tracker.applied();
        let (status, advanced) = self.apply_tracker.advance_next_truncate(applied);
        if !advanced {
            return;
        }
        if let Err(e) = self.persist(Some(status)) {
            slog::error!(self.logger, "Persist after staging truncate at {} failed: {}", applied, e);
        }
    }

    pub fn change_create_type(&self, create_type: CreateType) -> Result<(), PartitionError> {
        {
            let mut config = self.config.write().expect("DataPartition.config lock poisoned");
            if config.create_type == create_type {
                return Ok(());
            }
            config.create_type = create_type;
        }
        self.persist_metadata_only()
    }

    pub(crate) fn extents_info(&self, extent_type: ExtentType) -> RemoteExtents {
        RemoteExtents {
            extents: extents_of_type(self.store.as_ref(), extent_type),
            tiny_delete_record_size: self.store.tiny_delete_record_cursor(),
        }
    }

    pub(crate) fn raft(&self) -> Option<Arc<dyn RaftPartition>> {
        self.raft.read().expect("DataPartition.raft lock poisoned").clone()
    }

    pub fn is_raft_started(&self) -> bool {
        self.raft().is_some()
    }

    /// Returns the raft leader's address, and whether that is this node.
    pub fn raft_leader(&self) -> (Option<String>, bool) {
        let raft = match self.raft() {
            Some(raft) => raft,
            None => return (None, false),
        };
        let (leader_id, _) = raft.leader_term();
        if leader_id == 0 {
            return (None, false);
        }
        let addr = self
            .peers()
            .into_iter()
            .find(|peer| peer.id == leader_id)
            .map(|peer| peer.addr);
        (addr, leader_id == self.ctx.node_id())
    }

    pub fn try_to_leader(&self) -> Result<(), PartitionError> {
        let raft = self.raft().ok_or(RaftError::NotStarted)?;
        Ok(raft.try_to_leader()?)
    }

    pub fn partition_id(&self) -> u64 {
        self.partition_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn volume_id(&self) -> String {
        self.config.read().expect("DataPartition.config lock poisoned").volume_id.clone()
    }

    pub fn size(&self) -> u64 {
        self.config.read().expect("DataPartition.config lock poisoned").partition_size
    }

    pub fn replica_num(&self) -> u8 {
        self.config.read().expect("DataPartition.config lock poisoned").replica_num
    }

    pub fn peers(&self) -> Vec<Peer> {
        self.config.read().expect("DataPartition.config lock poisoned").peers.clone()
    }

    pub fn learners(&self) -> Vec<Learner> {
        self.config.read().expect("DataPartition.config lock poisoned").learners.clone()
    }

    pub fn hosts(&self) -> Vec<String> {
        self.config.read().expect("DataPartition.config lock poisoned").hosts.clone()
    }

    pub fn create_type(&self) -> CreateType {
        self.config.read().expect("DataPartition.config lock poisoned").create_type
    }

    pub fn ha_type(&self) -> CrossRegionHaType {
        self.config.read().expect("DataPartition.config lock poisoned").ha_type
    }

    pub fn consistency_mode(&self) -> ConsistencyMode {
        self.config.read().expect("DataPartition.config lock poisoned").consistency_mode
    }

    pub fn is_random_write_disabled(&self) -> bool {
        self.ha_type() == CrossRegionHaType::Quorum
    }

    pub fn is_raft_learner(&self) -> bool {
        let node_id = self.ctx.node_id();
        self.learners().iter().any(|learner| learner.id == node_id)
    }

    pub fn is_local_address(&self, addr: &str) -> bool {
        let node_id = self.ctx.node_id();
        self.peers().iter().any(|peer| peer.addr == addr && peer.id == node_id)
    }

    pub fn replicas(&self) -> Vec<String> {
        self.replicas
            .read()
            .expect("DataPartition.replicas lock poisoned")
            .hosts
            .clone()
    }

    /// True if this node is first in the host list and so drives repair.
    pub fn is_leader(&self) -> bool {
        self.replicas
            .read()
            .expect("DataPartition.replicas lock poisoned")
            .is_leader
    }

    pub fn is_raft_leader(&self) -> bool {
        self.is_raft_leader.load(Ordering::Acquire)
    }

    pub fn is_catch_up(&self) -> bool {
        self.is_catch_up.load(Ordering::Acquire)
    }

    pub fn need_server_fault_check(&self) -> bool {
        self.need_server_fault_check.load(Ordering::Acquire)
    }

    pub fn apply_status(&self) -> ApplyStatus {
        self.apply_tracker.snap()
    }

    pub fn extent_store(&self) -> &Arc<dyn ExtentStore> {
        &self.store
    }

    pub fn issue_tracker(&self) -> &Arc<IssueTracker> {
        &self.issues
    }

    pub fn in_flight_writes(&self) -> usize {
        self.in_flight.len()
    }
}

pub(crate) fn is_host_leader(hosts: &[String], local_ip: &str) -> bool {
    hosts
        .first()
        .and_then(|leader| host_ip(leader))
        .map(|ip| ip == local_ip)
        .unwrap_or(false)
}

const EIO: i32 = 5;
const ENOSPC: i32 = 28;
const EROFS: i32 = 30;

fn is_disk_error(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(EIO) | Some(ENOSPC) | Some(EROFS))
}
