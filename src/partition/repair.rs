use crate::partition::DataPartition;
use crate::peer::{with_retry, RetryPolicy};
use crate::repair::{
    build_repair_tasks, FollowerRepair, RepairOutcome, RepairTask, ReplicaExtents, TinyDeleteLimits, TinyDeleteSync,
    TinyDeleteSyncOutcome,
};
use crate::storage::{extents_of_type, ExtentId, ExtentType};
use std::collections::HashMap;
use std::sync::Arc;

/// What one repair task did on this replica.
#[derive(Clone, Debug, Default)]
pub struct RepairReport {
    pub extents: RepairOutcome,
    /// None if the delete record sync did not run or failed.
    pub tiny_delete: Option<TinyDeleteSyncOutcome>,
}

impl DataPartition {
    fn retry_policy(&self) -> RetryPolicy {
        let options = self.ctx.options();
        RetryPolicy {
            attempts: options.peer_retry_attempts,
            backoff: options.peer_retry_backoff,
        }
    }

    /// Other replicas of this partition, in host order.
    fn remote_replicas(&self) -> Vec<String> {
        let local_addr = self.ctx.local_addr();
        self.replicas()
            .into_iter()
            .filter(|addr| addr != local_addr)
            .collect()
    }

    /// One scheduled repair pass. Only the host leader drives repair.
    pub(crate) async fn run_repair(&self, extent_type: ExtentType, fetch_replicas: bool) {
        if fetch_replicas {
            if let Err(e) = self.update_replicas(false).await {
                slog::error!(self.logger, "Refreshing replicas before repair failed: {}", e);
                return;
            }
        }
        if !self.is_leader() || self.is_stopped() {
            return;
        }
        self.repair(extent_type).await;
    }

    /// Collect every replica's view of `extent_type`, hand each follower its task and run the
    /// leader's own task locally. Gives up if any replica cannot be reached.
    pub async fn repair(&self, extent_type: ExtentType) -> Option<RepairReport> {
        let replicas = self.replicas();
        if replicas.is_empty() {
            return None;
        }

        let local = self.extents_info(extent_type);
        let mut views = vec![ReplicaExtents {
            addr: self.ctx.local_addr().to_string(),
            extents: local.extents,
            tiny_delete_record_size: local.tiny_delete_record_size,
        }];
        for addr in self.remote_replicas() {
            let remote = with_retry(&self.logger, self.retry_policy(), "GetExtentsInfo", || {
                self.ctx.peers.get_extents_info(&addr, self.partition_id, extent_type)
            })
            .await;
            match remote {
                Ok(remote) => views.push(ReplicaExtents {
                    addr,
                    extents: remote.extents,
                    tiny_delete_record_size: remote.tiny_delete_record_size,
                }),
                Err(e) => {
                    slog::error!(self.logger, "Repair of {:?} extents aborted, {} did not answer: {}", extent_type, addr, e);
                    return None;
                }
            }
        }

        let store = self.store.clone();
        let mut tasks = build_repair_tasks(self.partition_id, &views, &|extent_id| store.is_recent_delete(extent_id));
        let own_task = tasks.remove(0);

        for (view, task) in views.iter().skip(1).zip(tasks) {
            let addr = view.addr.as_str();
            let notified = with_retry(&self.logger, self.retry_policy(), "NotifyRepair", || {
                self.ctx.peers.notify_repair(addr, task.clone())
            })
            .await;
            if let Err(e) = notified {
                slog::error!(self.logger, "Notifying {} of its repair task failed: {}", addr, e);
            }
        }

        Some(self.repair_on_follower(own_task).await)
    }

    /// Run a repair task handed over by the leader: fix extents, then catch up the tiny delete
    /// record log. A replica created to replace a decommissioned one only records the deletes
    /// and plays them back once.
    pub async fn repair_on_follower(&self, task: RepairTask) -> RepairReport {
        let mut report = RepairReport::default();
        let (follower, tiny_sync) = match (self.follower_repair(), self.tiny_delete_sync()) {
            (Some(follower), Some(tiny_sync)) => (follower, tiny_sync),
            _ => {
                slog::warn!(self.logger, "Repair task dropped, partition is stopped or detached");
                return report;
            }
        };

        report.extents = follower.run(&task).await;

        if task.leader_addr.is_empty() || task.leader_addr == self.ctx.local_addr() {
            return report;
        }
        let record_only = self.create_type() == crate::api::CreateType::DecommissionedRecovering;
        let now = chrono::Utc::now().timestamp();
        match tiny_sync
            .run(&task.leader_addr, task.leader_tiny_delete_record_file_size, record_only, now)
            .await
        {
            Ok(outcome) => report.tiny_delete = Some(outcome),
            Err(e) => slog::error!(self.logger, "Tiny delete record sync from {} failed: {}", task.leader_addr, e),
        }
        report
    }

    fn follower_repair(&self) -> Option<FollowerRepair> {
        if self.is_stopped() {
            return None;
        }
        let disk = self.disk.upgrade()?;
        let options = self.ctx.options();
        Some(FollowerRepair {
            logger: self.logger.clone(),
            partition_id: self.partition_id,
            local_addr: self.ctx.local_addr().to_string(),
            replicas: self.replicas(),
            store: self.store.clone(),
            peers: self.ctx.peers.clone(),
            issues: self.issues.clone(),
            permits: disk.repair_permits().clone(),
            auto_repair: self.ctx.auto_repair(),
            parallelism: options.repair_parallelism,
            chunk_size: options.repair_read_chunk_size,
            retry: self.retry_policy(),
        })
    }

    fn tiny_delete_sync(&self) -> Option<TinyDeleteSync> {
        if self.is_stopped() {
            return None;
        }
        let disk = self.disk.upgrade()?;
        let options = self.ctx.options();
        Some(TinyDeleteSync {
            logger: self.logger.clone(),
            partition_id: self.partition_id,
            store: self.store.clone(),
            peers: self.ctx.peers.clone(),
            limiter: self.ctx.delete_limiter().clone(),
            gate: disk.tiny_delete_gate().clone(),
            state: self.tiny_sync_state.clone(),
            limits: TinyDeleteLimits {
                min_sync_interval: options.tiny_delete_min_sync_interval,
                min_sync_size: options.tiny_delete_min_sync_size,
                full_sync_interval: options.tiny_delete_full_sync_interval,
            },
            max_batch_size: options.tiny_delete_max_batch_size,
            retry: self.retry_policy(),
        })
    }

    /// Compare the CRC of every normal extent that has the same size on all replicas. Returns
    /// the ids whose copies disagree. Leader only.
    pub async fn validate_crc(&self) -> Vec<ExtentId> {
        if !self.is_leader() || self.is_stopped() {
            return Vec::new();
        }

        // extent id -> (size, crc) per replica that holds it
        let mut copies: HashMap<ExtentId, Vec<(String, u64, u32)>> = HashMap::new();
        let local_addr = self.ctx.local_addr().to_string();
        for info in extents_of_type(self.store.as_ref(), ExtentType::Normal) {
            copies
                .entry(info.extent_id)
                .or_default()
                .push((local_addr.clone(), info.size, info.crc));
        }
        let remotes = self.remote_replicas();
        for addr in &remotes {
            let remote = with_retry(&self.logger, self.retry_policy(), "GetExtentsInfo", || {
                self.ctx.peers.get_extents_info(addr, self.partition_id, ExtentType::Normal)
            })
            .await;
            let remote = match remote {
                Ok(remote) => remote,
                Err(e) => {
                    slog::warn!(self.logger, "CRC validation skipped, {} did not answer: {}", addr, e);
                    return Vec::new();
                }
            };
            for info in remote.extents {
                copies
                    .entry(info.extent_id)
                    .or_default()
                    .push((addr.clone(), info.size, info.crc));
            }
        }

        let replica_count = remotes.len() + 1;
        let mut mismatched: Vec<ExtentId> = copies
            .into_iter()
            .filter(|(extent_id, copies)| {
                if copies.len() != replica_count || self.store.is_recent_delete(*extent_id) {
                    return false;
                }
                let (_, size, crc) = &copies[0];
                copies.iter().all(|(_, s, _)| s == size) && copies.iter().any(|(_, _, c)| c != crc)
            })
            .map(|(extent_id, copies)| {
                slog::crit!(self.logger, "CRC mismatch on extent {}: {:?}", extent_id, copies);
                extent_id
            })
            .collect();
        mismatched.sort_unstable();
        mismatched
    }

    /// Resolve tracked post-crash fragments against the other replicas.
    pub(crate) async fn fix_issues(&self) {
        if self.issues.is_empty() || self.is_stopped() {
            return;
        }
        let remotes = self.remote_replicas();
        let report = self
            .issues
            .fix_pass(
                self.partition_id,
                self.store.as_ref(),
                self.ctx.peers.as_ref(),
                &remotes,
                self.retry_policy(),
            )
            .await;
        slog::info!(self.logger, "Issue fix pass: {:?}", report);
    }

    /// Repair from the leader until local normal extents cover the leader's, then join raft.
    pub(crate) async fn recover_then_join(self: Arc<Self>) {
        let interval = self.ctx.options().recover_check_interval;
        loop {
            if self.is_stopped() {
                return;
            }
            match self.recover_from_leader().await {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => slog::warn!(self.logger, "Recovery from leader not finished: {}", e),
            }
            tokio::time::sleep(interval).await;
        }

        if let Err(e) = self.start_raft() {
            slog::error!(self.logger, "Starting raft after recovery failed: {}", e);
            return;
        }
        slog::info!(self.logger, "Recovered from leader and joined raft");
    }

    async fn recover_from_leader(&self) -> Result<bool, crate::peer::PeerError> {
        let leader_addr = match self.replicas().first() {
            Some(addr) if addr != self.ctx.local_addr() => addr.clone(),
            _ => return Ok(true),
        };

        let leader = with_retry(&self.logger, self.retry_policy(), "GetExtentsInfo", || {
            self.ctx.peers.get_extents_info(&leader_addr, self.partition_id, ExtentType::Normal)
        })
        .await?;
        let local = self.extents_info(ExtentType::Normal);
        let views = [
            ReplicaExtents {
                addr: leader_addr,
                extents: leader.extents.clone(),
                tiny_delete_record_size: leader.tiny_delete_record_size,
            },
            ReplicaExtents {
                addr: self.ctx.local_addr().to_string(),
                extents: local.extents,
                tiny_delete_record_size: local.tiny_delete_record_size,
            },
        ];
        let store = self.store.clone();
        let mut tasks = build_repair_tasks(self.partition_id, &views, &|extent_id| store.is_recent_delete(extent_id));
        let own_task = tasks.pop().unwrap_or_default();
        self.repair_on_follower(own_task).await;

        let covered = leader.extents.iter().all(|target| {
            self.store.is_recent_delete(target.extent_id)
                || self
                    .store
                    .extent_info(target.extent_id)
                    .map(|local| local.size >= target.size)
                    .unwrap_or(false)
        });
        Ok(covered)
    }
}
