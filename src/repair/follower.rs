use crate::issue::IssueTracker;
use crate::peer::{with_retry, PeerClient, PeerError, RetryPolicy};
use crate::repair::RepairTask;
use crate::storage::{is_tiny_extent, ExtentId, ExtentInfo, ExtentStore};
use std::io;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Semaphore};

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error(transparent)]
    Peer(#[from] PeerError),
    #[error("chunk of extent {extent_id} at offset {offset} failed CRC check")]
    Crc { extent_id: ExtentId, offset: u64 },
    #[error("source returned no data for extent {extent_id} at offset {offset}")]
    ShortRead { extent_id: ExtentId, offset: u64 },
    #[error("local store: {0}")]
    Store(#[from] io::Error),
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RepairOutcome {
    pub created: usize,
    pub repaired: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_transferred: u64,
}

impl RepairOutcome {
    fn merge(&mut self, other: RepairOutcome) {
        self.created += other.created;
        self.repaired += other.repaired;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.bytes_transferred += other.bytes_transferred;
    }
}

struct ExtentRepairJob {
    target: ExtentInfo,
    sources: Vec<String>,
}

/// Runs the follower half of a repair task against the local store: creates the extents the
/// leader says are missing, then pulls the missing bytes of every short extent on a bounded
/// pool of workers.
#[derive(Clone)]
pub(crate) struct FollowerRepair {
    pub logger: slog::Logger,
    pub partition_id: u64,
    pub local_addr: String,
    /// Every replica address of the partition, in host order.
    pub replicas: Vec<String>,
    pub store: Arc<dyn ExtentStore>,
    pub peers: Arc<dyn PeerClient>,
    pub issues: Arc<IssueTracker>,
    /// Shared by every partition on the disk.
    pub permits: Arc<Semaphore>,
    pub auto_repair: bool,
    pub parallelism: usize,
    pub chunk_size: u64,
    pub retry: RetryPolicy,
}

impl FollowerRepair {
    pub async fn run(&self, task: &RepairTask) -> RepairOutcome {
        let mut outcome = RepairOutcome::default();
        let mut to_repair: Vec<ExtentInfo> = task.extents_to_be_repaired.clone();

        for info in &task.extents_to_be_created {
            if is_tiny_extent(info.extent_id) || !self.store.is_finish_load() {
                continue;
            }
            if self.store.is_recent_delete(info.extent_id) {
                continue;
            }
            if self.store.has_extent(info.extent_id) {
                to_repair.push(info.clone());
                continue;
            }
            if !self.auto_repair {
                slog::warn!(
                    self.logger,
                    "Auto repair is disabled, not creating extent {}",
                    info.extent_id
                );
                continue;
            }
            if let Err(e) = self.store.create(info.extent_id, false) {
                slog::warn!(self.logger, "Failed to create extent {}: {}", info.extent_id, e);
                continue;
            }
            outcome.created += 1;
            to_repair.push(info.clone());
        }

        let mut jobs = Vec::with_capacity(to_repair.len());
        for target in to_repair {
            if self.store.is_recent_delete(target.extent_id) || !self.store.has_extent(target.extent_id) {
                outcome.skipped += 1;
                continue;
            }
            let sources = self.sources_for(task.extents_to_be_repaired_source.get(&target.extent_id));
            jobs.push(ExtentRepairJob { target, sources });
        }
        if jobs.is_empty() {
            return outcome;
        }

        let (tx, rx) = mpsc::channel(jobs.len());
        for job in jobs {
            // Capacity covers every job.
            let _ = tx.send(job).await;
        }
        drop(tx);

        let rx = Arc::new(Mutex::new(rx));
        let mut workers = Vec::with_capacity(self.parallelism);
        for _ in 0..self.parallelism {
            let this = self.clone();
            let rx = rx.clone();
            workers.push(tokio::spawn(async move {
                let mut worker_outcome = RepairOutcome::default();
                loop {
                    let job = rx.lock().await.recv().await;
                    match job {
                        Some(job) => this.repair_extent(job, &mut worker_outcome).await,
                        None => return worker_outcome,
                    }
                }
            }));
        }

        for worker in workers {
            match worker.await {
                Ok(worker_outcome) => outcome.merge(worker_outcome),
                Err(e) => slog::error!(self.logger, "Repair worker exited abnormally: {}", e),
            }
        }
        outcome
    }

    /// Majority source first, then every other replica except this one, in host order.
    fn sources_for(&self, majority: Option<&String>) -> Vec<String> {
        let mut sources = Vec::with_capacity(self.replicas.len());
        if let Some(majority) = majority {
            if *majority != self.local_addr {
                sources.push(majority.clone());
            }
        }
        for replica in &self.replicas {
            if Some(replica) == majority || *replica == self.local_addr {
                continue;
            }
            sources.push(replica.clone());
        }
        sources
    }

    async fn repair_extent(&self, job: ExtentRepairJob, outcome: &mut RepairOutcome) {
        let extent_id = job.target.extent_id;
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                outcome.failed += 1;
                return;
            }
        };

        for source in &job.sources {
            // A concurrent delete may have raced with the queue.
            if self.store.is_recent_delete(extent_id) || !self.store.has_extent(extent_id) {
                outcome.skipped += 1;
                return;
            }

            match self.pull_from(source, &job.target).await {
                Ok(0) => {
                    outcome.skipped += 1;
                    return;
                }
                Ok(bytes) => {
                    outcome.repaired += 1;
                    outcome.bytes_transferred += bytes;
                    self.issues.remove_issue_extent(extent_id);
                    return;
                }
                Err(e) => {
                    slog::warn!(
                        self.logger,
                        "Failed to repair extent {} from {}: {}",
                        extent_id,
                        source,
                        e
                    );
                }
            }
        }

        slog::error!(
            self.logger,
            "No source could repair extent {} to size {}",
            extent_id,
            job.target.size
        );
        outcome.failed += 1;
    }

    /// Copy `[local size, target size)` from `source`. Returns how many bytes were written.
    async fn pull_from(&self, source: &str, target: &ExtentInfo) -> Result<u64, RepairError> {
        let extent_id = target.extent_id;
        let start = self.store.extent_info(extent_id).map(|info| info.size).unwrap_or(0);
        let mut offset = start;

        while offset < target.size {
            let size = self.chunk_size.min(target.size - offset);
            let (data, crc) = with_retry(&self.logger, self.retry, "ReadExtent", || {
                self.peers
                    .read_extent(source, self.partition_id, extent_id, offset, size)
            })
            .await?;

            if crc32fast::hash(&data) != crc {
                return Err(RepairError::Crc { extent_id, offset });
            }
            if data.is_empty() {
                return Err(RepairError::ShortRead { extent_id, offset });
            }
            self.store.write(extent_id, offset, &data)?;
            offset += data.len() as u64;
        }

        Ok(offset - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{RemoteExtents, TinyDeleteBatch};
    use crate::storage::{ExtentType, InMemoryExtentStore};
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Duration;

    /// Serves extents from in-memory stores keyed by address and counts reads.
    struct StorePeers {
        stores: HashMap<String, Arc<InMemoryExtentStore>>,
        reads: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PeerClient for StorePeers {
        async fn get_extents_info(
            &self,
            _addr: &str,
            _partition_id: u64,
            _extent_type: ExtentType,
        ) -> Result<RemoteExtents, PeerError> {
            unimplemented!()
        }

        async fn read_extent(
            &self,
            addr: &str,
            _partition_id: u64,
            extent_id: u64,
            offset: u64,
            size: u64,
        ) -> Result<(Bytes, u32), PeerError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let store = self
                .stores
                .get(addr)
                .ok_or_else(|| PeerError::Unreachable(addr.to_string()))?;
            store
                .read(extent_id, offset, size)
                .map_err(|e| PeerError::Storage(e.to_string()))
        }

        async fn notify_repair(&self, _addr: &str, _task: RepairTask) -> Result<(), PeerError> {
            unimplemented!()
        }

        async fn read_tiny_delete_records(
            &self,
            _addr: &str,
            _partition_id: u64,
            _offset: u64,
            _max_size: u64,
        ) -> Result<TinyDeleteBatch, PeerError> {
            unimplemented!()
        }
    }

    const LOCAL: &str = "10.0.0.3:17310";
    const LEADER: &str = "10.0.0.1:17310";
    const OTHER: &str = "10.0.0.2:17310";

    fn info(extent_id: ExtentId, size: u64) -> ExtentInfo {
        ExtentInfo {
            extent_id,
            size,
            crc: 0,
            modify_time: 0,
        }
    }

    fn store_with(extents: &[(ExtentId, u8, usize)]) -> Arc<InMemoryExtentStore> {
        let store = Arc::new(InMemoryExtentStore::new());
        for (extent_id, fill, size) in extents {
            store.create(*extent_id, false).unwrap();
            store.write(*extent_id, 0, &vec![*fill; *size]).unwrap();
        }
        store
    }

    fn follower(local: Arc<InMemoryExtentStore>, peers: Arc<StorePeers>, auto_repair: bool) -> FollowerRepair {
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        FollowerRepair {
            logger: logger.clone(),
            partition_id: 1,
            local_addr: LOCAL.to_string(),
            replicas: vec![LEADER.to_string(), OTHER.to_string(), LOCAL.to_string()],
            store: local,
            peers,
            issues: Arc::new(IssueTracker::new(logger, vec![])),
            permits: Arc::new(Semaphore::new(4)),
            auto_repair,
            parallelism: 8,
            chunk_size: 64,
            retry: RetryPolicy {
                attempts: 2,
                backoff: Duration::from_millis(1),
            },
        }
    }

    fn peers(stores: Vec<(&str, Arc<InMemoryExtentStore>)>) -> Arc<StorePeers> {
        Arc::new(StorePeers {
            stores: stores.into_iter().map(|(addr, s)| (addr.to_string(), s)).collect(),
            reads: AtomicUsize::new(0),
        })
    }

    fn task(created: Vec<ExtentInfo>, repaired: Vec<ExtentInfo>, source: &str) -> RepairTask {
        let mut sources = HashMap::new();
        for info in created.iter().chain(repaired.iter()) {
            sources.insert(info.extent_id, source.to_string());
        }
        RepairTask {
            partition_id: 1,
            extents_to_be_created: created,
            extents_to_be_repaired: repaired,
            extents_to_be_repaired_source: sources,
            leader_addr: LEADER.to_string(),
            leader_tiny_delete_record_file_size: 0,
        }
    }

    #[tokio::test]
    async fn missing_extent_is_created_and_filled() {
        // -- setup --
        let leader = store_with(&[(1024, 1, 100), (1025, 2, 100), (1026, 3, 100), (1027, 4, 300)]);
        let local = store_with(&[(1024, 1, 100), (1025, 2, 100), (1026, 3, 100)]);
        let peers = peers(vec![(LEADER, leader.clone())]);
        let repair = follower(local.clone(), peers, true);

        // -- execute --
        let outcome = repair.run(&task(vec![info(1027, 300)], vec![], LEADER)).await;

        // -- verify --
        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.repaired, 1);
        assert_eq!(outcome.bytes_transferred, 300);
        assert_eq!(local.normal_extent_ids(), vec![1024, 1025, 1026, 1027]);
        assert_eq!(
            local.read(1027, 0, 300).unwrap(),
            leader.read(1027, 0, 300).unwrap()
        );
    }

    #[tokio::test]
    async fn converged_follower_does_nothing() {
        // -- setup --
        let leader = store_with(&[(1024, 1, 100), (1025, 2, 100)]);
        let local = store_with(&[(1024, 1, 100), (1025, 2, 100)]);
        let peers = peers(vec![(LEADER, leader)]);
        let repair = follower(local.clone(), peers.clone(), true);

        // -- execute --
        let outcome = repair
            .run(&task(vec![info(1024, 100)], vec![info(1025, 100)], LEADER))
            .await;

        // -- verify --
        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.repaired, 0);
        assert_eq!(outcome.bytes_transferred, 0);
        assert_eq!(peers.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_back_to_other_replica() {
        // -- setup --
        let other = store_with(&[(1024, 9, 200)]);
        let local = store_with(&[(1024, 9, 50)]);
        // The majority source is not reachable.
        let peers = peers(vec![(OTHER, other)]);
        let repair = follower(local.clone(), peers, true);

        // -- execute --
        let outcome = repair.run(&task(vec![], vec![info(1024, 200)], LEADER)).await;

        // -- verify --
        assert_eq!(outcome.repaired, 1);
        assert_eq!(outcome.bytes_transferred, 150);
        assert_eq!(local.extent_info(1024).unwrap().size, 200);
    }

    #[tokio::test]
    async fn creation_rules() {
        // -- setup --
        let leader = store_with(&[(1024, 1, 10), (1025, 1, 10)]);
        let local = store_with(&[(1025, 0, 0)]);
        local.mark_delete(1025, 0, 0).unwrap();
        let peers = peers(vec![(LEADER, leader)]);

        // -- execute --
        let disabled = follower(local.clone(), peers.clone(), false)
            .run(&task(vec![info(1024, 10), info(1025, 10), info(5, 10)], vec![], LEADER))
            .await;

        // -- verify --
        assert_eq!(disabled, RepairOutcome::default());
        assert!(!local.has_extent(1024));
        assert!(!local.has_extent(1025));

        // -- execute --
        let enabled = follower(local.clone(), peers, true)
            .run(&task(vec![info(1024, 10), info(1025, 10)], vec![], LEADER))
            .await;

        // -- verify --
        assert_eq!(enabled.created, 1);
        assert!(local.has_extent(1024));
        assert!(!local.has_extent(1025), "recently deleted extent must not come back");
    }

    #[tokio::test]
    async fn no_creation_while_headers_load() {
        let leader = store_with(&[(1024, 1, 10)]);
        let local = Arc::new(InMemoryExtentStore::new_loading());
        let peers = peers(vec![(LEADER, leader)]);

        let outcome = follower(local.clone(), peers, true)
            .run(&task(vec![info(1024, 10)], vec![], LEADER))
            .await;

        assert_eq!(outcome.created, 0);
        assert!(!local.has_extent(1024));
    }

    #[tokio::test]
    async fn repaired_extent_clears_issue() {
        // -- setup --
        let leader = store_with(&[(1024, 1, 100)]);
        let local = store_with(&[(1024, 1, 60)]);
        let peers = peers(vec![(LEADER, leader)]);
        let mut repair = follower(local, peers, true);
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        repair.issues = Arc::new(IssueTracker::new(
            logger,
            vec![crate::issue::IssueFragment {
                extent_id: 1024,
                offset: 0,
                size: 60,
            }],
        ));

        // -- execute --
        repair.run(&task(vec![], vec![info(1024, 100)], LEADER)).await;

        // -- verify --
        assert!(repair.issues.is_empty());
    }
}
