use crate::node::DeleteLimiter;
use crate::peer::{with_retry, PeerClient, PeerError, RetryPolicy};
use crate::storage::{is_tiny_extent, ExtentId, ExtentStore, RecordFormatError, TinyDeleteRecord};
use rand::Rng;
use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;

/// Length of the window, in seconds, over which the first full sync of a partition is spread.
const FULL_SYNC_START_SPREAD_SECS: i64 = 24 * 3600;

/// Admits one tiny delete record sync per disk at a time.
#[derive(Default)]
pub struct TinyDeleteGate {
    running: AtomicBool,
}

/// Releases the gate when dropped.
pub struct TinyDeleteGuard {
    gate: Arc<TinyDeleteGate>,
}

impl TinyDeleteGate {
    pub fn new() -> Self {
        TinyDeleteGate::default()
    }

    pub fn try_acquire(self: &Arc<Self>) -> Option<TinyDeleteGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TinyDeleteGuard { gate: self.clone() })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for TinyDeleteGuard {
    fn drop(&mut self) {
        self.gate.running.store(false, Ordering::Release);
    }
}

/// Per partition bookkeeping for when it last synced. Times are unix seconds.
#[derive(Clone, Debug)]
pub(crate) struct TinyDeleteSyncState {
    pub last_sync: i64,
    pub last_full_sync: i64,
    pub finished_playback: bool,
}

impl TinyDeleteSyncState {
    /// Both clocks start at a random point within the next day so the full syncs of partitions
    /// loaded together do not line up.
    pub fn new(now: i64) -> Self {
        let start = now + rand::thread_rng().gen_range(0..FULL_SYNC_START_SPREAD_SECS);
        TinyDeleteSyncState {
            last_sync: start,
            last_full_sync: start,
            finished_playback: false,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TinyDeleteLimits {
    pub min_sync_interval: Duration,
    pub min_sync_size: u64,
    pub full_sync_interval: Duration,
}

#[derive(Debug, Eq, PartialEq)]
pub(crate) enum SyncPlan {
    Skip(&'static str),
    /// Stream the leader's log from `start`.
    Sync { start: u64, full: bool },
}

/// Decide whether a pass should run and where it starts, updating the sync clocks for a pass
/// that will run.
pub(crate) fn plan_sync(
    state: &mut TinyDeleteSyncState,
    now: i64,
    local_cursor: u64,
    leader_size: u64,
    record_only: bool,
    limits: &TinyDeleteLimits,
) -> SyncPlan {
    if local_cursor >= leader_size {
        return SyncPlan::Skip("local log is not behind the leader");
    }

    let full = now - state.last_full_sync > limits.full_sync_interval.as_secs() as i64;
    let eager = full || record_only;
    if !eager && now - state.last_sync < limits.min_sync_interval.as_secs() as i64 {
        return SyncPlan::Skip("synced recently");
    }
    if full {
        state.last_full_sync = now;
    }
    if !eager && leader_size - local_cursor < limits.min_sync_size {
        return SyncPlan::Skip("not enough new records");
    }
    if !record_only {
        state.last_sync = now;
    }

    SyncPlan::Sync {
        start: if full { 0 } else { local_cursor },
        full,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TinyDeleteSyncError {
    #[error(transparent)]
    Peer(#[from] PeerError),
    #[error("record batch at offset {offset} failed CRC check")]
    Crc { offset: u64 },
    #[error("leader returned no records at offset {offset} before its log end {leader_size}")]
    ShortRead { offset: u64, leader_size: u64 },
    #[error(transparent)]
    Format(#[from] RecordFormatError),
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TinyDeleteSyncReport {
    pub full: bool,
    pub start: u64,
    /// Leader log offset after the last consumed batch.
    pub end: u64,
    pub records: usize,
    pub deleted: usize,
    pub persisted: usize,
    /// Records for extents that are not tiny. They are kept in the local log but never applied.
    pub skipped: usize,
    /// Records the local store failed to take. A later pass streams them again.
    pub failed: usize,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TinyDeleteSyncOutcome {
    Skipped(&'static str),
    Synced(TinyDeleteSyncReport),
}

/// Streams the leader's tiny delete record log into the local store.
pub(crate) struct TinyDeleteSync {
    pub logger: slog::Logger,
    pub partition_id: u64,
    pub store: Arc<dyn ExtentStore>,
    pub peers: Arc<dyn PeerClient>,
    pub limiter: Arc<DeleteLimiter>,
    pub gate: Arc<TinyDeleteGate>,
    pub state: Arc<Mutex<TinyDeleteSyncState>>,
    pub limits: TinyDeleteLimits,
    pub max_batch_size: u64,
    pub retry: RetryPolicy,
}

impl TinyDeleteSync {
    /// With `record_only` the records are appended to the local log without deleting anything,
    /// and the first such pass queues a playback of the whole local log when it ends.
    pub async fn run(
        &self,
        leader_addr: &str,
        leader_size: u64,
        record_only: bool,
        now: i64,
    ) -> Result<TinyDeleteSyncOutcome, TinyDeleteSyncError> {
        let _guard = match self.gate.try_acquire() {
            Some(guard) => guard,
            None => return Ok(TinyDeleteSyncOutcome::Skipped("another sync is running on this disk")),
        };

        let local_cursor = self.store.tiny_delete_record_cursor();
        let plan = {
            let mut state = self.state.lock().expect("TinyDeleteSync.state mutex poisoned");
            plan_sync(&mut state, now, local_cursor, leader_size, record_only, &self.limits)
        };
        let (start, full) = match plan {
            SyncPlan::Skip(reason) => return Ok(TinyDeleteSyncOutcome::Skipped(reason)),
            SyncPlan::Sync { start, full } => (start, full),
        };

        slog::info!(
            self.logger,
            "Tiny delete sync from {} starting at {} (local {}, leader {}, full: {}, record only: {})",
            leader_addr,
            start,
            local_cursor,
            leader_size,
            full,
            record_only
        );

        let mut report = TinyDeleteSyncReport {
            full,
            start,
            end: start,
            ..TinyDeleteSyncReport::default()
        };
        let result = self.stream(leader_addr, leader_size, record_only, &mut report).await;

        if record_only {
            self.playback_once();
        }

        match result {
            Ok(()) => {
                slog::info!(self.logger, "Tiny delete sync finished: {:?}", report);
                Ok(TinyDeleteSyncOutcome::Synced(report))
            }
            Err(e) => {
                slog::error!(
                    self.logger,
                    "Tiny delete sync from {} aborted at offset {}: {}",
                    leader_addr,
                    report.end,
                    e
                );
                Err(e)
            }
        }
    }

    async fn stream(
        &self,
        leader_addr: &str,
        leader_size: u64,
        record_only: bool,
        report: &mut TinyDeleteSyncReport,
    ) -> Result<(), TinyDeleteSyncError> {
        while report.end < leader_size {
            let offset = report.end;
            let batch = with_retry(&self.logger, self.retry, "ReadTinyDeleteRecords", || {
                self.peers
                    .read_tiny_delete_records(leader_addr, self.partition_id, offset, self.max_batch_size)
            })
            .await?;

            if crc32fast::hash(&batch.data) != batch.crc {
                return Err(TinyDeleteSyncError::Crc { offset });
            }
            if batch.data.is_empty() {
                return Err(TinyDeleteSyncError::ShortRead { offset, leader_size });
            }

            let mut by_extent: BTreeMap<ExtentId, Vec<TinyDeleteRecord>> = BTreeMap::new();
            for record in TinyDeleteRecord::decode_batch(&batch.data)? {
                report.records += 1;
                by_extent.entry(record.extent_id).or_default().push(record);
            }

            for record in by_extent.values().flatten() {
                if let Err(e) = self.take_record(record, record_only, report).await {
                    report.failed += 1;
                    slog::warn!(
                        self.logger,
                        "Tiny delete record {:?} from offset {} not taken: {}",
                        record,
                        offset,
                        e
                    );
                }
            }

            report.end += batch.data.len() as u64;
        }

        Ok(())
    }

    async fn take_record(
        &self,
        record: &TinyDeleteRecord,
        record_only: bool,
        report: &mut TinyDeleteSyncReport,
    ) -> io::Result<()> {
        if !is_tiny_extent(record.extent_id) {
            self.store.persist_tiny_delete_record(record)?;
            report.skipped += 1;
        } else if record_only {
            self.store.persist_tiny_delete_record(record)?;
            report.persisted += 1;
        } else {
            self.limiter.wait().await;
            slog::debug!(
                self.logger,
                "Deleting tiny extent {} [{}, +{})",
                record.extent_id,
                record.offset,
                record.size
            );
            self.store.mark_delete(record.extent_id, record.offset, record.size)?;
            report.deleted += 1;
        }
        Ok(())
    }

    fn playback_once(&self) {
        let mut state = self.state.lock().expect("TinyDeleteSync.state mutex poisoned");
        if state.finished_playback {
            return;
        }
        if let Err(e) = self.store.playback_tiny_delete() {
            slog::error!(self.logger, "Tiny delete playback failed: {}", e);
        }
        state.finished_playback = true;
    }
}
