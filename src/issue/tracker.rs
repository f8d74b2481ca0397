use crate::issue::IssueFragment;
use crate::peer::{with_retry, PeerClient, RetryPolicy};
use crate::storage::{ExtentId, ExtentStore};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// IssueTracker holds the fragments found by a post-crash scan until they are confirmed, either
/// by a repair that rewrites the extent or by a fix pass that compares the bytes with other
/// replicas. Fragments only live in memory.
pub struct IssueTracker {
    logger: slog::Logger,
    fragments: RwLock<HashMap<ExtentId, Vec<IssueFragment>>>,
    stopped: AtomicBool,
}

#[derive(Debug, Default, Eq, PartialEq)]
pub struct FixReport {
    /// Extents whose local bytes matched the other replicas.
    pub confirmed: usize,
    /// Extents whose local bytes were overwritten by the majority's.
    pub rewritten: usize,
    pub unresolved: usize,
}

enum Verdict {
    Confirmed,
    Rewrite(Bytes),
    Unresolved,
}

impl IssueTracker {
    pub fn new(logger: slog::Logger, fragments: Vec<IssueFragment>) -> Self {
        let mut by_extent: HashMap<ExtentId, Vec<IssueFragment>> = HashMap::new();
        for fragment in fragments {
            by_extent.entry(fragment.extent_id).or_default().push(fragment);
        }
        if !by_extent.is_empty() {
            slog::warn!(logger, "Tracking {} extents with unverified tails", by_extent.len());
        }

        IssueTracker {
            logger,
            fragments: RwLock::new(by_extent),
            stopped: AtomicBool::new(false),
        }
    }

    /// True if `[offset, offset+size)` of the extent touches an unverified fragment. Readers
    /// should then verify the range with another replica instead of trusting local bytes.
    pub fn check_issue(&self, extent_id: ExtentId, offset: u64, size: u64) -> bool {
        self.fragments
            .read()
            .expect("IssueTracker.fragments lock poisoned")
            .get(&extent_id)
            .map(|fragments| fragments.iter().any(|f| f.overlaps(offset, size)))
            .unwrap_or(false)
    }

    pub fn remove_issue_extent(&self, extent_id: ExtentId) {
        let removed = self
            .fragments
            .write()
            .expect("IssueTracker.fragments lock poisoned")
            .remove(&extent_id);
        if removed.is_some() {
            slog::info!(self.logger, "Extent {} no longer has unverified fragments", extent_id);
        }
    }

    pub fn fragments(&self) -> Vec<IssueFragment> {
        let mut all: Vec<IssueFragment> = self
            .fragments
            .read()
            .expect("IssueTracker.fragments lock poisoned")
            .values()
            .flatten()
            .copied()
            .collect();
        all.sort();
        all
    }

    pub fn is_empty(&self) -> bool {
        self.fragments
            .read()
            .expect("IssueTracker.fragments lock poisoned")
            .is_empty()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Compare every tracked fragment with the same range on `remotes`. An extent is dropped
    /// from tracking once all of its fragments either match every remote that answered, or have
    /// been overwritten with bytes that a majority of all replicas agree on.
    pub(crate) async fn fix_pass(
        &self,
        partition_id: u64,
        store: &dyn ExtentStore,
        peers: &dyn PeerClient,
        remotes: &[String],
        retry: RetryPolicy,
    ) -> FixReport {
        let mut report = FixReport::default();
        let mut by_extent: Vec<(ExtentId, Vec<IssueFragment>)> = self
            .fragments
            .read()
            .expect("IssueTracker.fragments lock poisoned")
            .iter()
            .map(|(extent_id, fragments)| (*extent_id, fragments.clone()))
            .collect();
        by_extent.sort_by_key(|(extent_id, _)| *extent_id);

        for (extent_id, fragments) in by_extent {
            if self.is_stopped() {
                break;
            }

            let mut rewritten = false;
            let mut resolved = true;
            for fragment in fragments {
                match self.judge(partition_id, store, peers, remotes, retry, &fragment).await {
                    Verdict::Confirmed => {}
                    Verdict::Rewrite(bytes) => match store.write(extent_id, fragment.offset, &bytes) {
                        Ok(()) => rewritten = true,
                        Err(e) => {
                            slog::error!(
                                self.logger,
                                "Failed to rewrite fragment {:?} with majority bytes: {}",
                                fragment,
                                e
                            );
                            resolved = false;
                        }
                    },
                    Verdict::Unresolved => resolved = false,
                }
            }

            if !resolved {
                report.unresolved += 1;
                continue;
            }
            if rewritten {
                report.rewritten += 1;
            } else {
                report.confirmed += 1;
            }
            self.remove_issue_extent(extent_id);
        }

        report
    }

    async fn judge(
        &self,
        partition_id: u64,
        store: &dyn ExtentStore,
        peers: &dyn PeerClient,
        remotes: &[String],
        retry: RetryPolicy,
        fragment: &IssueFragment,
    ) -> Verdict {
        let local = match store.read(fragment.extent_id, fragment.offset, fragment.size) {
            Ok((bytes, _)) => bytes,
            Err(e) => {
                slog::warn!(self.logger, "Cannot read local fragment {:?}: {}", fragment, e);
                return Verdict::Unresolved;
            }
        };

        let mut answers: Vec<Bytes> = Vec::with_capacity(remotes.len());
        for addr in remotes {
            let result = with_retry(&self.logger, retry, "ReadExtent", || {
                peers.read_extent(addr, partition_id, fragment.extent_id, fragment.offset, fragment.size)
            })
            .await;
            match result {
                Ok((bytes, crc)) if crc32fast::hash(&bytes) == crc => answers.push(bytes),
                Ok(_) => slog::warn!(self.logger, "Fragment {:?} from {} failed CRC check", fragment, addr),
                Err(e) => slog::debug!(self.logger, "Fragment {:?} not available from {}: {}", fragment, addr, e),
            }
        }

        if answers.is_empty() {
            return Verdict::Unresolved;
        }
        if answers.iter().all(|bytes| *bytes == local) {
            return Verdict::Confirmed;
        }

        let replica_count = remotes.len() + 1;
        let majority = replica_count / 2 + 1;
        let local_votes = 1 + answers.iter().filter(|bytes| **bytes == local).count();
        if local_votes >= majority {
            return Verdict::Confirmed;
        }

        let mut votes: Vec<(Bytes, usize)> = Vec::new();
        for answer in answers {
            match votes.iter_mut().find(|(bytes, _)| *bytes == answer) {
                Some((_, count)) => *count += 1,
                None => votes.push((answer, 1)),
            }
        }
        match votes.into_iter().max_by_key(|(_, count)| *count) {
            Some((bytes, count)) if count >= majority => Verdict::Rewrite(bytes),
            _ => Verdict::Unresolved,
        }
    }
}
