use std::sync::Mutex;

/// Point-in-time copy of an `ApplyTracker`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ApplyStatus {
    /// Highest log index whose effect is durable in the extent store.
    pub applied: u64,
    /// Highest log index already removed from the raft log.
    pub last_truncate: u64,
    /// Highest log index staged for removal. 0 until the first proposal.
    pub next_truncate: u64,
}

/// ApplyTracker tracks which raft log positions are applied and which may be truncated.
///
/// After every successful mutation:
///
/// * `last_truncate <= applied`
/// * `next_truncate == 0 || last_truncate < next_truncate <= applied`
///
/// Mutators follow a CAS-like signature: they return a snapshot taken under the same lock
/// along with true if state was mutated. On false, state is unchanged.
#[derive(Default)]
pub struct ApplyTracker {
    status: Mutex<ApplyStatus>,
}

impl ApplyTracker {
    pub fn new() -> Self {
        ApplyTracker::default()
    }

    /// Seed the tracker from persisted values. Rejects `applied != 0 && applied < last_truncate`,
    /// since the log prefix up to `last_truncate` is gone and could never be re-applied.
    ///
    /// CAS: Return true if we successfully mutated state.
    pub fn init(&self, applied: u64, last_truncate: u64) -> bool {
        if applied != 0 && applied < last_truncate {
            return false;
        }

        let mut status = self.lock("init");
        status.applied = applied;
        status.last_truncate = last_truncate;
        true
    }

    /// CAS: succeeds iff `id > applied` and `last_truncate <= id`.
    pub fn advance_applied(&self, id: u64) -> (ApplyStatus, bool) {
        let mut status = self.lock("advance_applied");
        if status.applied < id && status.last_truncate <= id {
            status.applied = id;
            return (*status, true);
        }
        (*status, false)
    }

    /// Stage `id` as the next truncation point. The previously staged value, if any, becomes
    /// `last_truncate` first.
    ///
    /// CAS: succeeds iff `last_truncate < id`, `next_truncate < id` and `id <= applied`.
    pub fn advance_next_truncate(&self, id: u64) -> (ApplyStatus, bool) {
        let mut status = self.lock("advance_next_truncate");
        if status.last_truncate < id && status.next_truncate < id && id <= status.applied {
            if status.next_truncate != 0 && status.next_truncate > status.last_truncate {
                status.last_truncate = status.next_truncate;
            }
            status.next_truncate = id;
            return (*status, true);
        }
        (*status, false)
    }

    pub fn snap(&self) -> ApplyStatus {
        *self.lock("snap")
    }

    pub fn applied(&self) -> u64 {
        self.lock("applied").applied
    }

    pub fn last_truncate(&self) -> u64 {
        self.lock("last_truncate").last_truncate
    }

    pub fn next_truncate(&self) -> u64 {
        self.lock("next_truncate").next_truncate
    }

    fn lock(&self, caller: &str) -> std::sync::MutexGuard<'_, ApplyStatus> {
        self.status
            .lock()
            .unwrap_or_else(|_| panic!("ApplyTracker.{}() mutex guard poison", caller))
    }
}
