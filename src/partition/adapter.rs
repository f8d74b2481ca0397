use crate::api::Peer;
use crate::partition::DataPartition;
use crate::raft::{ApplyError, ConfChange, FatalError, RandomWriteOp, SnapshotIterator, StateMachine};
use bytes::Bytes;
use std::io;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

/// PartitionStateMachine is what a partition hands to the consensus engine.
///
/// It only holds a weak reference, so the engine never keeps a dropped partition alive. Once
/// the partition is gone every callback fails with `ApplyError::Stopped`.
pub(crate) struct PartitionStateMachine {
    partition: Weak<DataPartition>,
}

impl PartitionStateMachine {
    pub fn new(partition: Weak<DataPartition>) -> Self {
        PartitionStateMachine { partition }
    }

    fn partition(&self) -> Result<Arc<DataPartition>, ApplyError> {
        self.partition.upgrade().ok_or(ApplyError::Stopped)
    }
}

/// An error that escapes a state-changing callback means this replica diverged from its
/// peers. It must not apply anything else.
fn stop_on_error<T>(dp: &DataPartition, what: &str, result: Result<T, ApplyError>) -> Result<T, ApplyError> {
    match result {
        Err(ApplyError::Stopped) => Err(ApplyError::Stopped),
        Err(e) => {
            dp.stop_for_fatal(&format!("{} failed: {}", what, e));
            Err(e)
        }
        ok => ok,
    }
}

impl StateMachine for PartitionStateMachine {
    fn apply(&self, command: &[u8], index: u64) -> Result<(), ApplyError> {
        let dp = self.partition()?;
        let result = dp.apply_random_write(command, index);
        stop_on_error(&dp, &format!("apply [index: {}]", index), result)
    }

    fn apply_member_change(&self, change: &ConfChange, index: u64) -> Result<(), ApplyError> {
        let dp = self.partition()?;
        let result = dp.apply_member_change(change, index);
        stop_on_error(&dp, &format!("member change [index: {}]", index), result)
    }

    fn snapshot(&self, recover_node: u64) -> SnapshotIterator {
        match self.partition.upgrade() {
            Some(dp) => dp.raft_snapshot(recover_node),
            None => SnapshotIterator::new(0),
        }
    }

    fn apply_snapshot(
        &self,
        peers: &[Peer],
        iterator: &mut dyn Iterator<Item = io::Result<Bytes>>,
    ) -> Result<(), ApplyError> {
        let dp = self.partition()?;
        match dp.apply_raft_snapshot(peers, iterator) {
            Err(ApplyError::IllegalSnapshot) => {
                dp.stop_for_fatal("received a raft snapshot after catching up");
                Err(ApplyError::IllegalSnapshot)
            }
            result => result,
        }
    }

    fn handle_fatal_event(&self, err: &FatalError) {
        if let Some(dp) = self.partition.upgrade() {
            slog::error!(dp.logger, "Raft fatal error: {}", err.err);
            dp.check_is_disk_error(&err.err);
        }
    }

    fn handle_leader_change(&self, leader: u64) {
        if let Some(dp) = self.partition.upgrade() {
            dp.handle_raft_leader_change(leader);
        }
    }

    fn ask_rollback(&self, original: &[u8]) -> Result<Bytes, ApplyError> {
        self.partition()?.raft_ask_rollback(original)
    }
}

impl DataPartition {
    pub(crate) fn apply_random_write(&self, command: &[u8], index: u64) -> Result<(), ApplyError> {
        if self.is_stopped() {
            return Err(ApplyError::Stopped);
        }

        let op = RandomWriteOp::decode(command)?;
        if !op.is_crc_valid() {
            return Err(ApplyError::CrcMismatch {
                extent_id: op.extent_id,
                offset: op.offset,
            });
        }

        match self.store.write(op.extent_id, op.offset, &op.data) {
            Ok(()) => {}
            Err(e) if self.store.is_recent_delete(op.extent_id) => {
                slog::warn!(
                    self.logger,
                    "Skipping write [index: {}] to deleted extent {}: {}",
                    index,
                    op.extent_id,
                    e
                );
            }
            Err(e) => return Err(e.into()),
        }

        self.advance_applied(index);
        Ok(())
    }

    pub(crate) fn advance_applied(&self, index: u64) {
        let (status, advanced) = self.apply_tracker.advance_applied(index);
        if !advanced {
            slog::warn!(self.logger, "Applied index did not advance to {}: {:?}", index, status);
        }
        self.is_catch_up.store(true, Ordering::Release);
    }

    pub(crate) fn raft_snapshot(&self, recover_node: u64) -> SnapshotIterator {
        let index = self.apply_tracker.next_truncate();
        slog::info!(
            self.logger,
            "Building snapshot at {} for node {}",
            index,
            recover_node
        );
        SnapshotIterator::new(index)
    }

    /// A snapshot is only legal for a replica that never caught up with the log. Anything else
    /// would replace data this replica already serves.
    pub(crate) fn apply_raft_snapshot(
        &self,
        peers: &[Peer],
        iterator: &mut dyn Iterator<Item = io::Result<Bytes>>,
    ) -> Result<(), ApplyError> {
        if self.is_catch_up() {
            return Err(ApplyError::IllegalSnapshot);
        }

        let mut chunks = 0;
        for chunk in iterator {
            chunk?;
            chunks += 1;
        }
        self.is_catch_up.store(true, Ordering::Release);
        slog::info!(
            self.logger,
            "Applied snapshot with {} chunks, peers {:?}",
            chunks,
            peers
        );
        Ok(())
    }

    pub(crate) fn handle_raft_leader_change(&self, leader: u64) {
        let is_leader = leader == self.ctx.node_id();
        if is_leader && !self.ctx.all_partitions_loaded() {
            if let Err(e) = self.try_to_leader() {
                slog::warn!(self.logger, "Try to lead before node load finished failed: {}", e);
            }
        }
        self.is_raft_leader.store(is_leader, Ordering::Release);
        slog::info!(self.logger, "Raft leader is now node {}", leader);

        if self.need_server_fault_check.swap(false, Ordering::AcqRel) {
            if let Err(e) = self.persist_metadata_only() {
                slog::error!(self.logger, "Persisting cleared fault check flag failed: {}", e);
            }
        }
    }

    /// Re-encode the write with the bytes currently stored in its range.
    pub(crate) fn raft_ask_rollback(&self, original: &[u8]) -> Result<Bytes, ApplyError> {
        if original.is_empty() {
            return Ok(Bytes::new());
        }

        let op = RandomWriteOp::decode(original)?;
        let (current, _) = self.store.read(op.extent_id, op.offset, op.size)?;
        slog::warn!(
            self.logger,
            "Rollback for extent {} at offset {} size {}",
            op.extent_id,
            op.offset,
            op.size
        );
        Ok(RandomWriteOp::new(op.opcode, op.extent_id, op.offset, current).encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_partition_is_stopped() {
        let state_machine = PartitionStateMachine::new(Weak::new());

        assert!(matches!(state_machine.apply(&[], 1), Err(ApplyError::Stopped)));
        assert_eq!(state_machine.snapshot(2).index(), 0);
        assert!(matches!(state_machine.ask_rollback(&[1]), Err(ApplyError::Stopped)));
    }
}
