mod apply_tracker;
mod engine;
mod state_machine;
mod write_op;

pub use apply_tracker::ApplyStatus;
pub use apply_tracker::ApplyTracker;
pub use engine::ConfChange;
pub use engine::ConfChangeType;
pub use engine::FatalError;
pub use engine::RaftError;
pub use engine::RaftPartition;
pub use engine::RaftPartitionConfig;
pub use engine::RaftStore;
pub use state_machine::ApplyError;
pub use state_machine::SnapshotIterator;
pub use state_machine::StateMachine;
pub use write_op::RandomWriteOp;
pub use write_op::WriteOpDecodeError;
pub use write_op::OP_RANDOM_WRITE;
pub use write_op::OP_SYNC_RANDOM_WRITE;
