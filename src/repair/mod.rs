mod follower;
mod task;
mod tiny_delete;

pub(crate) use follower::FollowerRepair;
pub use follower::RepairError;
pub use follower::RepairOutcome;
pub use task::build_repair_tasks;
pub use task::RepairTask;
pub use task::ReplicaExtents;
pub(crate) use tiny_delete::TinyDeleteLimits;
pub(crate) use tiny_delete::TinyDeleteSync;
pub(crate) use tiny_delete::TinyDeleteSyncState;
pub use tiny_delete::TinyDeleteGate;
pub use tiny_delete::TinyDeleteGuard;
pub use tiny_delete::TinyDeleteSyncError;
pub use tiny_delete::TinyDeleteSyncOutcome;
pub use tiny_delete::TinyDeleteSyncReport;
