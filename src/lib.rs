mod api;
mod issue;
mod master;
mod node;
mod partition;
mod peer;
mod raft;
mod repair;
mod shutdown;
mod storage;
mod grpc {
    include!("../generated/repair.rs");
}

pub use api::ConsistencyMode;
pub use api::CreatePartitionRequest;
pub use api::CreateType;
pub use api::CrossRegionHaType;
pub use api::Learner;
pub use api::PartitionOptions;
pub use api::PartitionStatus;
pub use api::Peer;
pub use api::PromoteConfig;
pub use issue::FixReport;
pub use issue::IssueFragment;
pub use issue::IssueTracker;
pub use master::DataPartitionInfo;
pub use master::MasterClient;
pub use master::MasterError;
pub use master::VolumeSimpleInfo;
pub use node::DeleteLimiter;
pub use node::NodeConfig;
pub use node::NodeContext;
pub use partition::AddRaftLearnerRequest;
pub use partition::AddRaftMemberRequest;
pub use partition::DataPartition;
pub use partition::Disk;
pub use partition::Lifecycle;
pub use partition::MemberChangeRequest;
pub use partition::PartitionError;
pub use partition::PartitionMetadata;
pub use partition::PromoteRaftLearnerRequest;
pub use partition::RemoveRaftMemberRequest;
pub use partition::RepairReport;
pub use partition::ResetRaftMemberRequest;
pub use peer::GrpcPeerClient;
pub use peer::LocalPeerClient;
pub use peer::PeerClient;
pub use peer::PeerError;
pub use peer::RemoteExtents;
pub use peer::RepairServer;
pub use peer::RepairService;
pub use peer::TinyDeleteBatch;
pub use raft::ApplyError;
pub use raft::ApplyStatus;
pub use raft::ApplyTracker;
pub use raft::ConfChange;
pub use raft::ConfChangeType;
pub use raft::FatalError;
pub use raft::RaftError;
pub use raft::RaftPartition;
pub use raft::RaftPartitionConfig;
pub use raft::RaftStore;
pub use raft::RandomWriteOp;
pub use raft::SnapshotIterator;
pub use raft::StateMachine;
pub use raft::OP_RANDOM_WRITE;
pub use raft::OP_SYNC_RANDOM_WRITE;
pub use repair::build_repair_tasks;
pub use repair::RepairOutcome;
pub use repair::RepairTask;
pub use repair::ReplicaExtents;
pub use repair::TinyDeleteSyncOutcome;
pub use repair::TinyDeleteSyncReport;
pub use shutdown::shutdown_signal;
pub use shutdown::ShutdownHandle;
pub use shutdown::ShutdownSignal;
pub use storage::ExtentId;
pub use storage::ExtentInfo;
pub use storage::ExtentStore;
pub use storage::ExtentStoreFactory;
pub use storage::ExtentType;
pub use storage::InMemoryExtentStore;
pub use storage::InMemoryExtentStoreFactory;
pub use storage::TinyDeleteRecord;
pub use storage::TINY_EXTENT_START_ID;
pub use storage::MIN_NORMAL_EXTENT_ID;

// Each root module only declares `mod` and `pub use`. Nothing below the crate root is `pub mod`,
// types leave a module through individual re-exports.
