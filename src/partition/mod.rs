mod adapter;
mod disk;
mod error;
mod holder;
mod membership;
mod metadata;
mod partition;
mod persist;
mod repair;
mod scheduler;

pub(crate) use adapter::PartitionStateMachine;
pub use disk::Disk;
pub use error::PartitionError;
pub use membership::AddRaftLearnerRequest;
pub use membership::AddRaftMemberRequest;
pub use membership::MemberChangeRequest;
pub use membership::PromoteRaftLearnerRequest;
pub use membership::RemoveRaftMemberRequest;
pub use membership::ResetRaftMemberRequest;
pub use metadata::expired_dir_name;
pub use metadata::parse_partition_dir_name;
pub use metadata::partition_dir_name;
pub use metadata::PartitionMetadata;
pub use metadata::EXPIRED_DIR_PREFIX;
pub use metadata::PARTITION_DIR_PREFIX;
pub use partition::DataPartition;
pub use partition::Lifecycle;
pub use repair::RepairReport;
