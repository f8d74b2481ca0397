//! Types shared between the partition subsystem and the node that hosts it.
mod options;
mod types;

pub use options::PartitionOptions;
pub use types::ConsistencyMode;
pub use types::CreatePartitionRequest;
pub use types::CreateType;
pub use types::CrossRegionHaType;
pub use types::Learner;
pub use types::PartitionStatus;
pub use types::Peer;
pub use types::PromoteConfig;

pub(crate) use options::PartitionOptionsValidated;
pub(crate) use types::host_ip;
