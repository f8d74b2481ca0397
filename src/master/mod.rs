mod client;

pub use client::DataPartitionInfo;
pub use client::MasterClient;
pub use client::MasterError;
pub use client::VolumeSimpleInfo;
