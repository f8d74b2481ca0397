mod client;
mod convert;
mod grpc_client;
mod local;
mod retry;
mod server;
mod service;

pub use client::PeerClient;
pub use client::PeerError;
pub use client::RemoteExtents;
pub use client::TinyDeleteBatch;
pub use grpc_client::GrpcPeerClient;
pub use local::LocalPeerClient;
pub(crate) use retry::with_retry;
pub(crate) use retry::RetryPolicy;
pub use server::RepairServer;
pub use service::RepairService;
pub use service::MAX_TINY_DELETE_BATCH_SIZE;
