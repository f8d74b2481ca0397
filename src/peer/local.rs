use crate::peer::{PeerClient, PeerError, RemoteExtents, RepairService, TinyDeleteBatch};
use crate::repair::RepairTask;
use crate::storage::ExtentType;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;

/// LocalPeerClient routes peer calls to `RepairService`s registered in the same process. It lets
/// several nodes share one runtime without opening sockets. An address with no registered
/// service behaves like an unreachable host.
#[derive(Default)]
pub struct LocalPeerClient {
    services: RwLock<HashMap<String, RepairService>>,
}

impl LocalPeerClient {
    pub fn new() -> Self {
        LocalPeerClient::default()
    }

    pub fn register(&self, addr: impl Into<String>, service: RepairService) {
        self.services
            .write()
            .expect("LocalPeerClient.services lock poisoned")
            .insert(addr.into(), service);
    }

    pub fn unregister(&self, addr: &str) {
        self.services
            .write()
            .expect("LocalPeerClient.services lock poisoned")
            .remove(addr);
    }

    fn service(&self, addr: &str) -> Result<RepairService, PeerError> {
        self.services
            .read()
            .expect("LocalPeerClient.services lock poisoned")
            .get(addr)
            .cloned()
            .ok_or_else(|| PeerError::Unreachable(addr.to_string()))
    }
}

#[async_trait::async_trait]
impl PeerClient for LocalPeerClient {
    async fn get_extents_info(
        &self,
        addr: &str,
        partition_id: u64,
        extent_type: ExtentType,
    ) -> Result<RemoteExtents, PeerError> {
        self.service(addr)?.get_extents_info(partition_id, extent_type)
    }

    async fn read_extent(
        &self,
        addr: &str,
        partition_id: u64,
        extent_id: u64,
        offset: u64,
        size: u64,
    ) -> Result<(Bytes, u32), PeerError> {
        self.service(addr)?.read_extent(partition_id, extent_id, offset, size)
    }

    async fn notify_repair(&self, addr: &str, task: RepairTask) -> Result<(), PeerError> {
        self.service(addr)?.notify_repair(task)
    }

    async fn read_tiny_delete_records(
        &self,
        addr: &str,
        partition_id: u64,
        offset: u64,
        max_size: u64,
    ) -> Result<TinyDeleteBatch, PeerError> {
        self.service(addr)?.read_tiny_delete_records(partition_id, offset, max_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_address_is_unreachable() {
        let client = LocalPeerClient::new();

        let result = client.get_extents_info("10.0.0.9:17310", 1, ExtentType::Normal).await;

        match result {
            Err(PeerError::Unreachable(addr)) => assert_eq!(addr, "10.0.0.9:17310"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn registered_service_without_partition_reports_not_found() {
        let client = LocalPeerClient::new();
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        client.register("10.0.0.1:17310", RepairService::new(logger, vec![]));

        let result = client.read_tiny_delete_records("10.0.0.1:17310", 4, 0, 240).await;

        assert!(matches!(result, Err(PeerError::PartitionNotFound(4))));
    }
}
