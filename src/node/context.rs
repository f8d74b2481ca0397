use crate::api::{host_ip, PartitionOptions, PartitionOptionsValidated};
use crate::master::MasterClient;
use crate::node::DeleteLimiter;
use crate::peer::PeerClient;
use crate::raft::RaftStore;
use crate::storage::ExtentStoreFactory;
use std::convert::TryFrom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct NodeConfig {
    pub logger: slog::Logger,
    pub node_id: u64,
    /// `ip:port` other replicas use to reach this node's repair service.
    pub local_addr: String,
    pub options: PartitionOptions,
    pub auto_repair: bool,
    /// Tiny extent deletes per second applied during delete record sync. 0 is unlimited.
    pub delete_rate_per_sec: u64,
}

/// The node-wide collaborators every partition on this node shares.
pub struct NodeContext {
    logger: slog::Logger,
    node_id: u64,
    local_addr: String,
    local_ip: String,
    auto_repair: AtomicBool,
    all_partitions_loaded: AtomicBool,
    delete_limiter: Arc<DeleteLimiter>,
    options: PartitionOptionsValidated,
    pub(crate) master: Arc<dyn MasterClient>,
    pub(crate) peers: Arc<dyn PeerClient>,
    pub(crate) raft_store: Arc<dyn RaftStore>,
    pub(crate) store_factory: Arc<dyn ExtentStoreFactory>,
}

impl NodeContext {
    pub fn new(
        config: NodeConfig,
        master: Arc<dyn MasterClient>,
        peers: Arc<dyn PeerClient>,
        raft_store: Arc<dyn RaftStore>,
        store_factory: Arc<dyn ExtentStoreFactory>,
    ) -> Result<Self, &'static str> {
        let local_ip = host_ip(&config.local_addr)
            .ok_or("Local address must be in 'ip:port' form")?
            .to_string();
        let options = PartitionOptionsValidated::try_from(config.options)?;

        Ok(NodeContext {
            logger: config.logger.new(slog::o!("NodeId" => config.node_id)),
            node_id: config.node_id,
            local_addr: config.local_addr,
            local_ip,
            auto_repair: AtomicBool::new(config.auto_repair),
            all_partitions_loaded: AtomicBool::new(false),
            delete_limiter: Arc::new(DeleteLimiter::new(config.delete_rate_per_sec)),
            options,
            master,
            peers,
            raft_store,
            store_factory,
        })
    }

    pub fn logger(&self) -> &slog::Logger {
        &self.logger
    }

    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    pub fn local_addr(&self) -> &str {
        &self.local_addr
    }

    pub fn local_ip(&self) -> &str {
        &self.local_ip
    }

    pub fn auto_repair(&self) -> bool {
        self.auto_repair.load(Ordering::Acquire)
    }

    pub fn set_auto_repair(&self, enabled: bool) {
        self.auto_repair.store(enabled, Ordering::Release);
    }

    pub fn all_partitions_loaded(&self) -> bool {
        self.all_partitions_loaded.load(Ordering::Acquire)
    }

    pub fn set_all_partitions_loaded(&self) {
        self.all_partitions_loaded.store(true, Ordering::Release);
    }

    pub fn delete_limiter(&self) -> &Arc<DeleteLimiter> {
        &self.delete_limiter
    }

    pub(crate) fn options(&self) -> &PartitionOptionsValidated {
        &self.options
    }
}
