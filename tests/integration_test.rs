use bytes::Bytes;
use datapartition::{
    AddRaftLearnerRequest, AddRaftMemberRequest, ApplyError, ConfChange, CreatePartitionRequest, CreateType,
    CrossRegionHaType, DataPartition, DataPartitionInfo, Disk, ExtentStore, ExtentType, GrpcPeerClient,
    InMemoryExtentStore, InMemoryExtentStoreFactory, Learner, Lifecycle, LocalPeerClient, MasterClient, MasterError,
    MemberChangeRequest, NodeConfig, NodeContext, PartitionMetadata, PartitionOptions, Peer, PeerClient, PeerError,
    PromoteRaftLearnerRequest, RaftError, RaftPartition, RaftPartitionConfig, RaftStore, RepairServer, RepairService,
    SnapshotIterator, StateMachine, VolumeSimpleInfo,
};
use slog::Drain;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fs;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::time::{Duration, Instant};

const VOLUME: &str = "vol-1";

#[tokio::test]
async fn write_is_applied_on_every_replica() -> Result<(), Box<dyn Error>> {
    let cluster = Cluster::new(3);
    let partitions = cluster.create_partition(1, CreateType::Normal)?;
    for dp in &partitions {
        dp.start()?;
    }
    cluster.raft.elect(1, 1);

    for node in &cluster.nodes {
        node.store_of(&partitions[node.index]).create(1024, false)?;
    }
    let index = partitions[0]
        .submit_random_write(1024, 0, Bytes::from_static(b"hello partition"), false)
        .await?;

    assert_eq!(index, 1);
    for (node, dp) in cluster.nodes.iter().zip(partitions.iter()) {
        let (data, _) = node.store_of(dp).read(1024, 0, 15)?;
        assert_eq!(&data[..], b"hello partition");
        assert!(dp.is_catch_up());
        assert_eq!(dp.is_raft_leader(), node.index == 0);
    }

    Ok(())
}

#[tokio::test]
async fn repair_converges_followers() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let cluster = Cluster::new(3);
    let partitions = cluster.create_partition(7, CreateType::Normal)?;
    let leader = cluster.nodes[0].store_of(&partitions[0]);
    let short = cluster.nodes[1].store_of(&partitions[1]);
    let empty = cluster.nodes[2].store_of(&partitions[2]);

    leader.create(1025, false)?;
    leader.write(1025, 0, &vec![7u8; 10_000])?;
    short.create(1025, false)?;
    short.write(1025, 0, &vec![7u8; 4_000])?;
    short.create(1026, false)?;
    short.write(1026, 0, &vec![3u8; 500])?;

    // -- execute --
    let report = partitions[0].repair(ExtentType::Normal).await.expect("repair should run");

    // -- verify --
    assert_eq!(report.extents.created, 1);
    assert_eq!(report.extents.repaired, 1);

    let expected = [(1025, 10_000), (1026, 500)];
    wait_until(Duration::from_secs(5), || {
        [&short, &empty].iter().all(|store| {
            expected.iter().all(|(extent_id, size)| {
                store
                    .extent_info(*extent_id)
                    .map(|info| info.size == *size)
                    .unwrap_or(false)
            })
        })
    })
    .await;
    assert_eq!(empty.extent_info(1025).unwrap().crc, leader.extent_info(1025).unwrap().crc);
    assert_eq!(partitions[0].validate_crc().await, Vec::<u64>::new());

    // Same size, different bytes.
    empty.write(1025, 0, &[9u8; 16])?;
    assert_eq!(partitions[0].validate_crc().await, vec![1025]);

    Ok(())
}

#[tokio::test]
async fn only_the_host_leader_validates_crc() -> Result<(), Box<dyn Error>> {
    let cluster = Cluster::new(2);
    let partitions = cluster.create_partition(8, CreateType::Normal)?;
    let follower = cluster.nodes[1].store_of(&partitions[1]);
    follower.create(1024, false)?;
    follower.write(1024, 0, b"abc")?;

    assert!(partitions[0].is_leader());
    assert!(!partitions[1].is_leader());
    assert!(partitions[1].validate_crc().await.is_empty());
    assert_eq!(partitions[0].validate_crc().await, Vec::<u64>::new());

    Ok(())
}

#[tokio::test]
async fn decommission_recovery_repairs_then_joins_raft() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let cluster = Cluster::new(3);
    let partitions = cluster.create_partition_with(9, |index| {
        if index == 2 {
            CreateType::DecommissionedRecovering
        } else {
            CreateType::Normal
        }
    })?;
    let leader = cluster.nodes[0].store_of(&partitions[0]);
    leader.create(1030, false)?;
    leader.write(1030, 0, &vec![1u8; 8192])?;
    leader.write(1, 0, &vec![2u8; 4096])?;
    leader.mark_delete(1, 0, 4096)?;
    leader.mark_delete(1, 0, 4096)?;
    assert_eq!(leader.tiny_delete_record_cursor(), 24);

    // -- execute --
    let recovering = &partitions[2];
    recovering.start()?;

    // -- verify --
    let store = cluster.nodes[2].store_of(recovering);
    wait_until(Duration::from_secs(5), || recovering.is_raft_started()).await;
    assert_eq!(store.extent_info(1030).unwrap().size, 8192);
    assert_eq!(store.tiny_delete_record_cursor(), 24);
    assert_eq!(recovering.create_type(), CreateType::DecommissionedRecovering);

    recovering
        .change_raft_member(MemberChangeRequest::AddNode(AddRaftMemberRequest {
            partition_id: 9,
            add_peer: Peer::new(4, "10.0.0.4:17310"),
        }))
        .await?;
    assert_eq!(recovering.create_type(), CreateType::Normal);
    assert_eq!(recovering.peers().len(), 4);
    assert_eq!(recovering.hosts().last().map(String::as_str), Some("10.0.0.4:17310"));

    recovering.stop();
    Ok(())
}

#[tokio::test]
async fn repeated_snapshot_stops_partition() -> Result<(), Box<dyn Error>> {
    let cluster = Cluster::new(1);
    let fresh = cluster.create_partition(20, CreateType::Normal)?.remove(0);
    let caught_up = cluster.create_partition(21, CreateType::Normal)?.remove(0);
    fresh.start()?;
    caught_up.start()?;
    cluster.nodes[0].store_of(&caught_up).create(1024, false)?;
    caught_up.submit_random_write(1024, 0, Bytes::from_static(b"x"), true).await?;

    let state_machine = cluster.raft.state_machine(20, 1);
    state_machine.apply_snapshot(&[], &mut SnapshotIterator::new(0))?;
    assert!(fresh.is_catch_up());
    assert_eq!(fresh.lifecycle(), Lifecycle::Active);

    let state_machine = cluster.raft.state_machine(21, 1);
    let result = state_machine.apply_snapshot(&[], &mut SnapshotIterator::new(0));
    assert!(matches!(result, Err(ApplyError::IllegalSnapshot)));
    assert_eq!(caught_up.lifecycle(), Lifecycle::Stopped);
    assert!(cluster.nodes[0].disk.partition(21).is_none());
    assert!(cluster.nodes[0].disk.partition(20).is_some());

    let result = state_machine.apply(&[], 5);
    assert!(matches!(result, Err(ApplyError::Stopped)));

    Ok(())
}

#[tokio::test]
async fn corrupt_write_stops_only_that_partition() -> Result<(), Box<dyn Error>> {
    let cluster = Cluster::new(1);
    let dp = cluster.create_partition(30, CreateType::Normal)?.remove(0);
    dp.start()?;

    let result = cluster.raft.state_machine(30, 1).apply(b"garbage", 1);

    assert!(matches!(result, Err(ApplyError::Decode(_))));
    assert_eq!(dp.lifecycle(), Lifecycle::Stopped);
    assert!(cluster.nodes[0].disk.partition(30).is_none());
    assert_eq!(dp.apply_status().applied, 0);

    Ok(())
}

#[tokio::test]
async fn restart_restores_apply_state_and_clears_fault_check() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let cluster = Cluster::new(1);
    let node = &cluster.nodes[0];
    let dp = cluster.create_partition(40, CreateType::Normal)?.remove(0);
    dp.start()?;
    cluster.raft.elect(40, 1);
    node.store_of(&dp).create(1024, false)?;
    dp.submit_random_write(1024, 0, Bytes::from(vec![5u8; 5000]), false).await?;
    dp.submit_random_write(1024, 5000, Bytes::from(vec![6u8; 100]), false).await?;
    dp.stop();

    let path = dp.path().to_path_buf();
    assert_eq!(fs::read_to_string(path.join("APPLY"))?, "2|0");
    let mut metadata = PartitionMetadata::read_from(&path)?;
    let create_time = metadata.create_time.clone();
    metadata.need_server_fault_check = true;
    metadata.write_to(&path)?;
    drop(dp);

    // -- execute --
    let disk = Arc::new(Disk::new(node.ctx.logger(), node.dir.path(), 4));
    let latest_flush_time = chrono::Utc::now().timestamp() - 10;
    let loaded = disk.restore_partitions(&node.ctx, latest_flush_time)?;

    // -- verify --
    assert_eq!(loaded.len(), 1);
    let dp = &loaded[0];
    assert_eq!(dp.apply_status().applied, 2);
    assert!(dp.is_catch_up());
    assert!(dp.need_server_fault_check());
    assert!(dp.check_issue(1024, 4096, 10));
    assert!(dp.should_verify_remotely(1024, 4096, 10));
    assert!(!dp.check_issue(1024, 0, 4096));

    dp.start()?;
    cluster.raft.elect(40, 1);
    assert!(!dp.need_server_fault_check());
    let metadata = PartitionMetadata::read_from(&path)?;
    assert!(!metadata.need_server_fault_check);
    assert_eq!(metadata.create_time, create_time);

    // The cleared flag is persisted once; later leader changes leave META alone.
    fs::remove_file(path.join("META"))?;
    cluster.raft.elect(40, 1);
    assert!(!path.join("META").exists());
    assert!(!dp.need_server_fault_check());

    dp.stop();
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_stop_and_delete_wait_for_teardown() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let cluster = Cluster::new(1);
    let dp = cluster.create_partition(45, CreateType::Normal)?.remove(0);
    dp.start()?;
    let path = dp.path().to_path_buf();
    let hold = cluster.raft.stop_gate.write().unwrap();

    // -- execute --
    let stopping = {
        let dp = dp.clone();
        std::thread::spawn(move || dp.stop())
    };
    wait_until(Duration::from_secs(5), || dp.lifecycle() == Lifecycle::Stopped).await;
    let deleting = {
        let dp = dp.clone();
        std::thread::spawn(move || dp.delete().map_err(|e| e.to_string()))
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    // -- verify --
    assert!(path.exists());
    assert_eq!(dp.lifecycle(), Lifecycle::Stopped);

    drop(hold);
    stopping.join().expect("stop thread");
    deleting.join().expect("delete thread")?;
    assert!(!path.exists());
    assert_eq!(dp.lifecycle(), Lifecycle::Deleted);

    Ok(())
}

#[tokio::test]
async fn read_overlapping_unapplied_write_is_verified_remotely() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let cluster = Cluster::new(1);
    let dp = cluster.create_partition(46, CreateType::Normal)?.remove(0);
    dp.start()?;
    cluster.raft.elect(46, 1);
    cluster.nodes[0].store_of(&dp).create(1024, false)?;
    let hold = cluster.raft.submit_gate.write().await;

    // -- execute --
    let pending = {
        let dp = dp.clone();
        tokio::spawn(async move {
            dp.submit_random_write(1024, 8192, Bytes::from(vec![1u8; 4096]), false)
                .await
        })
    };
    wait_until(Duration::from_secs(5), || dp.in_flight_writes() == 1).await;

    // -- verify --
    assert_eq!(dp.apply_status().applied, 0);
    assert!(dp.should_verify_remotely(1024, 10_000, 10));
    assert!(!dp.should_verify_remotely(1024, 0, 4096));
    assert!(!dp.should_verify_remotely(1025, 8192, 10));

    drop(hold);
    assert_eq!(pending.await??, 1);
    assert_eq!(dp.in_flight_writes(), 0);
    assert!(!dp.should_verify_remotely(1024, 10_000, 10));

    dp.stop();
    let rejected = dp
        .submit_random_write(1024, 0, Bytes::from_static(b"late"), false)
        .await;
    assert!(rejected.is_err());
    assert_eq!(dp.in_flight_writes(), 0);

    Ok(())
}

#[tokio::test]
async fn expire_and_delete_partition_directories() -> Result<(), Box<dyn Error>> {
    let cluster = Cluster::new(1);
    let node = &cluster.nodes[0];
    let expired = cluster.create_partition(50, CreateType::Normal)?.remove(0);
    let deleted = cluster.create_partition(51, CreateType::Normal)?.remove(0);
    expired.start()?;

    let new_path = expired.expire()?;
    let name = new_path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("expired_datapartition_50_"), "{}", name);
    assert!(new_path.is_dir());
    assert!(!expired.path().exists());
    assert_eq!(expired.lifecycle(), Lifecycle::Expired);

    let path = deleted.path().to_path_buf();
    deleted.delete()?;
    assert!(!path.exists());
    assert_eq!(deleted.lifecycle(), Lifecycle::Deleted);
    assert!(node.disk.partitions().is_empty());
    assert_eq!(node.disk.allocated_size(), 0);

    Ok(())
}

#[tokio::test]
async fn repeated_create_request_must_match() -> Result<(), Box<dyn Error>> {
    let cluster = Cluster::new(2);
    let node = &cluster.nodes[0];
    let first = cluster.create_partition(60, CreateType::Normal)?.remove(0);

    let mut request = cluster.request(60, CreateType::Normal);
    let again = node.disk.create_partition(&node.ctx, &request)?;
    assert!(Arc::ptr_eq(&first, &again));

    request.volume_id = "another-volume".to_string();
    assert!(node.disk.create_partition(&node.ctx, &request).is_err());

    Ok(())
}

#[tokio::test]
async fn can_remove_self_follows_master_view() -> Result<(), Box<dyn Error>> {
    let cluster = Cluster::new(2);
    let dp = cluster.create_partition(70, CreateType::Normal)?.remove(0);
    assert!(!dp.can_remove_self().await?);

    cluster.master.set_offline_peer(70, 1);
    assert!(dp.can_remove_self().await?);

    Ok(())
}

#[tokio::test]
async fn repair_service_over_grpc() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let cluster = Cluster::new(1);
    let node = &cluster.nodes[0];
    let dp = cluster.create_partition(80, CreateType::Normal)?.remove(0);
    let store = node.store_of(&dp);
    store.create(1024, false)?;
    store.write(1024, 0, b"served over grpc")?;
    store.mark_delete(2, 0, 4096)?;

    let socket_addr: std::net::SocketAddr = "127.0.0.1:47310".parse()?;
    let service = RepairService::new(node.ctx.logger().clone(), vec![node.disk.clone()]);
    let (shutdown, signal) = datapartition::shutdown_signal();
    tokio::spawn(RepairServer::new(node.ctx.logger().clone(), service).run(socket_addr, signal));
    let client = GrpcPeerClient::new(node.ctx.logger().clone(), Duration::from_secs(1));
    let server = "127.0.0.1:47310";

    // -- execute --
    let deadline = Instant::now() + Duration::from_secs(5);
    let remote = loop {
        match client.get_extents_info(server, 80, ExtentType::Normal).await {
            Ok(remote) => break remote,
            Err(e) => {
                assert!(Instant::now() < deadline, "server never came up: {}", e);
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        }
    };
    let (data, crc) = client.read_extent(server, 80, 1024, 7, 9).await?;
    let batch = client.read_tiny_delete_records(server, 80, 0, 2_400_000).await?;
    let missing = client.get_extents_info(server, 81, ExtentType::Normal).await;

    // -- verify --
    assert_eq!(remote.extents.len(), 1);
    assert_eq!(remote.extents[0].extent_id, 1024);
    assert_eq!(remote.extents[0].size, 16);
    assert_eq!(remote.tiny_delete_record_size, 24);
    assert_eq!(&data[..], b"over grpc");
    assert_eq!(crc, crc32fast::hash(b"over grpc"));
    assert_eq!(batch.data.len(), 24);
    assert_eq!(batch.crc, crc32fast::hash(&batch.data));
    match missing {
        Err(PeerError::Rpc { status, .. }) => assert_eq!(status.code(), tonic::Code::NotFound),
        other => panic!("expected NotFound, got {:?}", other),
    }

    shutdown.shutdown();
    Ok(())
}

#[tokio::test]
async fn learner_joins_and_is_promoted() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let cluster = Cluster::new(2);
    let partitions = cluster.create_partition(90, CreateType::Normal)?;
    for dp in &partitions {
        dp.start()?;
    }
    cluster.raft.elect(90, 1);
    let learner = Learner {
        id: 3,
        addr: addr(3),
        promote_config: Default::default(),
    };

    assert_eq!(partitions[0].raft_leader(), (Some(addr(1)), true));
    assert_eq!(partitions[1].raft_leader(), (Some(addr(1)), false));
    assert!(partitions[0].is_local_address(&addr(1)));
    assert!(!partitions[1].is_local_address(&addr(1)));
    assert!(!partitions[0].is_random_write_disabled());

    // -- execute --
    partitions[0]
        .change_raft_member(MemberChangeRequest::AddLearner(AddRaftLearnerRequest {
            partition_id: 90,
            add_learner: learner.clone(),
        }))
        .await?;

    // -- verify --
    for dp in &partitions {
        assert_eq!(dp.learners(), vec![learner.clone()]);
        assert_eq!(dp.peers().len(), 3);
        assert!(dp.hosts().contains(&addr(3)));
        assert!(!dp.is_raft_learner());
    }
    let metadata = PartitionMetadata::read_from(partitions[1].path())?;
    assert_eq!(metadata.learners, vec![learner.clone()]);

    partitions[0]
        .change_raft_member(MemberChangeRequest::PromoteLearner(PromoteRaftLearnerRequest {
            partition_id: 90,
            promote_learner: learner,
        }))
        .await?;
    for dp in &partitions {
        assert!(dp.learners().is_empty());
        assert_eq!(dp.peers().len(), 3);
    }

    partitions[0].sync_replica_hosts(vec![addr(2), addr(1)]);
    assert!(!partitions[0].is_leader());
    assert_eq!(partitions[0].replicas(), vec![addr(2), addr(1)]);

    partitions[0].change_create_type(CreateType::DecommissionedRecovering)?;
    let metadata = PartitionMetadata::read_from(partitions[0].path())?;
    assert_eq!(metadata.create_type, CreateType::DecommissionedRecovering);

    partitions[0].reset_raft_member(vec![peer(1), peer(2)]).await?;
    assert_eq!(partitions[0].in_flight_writes(), 0);

    for dp in &partitions {
        dp.stop();
    }
    Ok(())
}

// ------- test harness -------

struct Cluster {
    nodes: Vec<TestNode>,
    raft: LoopbackRaft,
    master: Arc<StaticMaster>,
}

struct TestNode {
    index: usize,
    ctx: Arc<NodeContext>,
    disk: Arc<Disk>,
    factory: Arc<InMemoryExtentStoreFactory>,
    dir: TempDir,
}

impl TestNode {
    fn store_of(&self, dp: &DataPartition) -> Arc<InMemoryExtentStore> {
        self.factory.store(dp.path()).expect("store opened for partition")
    }
}

impl Cluster {
    fn new(size: usize) -> Self {
        let raft = LoopbackRaft::default();
        let peers = Arc::new(LocalPeerClient::new());
        let master = Arc::new(StaticMaster::new((1..=size as u64).map(peer).collect()));
        let logger = create_root_logger_for_stdout();

        let nodes = (0..size)
            .map(|index| {
                let node_id = index as u64 + 1;
                let dir = TempDir::new().expect("temp dir");
                let factory = Arc::new(InMemoryExtentStoreFactory::new());
                let config = NodeConfig {
                    logger: logger.clone(),
                    node_id,
                    local_addr: addr(node_id),
                    options: PartitionOptions {
                        peer_retry_backoff: Some(Duration::from_millis(5)),
                        recover_check_interval: Some(Duration::from_millis(20)),
                        ..PartitionOptions::default()
                    },
                    auto_repair: true,
                    delete_rate_per_sec: 0,
                };
                let ctx = NodeContext::new(
                    config,
                    master.clone(),
                    peers.clone(),
                    Arc::new(raft.clone()),
                    factory.clone(),
                )
                .expect("valid node config");
                let disk = Arc::new(Disk::new(ctx.logger(), dir.path(), 4));
                peers.register(addr(node_id), RepairService::new(ctx.logger().clone(), vec![disk.clone()]));

                TestNode {
                    index,
                    ctx: Arc::new(ctx),
                    disk,
                    factory,
                    dir,
                }
            })
            .collect();

        Cluster { nodes, raft, master }
    }

    fn request(&self, partition_id: u64, create_type: CreateType) -> CreatePartitionRequest {
        let members: Vec<Peer> = (1..=self.nodes.len() as u64).map(peer).collect();
        CreatePartitionRequest {
            volume_id: VOLUME.to_string(),
            partition_id,
            partition_size: 128 * 1024 * 1024,
            replica_num: members.len() as u8,
            hosts: members.iter().map(|p| p.addr.clone()).collect(),
            members,
            learners: vec![],
            create_type,
            ha_type: CrossRegionHaType::Default,
            consistency_mode: Default::default(),
        }
    }

    fn create_partition(&self, partition_id: u64, create_type: CreateType) -> Result<Vec<Arc<DataPartition>>, Box<dyn Error>> {
        self.create_partition_with(partition_id, |_| create_type)
    }

    fn create_partition_with(
        &self,
        partition_id: u64,
        create_type: impl Fn(usize) -> CreateType,
    ) -> Result<Vec<Arc<DataPartition>>, Box<dyn Error>> {
        let mut partitions = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let request = self.request(partition_id, create_type(node.index));
            partitions.push(node.disk.create_partition(&node.ctx, &request)?);
        }
        Ok(partitions)
    }
}

fn addr(node_id: u64) -> String {
    format!("10.0.0.{}:17310", node_id)
}

fn peer(node_id: u64) -> Peer {
    Peer::new(node_id, addr(node_id))
}

async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + timeout;
    while !condition() {
        assert!(Instant::now() < deadline, "Timeout waiting for condition");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn create_root_logger_for_stdout() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!())
}

// ------- master -------

struct StaticMaster {
    peers: Vec<Peer>,
    offline: Mutex<HashMap<u64, u64>>,
}

impl StaticMaster {
    fn new(peers: Vec<Peer>) -> Self {
        StaticMaster {
            peers,
            offline: Mutex::new(HashMap::new()),
        }
    }

    fn set_offline_peer(&self, partition_id: u64, node_id: u64) {
        self.offline.lock().unwrap().insert(partition_id, node_id);
    }
}

#[async_trait::async_trait]
impl MasterClient for StaticMaster {
    async fn get_volume_simple_info(&self, volume_id: &str) -> Result<VolumeSimpleInfo, MasterError> {
        if volume_id != VOLUME {
            return Err(MasterError::NotFound(volume_id.to_string()));
        }
        Ok(VolumeSimpleInfo {
            cross_region_ha_type: CrossRegionHaType::Default,
            replica_num: self.peers.len() as u8,
        })
    }

    async fn get_data_partition(&self, _volume_id: &str, partition_id: u64) -> Result<DataPartitionInfo, MasterError> {
        Ok(DataPartitionInfo {
            hosts: self.peers.iter().map(|p| p.addr.clone()).collect(),
            peers: self.peers.clone(),
            offline_peer_id: self.offline.lock().unwrap().get(&partition_id).copied().unwrap_or(0),
        })
    }
}

// ------- consensus -------

/// Every partition group commits immediately and applies each entry on all registered members,
/// in process. Enough to drive partitions through their state machine callbacks.
#[derive(Clone, Default)]
struct LoopbackRaft {
    groups: Arc<Mutex<HashMap<u64, Group>>>,
    /// Proposals wait here while a test holds the write side.
    submit_gate: Arc<tokio::sync::RwLock<()>>,
    /// `stop` waits here while a test holds the write side.
    stop_gate: Arc<std::sync::RwLock<()>>,
}

#[derive(Default)]
struct Group {
    last_index: u64,
    leader: u64,
    members: BTreeMap<u64, Arc<dyn StateMachine>>,
}

impl LoopbackRaft {
    fn elect(&self, partition_id: u64, leader: u64) {
        let members = {
            let mut groups = self.groups.lock().unwrap();
            let group = groups.entry(partition_id).or_default();
            group.leader = leader;
            group.members.values().cloned().collect::<Vec<_>>()
        };
        for member in members {
            member.handle_leader_change(leader);
        }
    }

    fn state_machine(&self, partition_id: u64, node_id: u64) -> Arc<dyn StateMachine> {
        self.groups.lock().unwrap()[&partition_id].members[&node_id].clone()
    }

    fn next_entry(&self, partition_id: u64) -> (u64, Vec<(u64, Arc<dyn StateMachine>)>) {
        let mut groups = self.groups.lock().unwrap();
        let group = groups.entry(partition_id).or_default();
        group.last_index += 1;
        let members = group.members.iter().map(|(id, sm)| (*id, sm.clone())).collect();
        (group.last_index, members)
    }
}

impl RaftStore for LoopbackRaft {
    fn create_partition(
        &self,
        config: RaftPartitionConfig,
        state_machine: Arc<dyn StateMachine>,
    ) -> Result<Arc<dyn RaftPartition>, RaftError> {
        let mut groups = self.groups.lock().unwrap();
        let group = groups.entry(config.partition_id).or_default();
        group.last_index = group.last_index.max(config.applied);
        group.members.insert(config.node_id, state_machine);

        Ok(Arc::new(LoopbackPartition {
            raft: self.clone(),
            partition_id: config.partition_id,
            node_id: config.node_id,
            truncated: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
        }))
    }
}

struct LoopbackPartition {
    raft: LoopbackRaft,
    partition_id: u64,
    node_id: u64,
    truncated: AtomicU64,
    stopped: AtomicBool,
}

impl LoopbackPartition {
    fn check_running(&self) -> Result<(), RaftError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(RaftError::Stopped);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RaftPartition for LoopbackPartition {
    async fn submit(&self, command: Bytes) -> Result<u64, RaftError> {
        self.check_running()?;
        let _pass = self.raft.submit_gate.read().await;
        let (index, members) = self.raft.next_entry(self.partition_id);
        let mut own = Ok(index);
        for (node_id, member) in members {
            let result = member.apply(&command, index);
            if node_id == self.node_id {
                own = result.map(|_| index).map_err(|e| RaftError::Other(e.to_string()));
            }
        }
        own
    }

    async fn change_member(&self, change: ConfChange) -> Result<(), RaftError> {
        self.check_running()?;
        let (index, members) = self.raft.next_entry(self.partition_id);
        for (_, member) in members {
            member
                .apply_member_change(&change, index)
                .map_err(|e| RaftError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn reset_member(&self, _peers: Vec<Peer>, _context: Bytes) -> Result<(), RaftError> {
        self.check_running()
    }

    fn try_to_leader(&self) -> Result<(), RaftError> {
        self.check_running()
    }

    fn leader_term(&self) -> (u64, u64) {
        let groups = self.raft.groups.lock().unwrap();
        (groups.get(&self.partition_id).map(|g| g.leader).unwrap_or(0), 1)
    }

    fn committed_index(&self) -> u64 {
        let groups = self.raft.groups.lock().unwrap();
        groups.get(&self.partition_id).map(|g| g.last_index).unwrap_or(0)
    }

    fn flush_wal(&self) -> Result<(), RaftError> {
        self.check_running()
    }

    fn truncate(&self, index: u64) {
        self.truncated.fetch_max(index, Ordering::AcqRel);
    }

    fn stop(&self) {
        drop(self.raft.stop_gate.read().unwrap());
        self.stopped.store(true, Ordering::Release);
    }

    fn delete(&self) -> Result<(), RaftError> {
        self.stop();
        let mut groups = self.raft.groups.lock().unwrap();
        if let Some(group) = groups.get_mut(&self.partition_id) {
            group.members.remove(&self.node_id);
        }
        Ok(())
    }

    fn expire(&self) -> Result<(), RaftError> {
        self.delete()
    }
}
