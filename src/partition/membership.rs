use crate::api::{CreateType, Learner, Peer};
use crate::partition::partition::is_host_leader;
use crate::partition::{DataPartition, PartitionError};
use crate::raft::{ApplyError, ConfChange, ConfChangeType, RaftError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AddRaftMemberRequest {
    pub partition_id: u64,
    pub add_peer: Peer,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RemoveRaftMemberRequest {
    pub partition_id: u64,
    pub remove_peer: Peer,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AddRaftLearnerRequest {
    pub partition_id: u64,
    pub add_learner: Learner,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PromoteRaftLearnerRequest {
    pub partition_id: u64,
    pub promote_learner: Learner,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResetRaftMemberRequest {
    pub partition_id: u64,
    pub new_peers: Vec<Peer>,
}

/// A membership change to propose through raft. The request travels as the JSON context of
/// the committed `ConfChange` so every replica applies the same one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MemberChangeRequest {
    AddNode(AddRaftMemberRequest),
    RemoveNode(RemoveRaftMemberRequest),
    AddLearner(AddRaftLearnerRequest),
    PromoteLearner(PromoteRaftLearnerRequest),
}

impl MemberChangeRequest {
    pub fn to_conf_change(&self) -> Result<ConfChange, serde_json::Error> {
        let (change_type, peer, context) = match self {
            MemberChangeRequest::AddNode(req) => (ConfChangeType::AddNode, req.add_peer.clone(), serde_json::to_vec(req)?),
            MemberChangeRequest::RemoveNode(req) => {
                (ConfChangeType::RemoveNode, req.remove_peer.clone(), serde_json::to_vec(req)?)
            }
            MemberChangeRequest::AddLearner(req) => (
                ConfChangeType::AddLearner,
                Peer::new(req.add_learner.id, req.add_learner.addr.clone()),
                serde_json::to_vec(req)?,
            ),
            MemberChangeRequest::PromoteLearner(req) => (
                ConfChangeType::PromoteLearner,
                Peer::new(req.promote_learner.id, req.promote_learner.addr.clone()),
                serde_json::to_vec(req)?,
            ),
        };
        Ok(ConfChange {
            change_type,
            peer,
            context: Bytes::from(context),
        })
    }

    /// Returns None for `UpdateNode`, which partitions do not support.
    pub fn from_conf_change(change: &ConfChange) -> Result<Option<Self>, serde_json::Error> {
        let context = &change.context[..];
        let request = match change.change_type {
            ConfChangeType::AddNode => MemberChangeRequest::AddNode(serde_json::from_slice(context)?),
            ConfChangeType::RemoveNode => MemberChangeRequest::RemoveNode(serde_json::from_slice(context)?),
            ConfChangeType::AddLearner => MemberChangeRequest::AddLearner(serde_json::from_slice(context)?),
            ConfChangeType::PromoteLearner => MemberChangeRequest::PromoteLearner(serde_json::from_slice(context)?),
            ConfChangeType::UpdateNode => return Ok(None),
        };
        Ok(Some(request))
    }
}

impl DataPartition {
    /// Apply a committed membership change to the local layout. Returns an error only if the
    /// change could not be decoded or persisted.
    pub(crate) fn apply_member_change(&self, change: &ConfChange, index: u64) -> Result<(), ApplyError> {
        if self.is_stopped() {
            return Err(ApplyError::Stopped);
        }

        let request = match MemberChangeRequest::from_conf_change(change)? {
            Some(request) => request,
            None => {
                slog::warn!(self.logger, "Unsupported member change {:?} at index {}", change.change_type, index);
                self.advance_applied(index);
                return Ok(());
            }
        };

        let is_updated = match &request {
            MemberChangeRequest::AddNode(req) => self.add_raft_node(&req.add_peer),
            MemberChangeRequest::RemoveNode(req) => self.remove_raft_node(&req.remove_peer),
            MemberChangeRequest::AddLearner(req) => self.add_raft_learner(&req.add_learner),
            MemberChangeRequest::PromoteLearner(req) => self.promote_raft_learner(&req.promote_learner),
        };
        slog::info!(
            self.logger,
            "Applied member change {:?} at index {}, updated: {}",
            request,
            index,
            is_updated
        );

        if is_updated {
            self.config
                .write()
                .expect("DataPartition.config lock poisoned")
                .create_type = CreateType::Normal;
            self.persist(None)?;
        }
        self.advance_applied(index);
        self.propose_update_volume_info();
        Ok(())
    }

    fn add_raft_node(&self, peer: &Peer) -> bool {
        {
            let mut config = self.config.write().expect("DataPartition.config lock poisoned");
            if config.peers.iter().any(|p| p.id == peer.id) {
                return false;
            }
            config.peers.push(peer.clone());
            if !config.hosts.contains(&peer.addr) {
                config.hosts.push(peer.addr.clone());
            }
        }
        self.refresh_replicas_from_config();
        true
    }

    fn remove_raft_node(&self, peer: &Peer) -> bool {
        {
            let mut config = self.config.write().expect("DataPartition.config lock poisoned");
            let index = match config.peers.iter().position(|p| p.id == peer.id) {
                Some(index) => index,
                None => return false,
            };
            config.peers.remove(index);
            config.hosts.retain(|host| host != &peer.addr);
            config.learners.retain(|learner| learner.id != peer.id);
        }
        self.refresh_replicas_from_config();

        if peer.id == self.ctx.node_id() {
            slog::warn!(self.logger, "This replica was removed from the raft group");
        }
        true
    }

    /// Learners replicate the log like peers, so they are added to both lists.
    fn add_raft_learner(&self, learner: &Learner) -> bool {
        {
            let mut config = self.config.write().expect("DataPartition.config lock poisoned");
            if config.learners.iter().any(|l| l.id == learner.id) {
                return false;
            }
            config.learners.push(learner.clone());
            if !config.peers.iter().any(|p| p.id == learner.id) {
                config.peers.push(Peer::new(learner.id, learner.addr.clone()));
            }
            if !config.hosts.contains(&learner.addr) {
                config.hosts.push(learner.addr.clone());
            }
        }
        self.refresh_replicas_from_config();
        true
    }

    fn promote_raft_learner(&self, learner: &Learner) -> bool {
        let mut config = self.config.write().expect("DataPartition.config lock poisoned");
        let before = config.learners.len();
        config.learners.retain(|l| l.id != learner.id);
        config.learners.len() != before
    }

    fn refresh_replicas_from_config(&self) {
        let hosts = self.hosts();
        self.set_replicas(hosts);
    }

    fn set_replicas(&self, hosts: Vec<String>) {
        let is_leader = is_host_leader(&hosts, self.ctx.local_ip());
        let mut replicas = self.replicas.write().expect("DataPartition.replicas lock poisoned");
        replicas.hosts = hosts;
        replicas.is_leader = is_leader;
    }

    /// Propose a membership change through raft.
    pub async fn change_raft_member(&self, request: MemberChangeRequest) -> Result<(), PartitionError> {
        let raft = self.raft().ok_or(RaftError::NotStarted)?;
        let change = request.to_conf_change()?;
        raft.change_member(change).await?;
        Ok(())
    }

    /// Force the raft group down to `peers`. For recovering a group that lost its quorum.
    pub async fn reset_raft_member(&self, peers: Vec<Peer>) -> Result<(), PartitionError> {
        let raft = self.raft().ok_or(RaftError::NotStarted)?;
        let request = ResetRaftMemberRequest {
            partition_id: self.partition_id,
            new_peers: peers.clone(),
        };
        let context = Bytes::from(serde_json::to_vec(&request)?);
        raft.reset_member(peers, context).await?;
        slog::warn!(self.logger, "Raft members reset to {:?}", request.new_peers);
        Ok(())
    }

    /// Refresh the host list from the master, at most once per `replica_refresh_interval`
    /// unless `force` is set.
    pub async fn update_replicas(&self, force: bool) -> Result<(), PartitionError> {
        if !force {
            let replicas = self.replicas.read().expect("DataPartition.replicas lock poisoned");
            if let Some(refreshed_at) = replicas.refreshed_at {
                if refreshed_at.elapsed() < self.ctx.options().replica_refresh_interval {
                    return Ok(());
                }
            }
        }

        let info = self
            .ctx
            .master
            .get_data_partition(&self.volume_id(), self.partition_id)
            .await?;
        let changed = self.replicas() != info.hosts;
        self.set_replicas(info.hosts);
        self.replicas
            .write()
            .expect("DataPartition.replicas lock poisoned")
            .refreshed_at = Some(Instant::now());
        if changed {
            slog::info!(self.logger, "Replicas refreshed from master: {:?}", self.replicas());
        }
        Ok(())
    }

    /// Apply a host list pushed by the master. The leader then repairs the new layout.
    pub fn sync_replica_hosts(&self, hosts: Vec<String>) {
        if hosts.is_empty() {
            return;
        }
        slog::info!(self.logger, "Replica hosts synced to {:?}", hosts);
        self.set_replicas(hosts);
        if self.is_leader() {
            self.request_repair();
        }
    }

    /// True if the master no longer lists this node among the peers, or is taking this node
    /// offline. The node manager then removes the local replica.
    pub async fn can_remove_self(&self) -> Result<bool, PartitionError> {
        let info = self
            .ctx
            .master
            .get_data_partition(&self.volume_id(), self.partition_id)
            .await?;
        let node_id = self.ctx.node_id();
        if !info.peers.iter().any(|peer| peer.id == node_id) {
            return Ok(true);
        }
        Ok(info.offline_peer_id == node_id)
    }

    /// Pull the volume's replication policy from the master and persist it if it changed.
    pub async fn update_volume_info_from_master(&self) -> Result<(), PartitionError> {
        let info = self.ctx.master.get_volume_simple_info(&self.volume_id()).await?;
        let changed = {
            let mut config = self.config.write().expect("DataPartition.config lock poisoned");
            let changed = config.ha_type != info.cross_region_ha_type || config.replica_num != info.replica_num;
            config.ha_type = info.cross_region_ha_type;
            config.replica_num = info.replica_num;
            changed
        };
        if changed {
            slog::info!(
                self.logger,
                "Volume info updated: ha type {:?}, replica num {}",
                info.cross_region_ha_type,
                info.replica_num
            );
            self.persist_metadata_only()?;
        }
        Ok(())
    }
}
