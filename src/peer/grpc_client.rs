use crate::grpc::grpc_data_node_repair_client::GrpcDataNodeRepairClient;
use crate::grpc::{ProtoGetExtentsInfoReq, ProtoReadExtentReq, ProtoReadTinyDeleteRecordsReq};
use crate::peer::convert::{convert_extent_info_from_proto, convert_repair_task_to_proto};
use crate::peer::{PeerClient, PeerError, RemoteExtents, TinyDeleteBatch};
use crate::repair::RepairTask;
use crate::storage::ExtentType;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::Duration;
use tonic::transport::{Channel, Endpoint};

/// GrpcPeerClient talks to other data nodes over the repair gRPC service. One channel is kept
/// per address and reused across calls.
pub struct GrpcPeerClient {
    logger: slog::Logger,
    rpc_timeout: Duration,
    channels: Mutex<HashMap<String, Channel>>,
}

impl GrpcPeerClient {
    pub fn new(logger: slog::Logger, rpc_timeout: Duration) -> Self {
        GrpcPeerClient {
            logger,
            rpc_timeout,
            channels: Mutex::new(HashMap::new()),
        }
    }

    async fn client(&self, addr: &str) -> Result<GrpcDataNodeRepairClient<Channel>, PeerError> {
        let cached = self
            .channels
            .lock()
            .expect("GrpcPeerClient.channels mutex poisoned")
            .get(addr)
            .cloned();
        if let Some(channel) = cached {
            return Ok(GrpcDataNodeRepairClient::new(channel));
        }

        let url = format!("http://{}", addr);
        slog::debug!(self.logger, "Connecting to {} ...", url);
        let endpoint = Endpoint::from_shared(url)
            .map_err(|_| PeerError::InvalidAddr(addr.to_string()))?
            .timeout(self.rpc_timeout);
        let channel = endpoint.connect().await.map_err(|source| PeerError::Connect {
            addr: addr.to_string(),
            source,
        })?;

        self.channels
            .lock()
            .expect("GrpcPeerClient.channels mutex poisoned")
            .insert(addr.to_string(), channel.clone());
        Ok(GrpcDataNodeRepairClient::new(channel))
    }

    /// Drop the cached channel so the next call reconnects.
    fn forget(&self, addr: &str, status: tonic::Status) -> PeerError {
        if status.code() == tonic::Code::Unavailable {
            self.channels
                .lock()
                .expect("GrpcPeerClient.channels mutex poisoned")
                .remove(addr);
        }
        PeerError::Rpc {
            addr: addr.to_string(),
            status,
        }
    }
}

#[async_trait::async_trait]
impl PeerClient for GrpcPeerClient {
    async fn get_extents_info(
        &self,
        addr: &str,
        partition_id: u64,
        extent_type: ExtentType,
    ) -> Result<RemoteExtents, PeerError> {
        let rpc_request = ProtoGetExtentsInfoReq {
            partition_id,
            tiny: extent_type == ExtentType::Tiny,
        };
        slog::debug!(self.logger, "ClientWire - {:?}", rpc_request);
        let rpc_reply = self
            .client(addr)
            .await?
            .get_extents_info(rpc_request)
            .await
            .map_err(|status| self.forget(addr, status))?
            .into_inner();

        Ok(RemoteExtents {
            extents: rpc_reply
                .extents
                .into_iter()
                .map(convert_extent_info_from_proto)
                .collect(),
            tiny_delete_record_size: rpc_reply.tiny_delete_record_size,
        })
    }

    async fn read_extent(
        &self,
        addr: &str,
        partition_id: u64,
        extent_id: u64,
        offset: u64,
        size: u64,
    ) -> Result<(Bytes, u32), PeerError> {
        let rpc_request = ProtoReadExtentReq {
            partition_id,
            extent_id,
            offset,
            size,
        };
        slog::debug!(self.logger, "ClientWire - {:?}", rpc_request);
        let rpc_reply = self
            .client(addr)
            .await?
            .read_extent(rpc_request)
            .await
            .map_err(|status| self.forget(addr, status))?
            .into_inner();

        Ok((Bytes::from(rpc_reply.data), rpc_reply.crc))
    }

    async fn notify_repair(&self, addr: &str, task: RepairTask) -> Result<(), PeerError> {
        let rpc_request = convert_repair_task_to_proto(task);
        slog::debug!(
            self.logger,
            "ClientWire - NotifyRepair partition {} to {}",
            rpc_request.partition_id,
            addr
        );
        self.client(addr)
            .await?
            .notify_repair(rpc_request)
            .await
            .map_err(|status| self.forget(addr, status))?;
        Ok(())
    }

    async fn read_tiny_delete_records(
        &self,
        addr: &str,
        partition_id: u64,
        offset: u64,
        max_size: u64,
    ) -> Result<TinyDeleteBatch, PeerError> {
        let rpc_request = ProtoReadTinyDeleteRecordsReq {
            partition_id,
            offset,
            max_size,
        };
        slog::debug!(self.logger, "ClientWire - {:?}", rpc_request);
        let rpc_reply = self
            .client(addr)
            .await?
            .read_tiny_delete_records(rpc_request)
            .await
            .map_err(|status| self.forget(addr, status))?
            .into_inner();

        Ok(TinyDeleteBatch {
            data: Bytes::from(rpc_reply.data),
            crc: rpc_reply.crc,
        })
    }
}
