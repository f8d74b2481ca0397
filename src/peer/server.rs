use crate::grpc::grpc_data_node_repair_server::{GrpcDataNodeRepair, GrpcDataNodeRepairServer};
use crate::grpc::{
    ProtoGetExtentsInfoReq, ProtoGetExtentsInfoResult, ProtoNotifyRepairReq, ProtoNotifyRepairResult,
    ProtoReadExtentReq, ProtoReadExtentResult, ProtoReadTinyDeleteRecordsReq, ProtoReadTinyDeleteRecordsResult,
};
use crate::peer::convert::{convert_extent_info_to_proto, convert_peer_error_to_status, convert_repair_task_from_proto};
use crate::peer::RepairService;
use crate::shutdown::ShutdownSignal;
use crate::storage::ExtentType;
use std::net::SocketAddr;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

/// RepairServer is the type that implements the repair gRPC interface.
pub struct RepairServer {
    logger: slog::Logger,
    service: RepairService,
}

impl RepairServer {
    pub fn new(logger: slog::Logger, service: RepairService) -> Self {
        RepairServer { logger, service }
    }

    pub async fn run(self, socket_addr: SocketAddr, shutdown_signal: ShutdownSignal) {
        let logger = self.logger.clone();
        slog::info!(logger, "Listening on '{:?}'", socket_addr);

        let result = Server::builder()
            .add_service(GrpcDataNodeRepairServer::new(self))
            .serve_with_shutdown(socket_addr, shutdown_signal)
            .await;

        slog::info!(logger, "Server run() has exited: {:?}", result);
    }

    fn handle_get_extents_info(&self, rpc_request: ProtoGetExtentsInfoReq) -> Result<ProtoGetExtentsInfoResult, Status> {
        let extent_type = if rpc_request.tiny {
            ExtentType::Tiny
        } else {
            ExtentType::Normal
        };
        let remote = self
            .service
            .get_extents_info(rpc_request.partition_id, extent_type)
            .map_err(convert_peer_error_to_status)?;

        Ok(ProtoGetExtentsInfoResult {
            extents: remote.extents.iter().map(convert_extent_info_to_proto).collect(),
            tiny_delete_record_size: remote.tiny_delete_record_size,
        })
    }

    fn handle_read_extent(&self, rpc_request: ProtoReadExtentReq) -> Result<ProtoReadExtentResult, Status> {
        let (data, crc) = self
            .service
            .read_extent(
                rpc_request.partition_id,
                rpc_request.extent_id,
                rpc_request.offset,
                rpc_request.size,
            )
            .map_err(convert_peer_error_to_status)?;

        Ok(ProtoReadExtentResult { data: data.to_vec(), crc })
    }

    fn handle_notify_repair(&self, rpc_request: ProtoNotifyRepairReq) -> Result<ProtoNotifyRepairResult, Status> {
        let task = convert_repair_task_from_proto(rpc_request);
        self.service.notify_repair(task).map_err(convert_peer_error_to_status)?;

        Ok(ProtoNotifyRepairResult {})
    }

    fn handle_read_tiny_delete_records(
        &self,
        rpc_request: ProtoReadTinyDeleteRecordsReq,
    ) -> Result<ProtoReadTinyDeleteRecordsResult, Status> {
        let batch = self
            .service
            .read_tiny_delete_records(rpc_request.partition_id, rpc_request.offset, rpc_request.max_size)
            .map_err(convert_peer_error_to_status)?;

        Ok(ProtoReadTinyDeleteRecordsResult {
            data: batch.data.to_vec(),
            crc: batch.crc,
        })
    }
}

#[async_trait::async_trait]
impl GrpcDataNodeRepair for RepairServer {
    async fn get_extents_info(
        &self,
        rpc_request_wrapped: Request<ProtoGetExtentsInfoReq>,
    ) -> Result<Response<ProtoGetExtentsInfoResult>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();

        slog::debug!(self.logger, "ServerWire - {:?}", rpc_request);
        let rpc_result = self.handle_get_extents_info(rpc_request);
        slog::debug!(
            self.logger,
            "ServerWire - GetExtentsInfo returned {:?} extents",
            rpc_result.as_ref().map(|r| r.extents.len())
        );

        rpc_result.map(Response::new)
    }

    async fn read_extent(
        &self,
        rpc_request_wrapped: Request<ProtoReadExtentReq>,
    ) -> Result<Response<ProtoReadExtentResult>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();

        slog::debug!(self.logger, "ServerWire - {:?}", rpc_request);
        self.handle_read_extent(rpc_request).map(Response::new)
    }

    async fn notify_repair(
        &self,
        rpc_request_wrapped: Request<ProtoNotifyRepairReq>,
    ) -> Result<Response<ProtoNotifyRepairResult>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();

        slog::debug!(self.logger, "ServerWire - {:?}", rpc_request);
        let rpc_result = self.handle_notify_repair(rpc_request);
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_result);

        rpc_result.map(Response::new)
    }

    async fn read_tiny_delete_records(
        &self,
        rpc_request_wrapped: Request<ProtoReadTinyDeleteRecordsReq>,
    ) -> Result<Response<ProtoReadTinyDeleteRecordsResult>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();

        slog::debug!(self.logger, "ServerWire - {:?}", rpc_request);
        self.handle_read_tiny_delete_records(rpc_request).map(Response::new)
    }
}
