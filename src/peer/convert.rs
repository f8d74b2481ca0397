use crate::grpc::{ProtoExtentInfo, ProtoNotifyRepairReq, ProtoRepairSource};
use crate::peer::PeerError;
use crate::repair::RepairTask;
use crate::storage::ExtentInfo;
use std::collections::HashMap;
use tonic::Status;

pub(super) fn convert_extent_info_to_proto(info: &ExtentInfo) -> ProtoExtentInfo {
    ProtoExtentInfo {
        extent_id: info.extent_id,
        size: info.size,
        crc: info.crc,
        modify_time: info.modify_time,
    }
}

pub(super) fn convert_extent_info_from_proto(proto: ProtoExtentInfo) -> ExtentInfo {
    ExtentInfo {
        extent_id: proto.extent_id,
        size: proto.size,
        crc: proto.crc,
        modify_time: proto.modify_time,
    }
}

pub(super) fn convert_repair_task_to_proto(task: RepairTask) -> ProtoNotifyRepairReq {
    let mut sources: Vec<ProtoRepairSource> = task
        .extents_to_be_repaired_source
        .into_iter()
        .map(|(extent_id, addr)| ProtoRepairSource { extent_id, addr })
        .collect();
    sources.sort_by_key(|s| s.extent_id);

    ProtoNotifyRepairReq {
        partition_id: task.partition_id,
        extents_to_be_created: task
            .extents_to_be_created
            .iter()
            .map(convert_extent_info_to_proto)
            .collect(),
        extents_to_be_repaired: task
            .extents_to_be_repaired
            .iter()
            .map(convert_extent_info_to_proto)
            .collect(),
        sources,
        leader_addr: task.leader_addr,
        leader_tiny_delete_record_file_size: task.leader_tiny_delete_record_file_size,
    }
}

pub(super) fn convert_repair_task_from_proto(proto: ProtoNotifyRepairReq) -> RepairTask {
    let mut sources = HashMap::with_capacity(proto.sources.len());
    for source in proto.sources {
        sources.insert(source.extent_id, source.addr);
    }

    RepairTask {
        partition_id: proto.partition_id,
        extents_to_be_created: proto
            .extents_to_be_created
            .into_iter()
            .map(convert_extent_info_from_proto)
            .collect(),
        extents_to_be_repaired: proto
            .extents_to_be_repaired
            .into_iter()
            .map(convert_extent_info_from_proto)
            .collect(),
        extents_to_be_repaired_source: sources,
        leader_addr: proto.leader_addr,
        leader_tiny_delete_record_file_size: proto.leader_tiny_delete_record_file_size,
    }
}

pub(super) fn convert_peer_error_to_status(err: PeerError) -> Status {
    match err {
        PeerError::PartitionNotFound(id) => Status::not_found(format!("partition {} not found", id)),
        PeerError::Storage(message) => Status::internal(message),
        other => Status::unavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_task_survives_proto_conversion() {
        let info = |extent_id, size| ExtentInfo {
            extent_id,
            size,
            crc: 7,
            modify_time: 1_600_000_000,
        };
        let mut sources = HashMap::new();
        sources.insert(1030, "10.0.0.2:17310".to_string());
        sources.insert(1025, "10.0.0.1:17310".to_string());
        let task = RepairTask {
            partition_id: 12,
            extents_to_be_created: vec![info(1030, 4096)],
            extents_to_be_repaired: vec![info(1025, 100)],
            extents_to_be_repaired_source: sources,
            leader_addr: "10.0.0.1:17310".to_string(),
            leader_tiny_delete_record_file_size: 480,
        };

        let proto = convert_repair_task_to_proto(task.clone());
        assert_eq!(proto.sources[0].extent_id, 1025);
        assert_eq!(convert_repair_task_from_proto(proto), task);
    }

    #[test]
    fn peer_errors_map_to_status_codes() {
        assert_eq!(
            convert_peer_error_to_status(PeerError::PartitionNotFound(3)).code(),
            tonic::Code::NotFound
        );
        assert_eq!(
            convert_peer_error_to_status(PeerError::Storage("eio".to_string())).code(),
            tonic::Code::Internal
        );
    }
}
