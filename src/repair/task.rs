use crate::storage::{ExtentId, ExtentInfo};
use std::collections::{BTreeMap, HashMap};

/// The work a leader hands to one replica: which extents it lacks, which are short, and where
/// to fetch the missing bytes. Built fresh every repair cycle.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RepairTask {
    pub partition_id: u64,
    pub extents_to_be_created: Vec<ExtentInfo>,
    pub extents_to_be_repaired: Vec<ExtentInfo>,
    /// Address of the replica holding the largest copy of each extent.
    pub extents_to_be_repaired_source: HashMap<ExtentId, String>,
    pub leader_addr: String,
    pub leader_tiny_delete_record_file_size: u64,
}

impl RepairTask {
    pub fn is_empty(&self) -> bool {
        self.extents_to_be_created.is_empty() && self.extents_to_be_repaired.is_empty()
    }
}

/// One replica's view of its extents, as collected by the leader.
#[derive(Clone, Debug)]
pub struct ReplicaExtents {
    pub addr: String,
    pub extents: Vec<ExtentInfo>,
    pub tiny_delete_record_size: u64,
}

/// Build one task per replica, in the same order as `replicas`. The first entry must be the
/// leader: when several replicas hold an extent at the same maximum size, the earliest one is
/// picked as the source. Extents for which `skip` returns true are left out entirely.
pub fn build_repair_tasks(
    partition_id: u64,
    replicas: &[ReplicaExtents],
    skip: &dyn Fn(ExtentId) -> bool,
) -> Vec<RepairTask> {
    let (leader_addr, leader_tiny_delete_record_file_size) = match replicas.first() {
        Some(leader) => (leader.addr.clone(), leader.tiny_delete_record_size),
        None => return Vec::new(),
    };

    // extent id -> (largest copy, index of the replica holding it)
    let mut largest: BTreeMap<ExtentId, (&ExtentInfo, usize)> = BTreeMap::new();
    for (index, replica) in replicas.iter().enumerate() {
        for info in &replica.extents {
            if skip(info.extent_id) {
                continue;
            }
            let entry = largest.entry(info.extent_id).or_insert((info, index));
            if info.size > entry.0.size {
                *entry = (info, index);
            }
        }
    }

    replicas
        .iter()
        .map(|replica| {
            let local: HashMap<ExtentId, u64> = replica.extents.iter().map(|e| (e.extent_id, e.size)).collect();
            let mut task = RepairTask {
                partition_id,
                leader_addr: leader_addr.clone(),
                leader_tiny_delete_record_file_size,
                ..RepairTask::default()
            };

            for (extent_id, (info, source)) in &largest {
                let source_addr = &replicas[*source].addr;
                match local.get(extent_id) {
                    None => task.extents_to_be_created.push((*info).clone()),
                    Some(size) if *size < info.size => task.extents_to_be_repaired.push((*info).clone()),
                    Some(_) => continue,
                }
                task.extents_to_be_repaired_source.insert(*extent_id, source_addr.clone());
            }
            task
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(extent_id: ExtentId, size: u64) -> ExtentInfo {
        ExtentInfo {
            extent_id,
            size,
            crc: 0,
            modify_time: 0,
        }
    }

    fn replica(addr: &str, extents: Vec<ExtentInfo>) -> ReplicaExtents {
        ReplicaExtents {
            addr: addr.to_string(),
            extents,
            tiny_delete_record_size: 0,
        }
    }

    #[test]
    fn tasks_cover_missing_and_short_extents() {
        // -- setup --
        let replicas = vec![
            ReplicaExtents {
                tiny_delete_record_size: 240,
                ..replica("a:1", vec![info(1024, 100), info(1025, 50)])
            },
            replica("b:1", vec![info(1024, 100), info(1025, 80), info(1026, 10)]),
            replica("c:1", vec![info(1024, 40)]),
        ];

        // -- execute --
        let tasks = build_repair_tasks(7, &replicas, &|_| false);

        // -- verify --
        assert_eq!(tasks.len(), 3);

        let leader = &tasks[0];
        assert_eq!(leader.partition_id, 7);
        assert_eq!(leader.leader_addr, "a:1");
        assert_eq!(leader.leader_tiny_delete_record_file_size, 240);
        assert_eq!(leader.extents_to_be_created, vec![info(1026, 10)]);
        assert_eq!(leader.extents_to_be_repaired, vec![info(1025, 80)]);
        assert_eq!(leader.extents_to_be_repaired_source[&1025], "b:1");
        assert_eq!(leader.extents_to_be_repaired_source[&1026], "b:1");

        assert!(tasks[1].is_empty());

        let c = &tasks[2];
        assert_eq!(c.extents_to_be_created, vec![info(1025, 80), info(1026, 10)]);
        assert_eq!(c.extents_to_be_repaired, vec![info(1024, 100)]);
        // Equal sizes on a and b: the leader wins.
        assert_eq!(c.extents_to_be_repaired_source[&1024], "a:1");
    }

    #[test]
    fn skipped_extents_are_left_out() {
        let replicas = vec![
            replica("a:1", vec![info(1024, 100)]),
            replica("b:1", vec![info(1024, 10), info(1030, 10)]),
        ];

        let tasks = build_repair_tasks(7, &replicas, &|extent_id| extent_id == 1030);

        assert!(tasks[0].is_empty());
        assert_eq!(tasks[1].extents_to_be_repaired, vec![info(1024, 100)]);
    }

    #[test]
    fn converged_replicas_get_empty_tasks() {
        let replicas = vec![
            replica("a:1", vec![info(1, 4096), info(1024, 100)]),
            replica("b:1", vec![info(1, 4096), info(1024, 100)]),
        ];

        let tasks = build_repair_tasks(7, &replicas, &|_| false);

        assert!(tasks.iter().all(RepairTask::is_empty));
    }
}
