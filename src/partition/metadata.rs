use crate::api::{ConsistencyMode, CreateType, CrossRegionHaType, Learner, Peer};
use crate::partition::PartitionError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

pub const PARTITION_DIR_PREFIX: &str = "datapartition";
pub const EXPIRED_DIR_PREFIX: &str = "expired_";
const METADATA_FILE: &str = "META";
const TEMP_METADATA_FILE: &str = ".meta";
const APPLY_FILE: &str = "APPLY";
const TEMP_APPLY_FILE: &str = ".apply";
pub(crate) const CREATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Contents of a partition's `META` file.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PartitionMetadata {
    #[serde(rename = "VolumeID")]
    pub volume_id: String,
    #[serde(rename = "PartitionID")]
    pub partition_id: u64,
    pub partition_size: u64,
    #[serde(default)]
    pub create_time: String,
    /// Sorted by id.
    #[serde(default)]
    pub peers: Vec<Peer>,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub learners: Vec<Learner>,
    #[serde(default)]
    pub replica_num: u8,
    #[serde(default)]
    pub create_type: CreateType,
    #[serde(rename = "LastTruncateID", default)]
    pub last_truncate_id: u64,
    #[serde(default)]
    pub ha_type: CrossRegionHaType,
    #[serde(default)]
    pub consistency_mode: ConsistencyMode,
    #[serde(default)]
    pub is_catch_up: bool,
    #[serde(default)]
    pub need_server_fault_check: bool,
}

impl PartitionMetadata {
    pub fn validate(&mut self) -> Result<(), PartitionError> {
        self.volume_id = self.volume_id.trim().to_string();
        if self.volume_id.is_empty() || self.partition_id == 0 || self.partition_size == 0 {
            return Err(PartitionError::InvalidMetadata(format!(
                "volume '{}', partition {}, size {}",
                self.volume_id, self.partition_id, self.partition_size
            )));
        }
        Ok(())
    }

    pub fn read_from(dir: &Path) -> Result<Self, PartitionError> {
        let data = fs::read(dir.join(METADATA_FILE))?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn write_to(&self, dir: &Path) -> Result<(), PartitionError> {
        let data = serde_json::to_vec(self)?;
        write_atomically(dir, TEMP_METADATA_FILE, METADATA_FILE, &data)?;
        Ok(())
    }
}

/// Read `APPLY`, returning `(applied, last_truncate)`. The file holds `applied|last_truncate`;
/// older partitions wrote only the applied index, in which case the last truncate index comes
/// from `META`. The larger of the two last truncate indices wins. A missing file means nothing
/// was ever applied.
pub(crate) fn read_apply_file(dir: &Path, meta_last_truncate: u64) -> Result<(u64, u64), PartitionError> {
    let text = match fs::read_to_string(dir.join(APPLY_FILE)) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((0, meta_last_truncate)),
        Err(e) => return Err(e.into()),
    };

    let parse = |s: &str| {
        s.trim()
            .parse::<u64>()
            .map_err(|_| PartitionError::InvalidMetadata(format!("APPLY file holds '{}'", text.trim())))
    };
    let mut parts = text.splitn(2, '|');
    let applied = parse(parts.next().unwrap_or(""))?;
    let last_truncate = match parts.next() {
        Some(cursor) => parse(cursor)?.max(meta_last_truncate),
        None => meta_last_truncate,
    };
    Ok((applied, last_truncate))
}

pub(crate) fn write_apply_file(dir: &Path, applied: u64, last_truncate: u64) -> io::Result<()> {
    let text = format!("{}|{}", applied, last_truncate);
    write_atomically(dir, TEMP_APPLY_FILE, APPLY_FILE, text.as_bytes())
}

/// Write to a temp file, fsync it, then rename it over `name`.
fn write_atomically(dir: &Path, temp_name: &str, name: &str, data: &[u8]) -> io::Result<()> {
    let temp_path = dir.join(temp_name);
    let result = (|| {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&temp_path, dir.join(name))
    })();
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

pub fn partition_dir_name(partition_id: u64, partition_size: u64) -> String {
    format!("{}_{}_{}", PARTITION_DIR_PREFIX, partition_id, partition_size)
}

/// Returns `(partition id, partition size)` for a name made by `partition_dir_name`.
pub fn parse_partition_dir_name(name: &str) -> Option<(u64, u64)> {
    let mut parts = name.split('_');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(PARTITION_DIR_PREFIX), Some(id), Some(size), None) => Some((id.parse().ok()?, size.parse().ok()?)),
        _ => None,
    }
}

pub fn expired_dir_name(dir_name: &str, unix_secs: i64) -> String {
    format!("{}{}_{}", EXPIRED_DIR_PREFIX, dir_name, unix_secs)
}
