use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use tokio::time::Duration;

/// Tunables for every partition on a node. Unset values fall back to production defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PartitionOptions {
    pub repair_interval: Option<Duration>,
    pub crc_validate_interval: Option<Duration>,
    pub volume_info_retry_interval: Option<Duration>,
    pub persist_interval: Option<Duration>,
    pub truncate_interval: Option<Duration>,
    pub replica_refresh_interval: Option<Duration>,
    pub usage_refresh_interval: Option<Duration>,
    pub recover_check_interval: Option<Duration>,
    pub repair_parallelism: Option<usize>,
    pub repair_read_chunk_size: Option<u64>,
    pub peer_retry_attempts: Option<usize>,
    pub peer_retry_backoff: Option<Duration>,
    pub tiny_delete_min_sync_interval: Option<Duration>,
    pub tiny_delete_min_sync_size: Option<u64>,
    pub tiny_delete_full_sync_interval: Option<Duration>,
    pub tiny_delete_max_batch_size: Option<u64>,
}

#[derive(Clone, Debug)]
pub(crate) struct PartitionOptionsValidated {
    pub repair_interval: Duration,
    pub crc_validate_interval: Duration,
    pub volume_info_retry_interval: Duration,
    pub persist_interval: Duration,
    pub truncate_interval: Duration,
    pub replica_refresh_interval: Duration,
    pub usage_refresh_interval: Duration,
    pub recover_check_interval: Duration,
    pub repair_parallelism: usize,
    pub repair_read_chunk_size: u64,
    pub peer_retry_attempts: usize,
    pub peer_retry_backoff: Duration,
    pub tiny_delete_min_sync_interval: Duration,
    pub tiny_delete_min_sync_size: u64,
    pub tiny_delete_full_sync_interval: Duration,
    pub tiny_delete_max_batch_size: u64,
}

const TINY_DELETE_RECORD_SIZE: u64 = crate::storage::TINY_DELETE_RECORD_SIZE;

impl PartitionOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.repair_parallelism == 0 {
            return Err("Repair parallelism must be at least 1");
        }
        if self.repair_read_chunk_size == 0 {
            return Err("Repair read chunk size must be greater than 0");
        }
        if self.peer_retry_attempts == 0 {
            return Err("Peer RPCs must be attempted at least once");
        }
        if self.tiny_delete_max_batch_size < TINY_DELETE_RECORD_SIZE
            || self.tiny_delete_max_batch_size % TINY_DELETE_RECORD_SIZE != 0
        {
            return Err("Tiny delete batch size must be a positive multiple of the record size");
        }
        if self.repair_interval.as_millis() == 0 || self.persist_interval.as_millis() == 0 {
            return Err("Scheduler intervals must be greater than 0");
        }

        Ok(())
    }
}

impl TryFrom<PartitionOptions> for PartitionOptionsValidated {
    type Error = &'static str;

    fn try_from(options: PartitionOptions) -> Result<Self, Self::Error> {
        let values = PartitionOptionsValidated {
            repair_interval: options.repair_interval.unwrap_or(Duration::from_secs(60)),
            crc_validate_interval: options
                .crc_validate_interval
                .unwrap_or(Duration::from_secs(24 * 3600)),
            volume_info_retry_interval: options
                .volume_info_retry_interval
                .unwrap_or(Duration::from_secs(60)),
            persist_interval: options.persist_interval.unwrap_or(Duration::from_secs(3600)),
            truncate_interval: options.truncate_interval.unwrap_or(Duration::from_secs(600)),
            replica_refresh_interval: options
                .replica_refresh_interval
                .unwrap_or(Duration::from_secs(600)),
            usage_refresh_interval: options.usage_refresh_interval.unwrap_or(Duration::from_secs(60)),
            recover_check_interval: options.recover_check_interval.unwrap_or(Duration::from_secs(10)),
            repair_parallelism: options.repair_parallelism.unwrap_or(8),
            repair_read_chunk_size: options.repair_read_chunk_size.unwrap_or(128 * 1024),
            peer_retry_attempts: options.peer_retry_attempts.unwrap_or(3),
            peer_retry_backoff: options.peer_retry_backoff.unwrap_or(Duration::from_millis(100)),
            tiny_delete_min_sync_interval: options
                .tiny_delete_min_sync_interval
                .unwrap_or(Duration::from_secs(3600)),
            tiny_delete_min_sync_size: options.tiny_delete_min_sync_size.unwrap_or(4 * 1024 * 1024),
            tiny_delete_full_sync_interval: options
                .tiny_delete_full_sync_interval
                .unwrap_or(Duration::from_secs(8 * 24 * 3600)),
            tiny_delete_max_batch_size: options.tiny_delete_max_batch_size.unwrap_or(2_400_000),
        };

        values.validate()?;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let validated = PartitionOptionsValidated::try_from(PartitionOptions::default()).unwrap();
        assert_eq!(validated.repair_parallelism, 8);
        assert_eq!(validated.repair_interval, Duration::from_secs(60));
        assert_eq!(validated.tiny_delete_min_sync_size, 4 * 1024 * 1024);
        assert_eq!(validated.tiny_delete_max_batch_size % TINY_DELETE_RECORD_SIZE, 0);
    }

    #[test]
    fn invalid_options() {
        fn run(options: PartitionOptions) {
            assert!(PartitionOptionsValidated::try_from(options).is_err());
        }

        run(PartitionOptions {
            repair_parallelism: Some(0),
            ..PartitionOptions::default()
        });
        run(PartitionOptions {
            peer_retry_attempts: Some(0),
            ..PartitionOptions::default()
        });
        run(PartitionOptions {
            tiny_delete_max_batch_size: Some(25),
            ..PartitionOptions::default()
        });
        run(PartitionOptions {
            repair_read_chunk_size: Some(0),
            ..PartitionOptions::default()
        });
    }

    #[test]
    fn options_from_json() {
        let options: PartitionOptions =
            serde_json::from_str(r#"{"repair_parallelism": 2, "peer_retry_backoff": {"secs": 0, "nanos": 5000000}}"#)
                .unwrap();
        let validated = PartitionOptionsValidated::try_from(options).unwrap();
        assert_eq!(validated.repair_parallelism, 2);
        assert_eq!(validated.peer_retry_backoff, Duration::from_millis(5));
    }
}
