use crate::storage::TinyDeleteRecord;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::sync::Arc;

pub type ExtentId = u64;

/// Tiny extents are pre-allocated with ids in `[TINY_EXTENT_START_ID, TINY_EXTENT_START_ID + TINY_EXTENT_COUNT)`.
pub const TINY_EXTENT_START_ID: ExtentId = 1;
pub const TINY_EXTENT_COUNT: u64 = 64;
/// Normal extent ids are allocated from here upward.
pub const MIN_NORMAL_EXTENT_ID: ExtentId = 1024;
pub const PAGE_SIZE: u64 = 4096;
/// Once a partition holds this many extents it stops accepting new writes.
pub const MAX_EXTENT_COUNT: usize = 20000;

pub fn is_tiny_extent(extent_id: ExtentId) -> bool {
    extent_id >= TINY_EXTENT_START_ID && extent_id < TINY_EXTENT_START_ID + TINY_EXTENT_COUNT
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExtentType {
    Tiny,
    Normal,
}

impl ExtentType {
    pub fn of(extent_id: ExtentId) -> Self {
        if is_tiny_extent(extent_id) {
            ExtentType::Tiny
        } else {
            ExtentType::Normal
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExtentInfo {
    pub extent_id: ExtentId,
    pub size: u64,
    pub crc: u32,
    /// Unix seconds of the last modification.
    pub modify_time: i64,
}

/// ExtentStore is the storage engine a partition sits on. It owns extent files, their headers,
/// and the tiny extent delete record log. Implementations do their own locking; every method
/// takes `&self` so a store can be shared between the consensus engine's apply path, repair
/// workers and the read path.
///
/// Once `close()` has been called, every fallible method returns an error.
pub trait ExtentStore: Send + Sync {
    /// Create an empty extent. Tiny extents are pre-allocated, so creating one that already
    /// exists is not an error.
    fn create(&self, extent_id: ExtentId, is_tiny: bool) -> io::Result<()>;

    /// Read `size` bytes at `offset`, returning the bytes and their CRC32.
    fn read(&self, extent_id: ExtentId, offset: u64, size: u64) -> io::Result<(Bytes, u32)>;

    fn write(&self, extent_id: ExtentId, offset: u64, data: &[u8]) -> io::Result<()>;

    /// Normal extents are removed entirely; tiny extents get a hole punched at `[offset, offset+size)`
    /// and the hole is appended to the tiny delete record log.
    fn mark_delete(&self, extent_id: ExtentId, offset: u64, size: u64) -> io::Result<()>;

    fn has_extent(&self, extent_id: ExtentId) -> bool;

    /// True if the extent was deleted recently enough that a repair must not bring it back.
    fn is_recent_delete(&self, extent_id: ExtentId) -> bool;

    /// True once extent headers have been fully loaded after startup.
    fn is_finish_load(&self) -> bool;

    /// Force extent headers to load now.
    fn load(&self) -> io::Result<()>;

    fn walk_extents_info(&self, visitor: &mut dyn FnMut(&ExtentInfo));

    fn extent_info(&self, extent_id: ExtentId) -> Option<ExtentInfo>;

    fn extent_count(&self) -> usize;

    fn used_size(&self) -> u64;

    /// Length in bytes of the tiny delete record log.
    fn tiny_delete_record_cursor(&self) -> u64;

    /// Read up to `max_size` bytes of the tiny delete record log starting at `offset`.
    fn read_tiny_delete_records(&self, offset: u64, max_size: u64) -> io::Result<Bytes>;

    /// Append a record to the log without touching extent data. Records that are already in
    /// the log are not appended twice.
    fn persist_tiny_delete_record(&self, record: &TinyDeleteRecord) -> io::Result<()>;

    /// Apply every record persisted via `persist_tiny_delete_record` that has not been applied.
    fn playback_tiny_delete(&self) -> io::Result<()>;

    fn flush(&self) -> io::Result<()>;

    fn close(&self);
}

/// Opens the extent store that lives in a partition directory.
pub trait ExtentStoreFactory: Send + Sync {
    fn open(&self, dir: &Path, partition_id: u64, is_create: bool) -> io::Result<Arc<dyn ExtentStore>>;
}

/// Collect every extent of one class.
pub fn extents_of_type(store: &dyn ExtentStore, extent_type: ExtentType) -> Vec<ExtentInfo> {
    let mut extents = Vec::new();
    store.walk_extents_info(&mut |info| {
        if ExtentType::of(info.extent_id) == extent_type {
            extents.push(info.clone());
        }
    });
    extents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_id_classes() {
        fn run(expected: ExtentType, extent_id: ExtentId) {
            assert_eq!(expected, ExtentType::of(extent_id), "extent {}", extent_id);
        }

        run(ExtentType::Normal, 0);
        run(ExtentType::Tiny, 1);
        run(ExtentType::Tiny, 64);
        run(ExtentType::Normal, 65);
        run(ExtentType::Normal, MIN_NORMAL_EXTENT_ID);
    }
}
