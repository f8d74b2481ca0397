use crate::storage::extent_store::{
    is_tiny_extent, ExtentId, ExtentInfo, ExtentStore, ExtentStoreFactory, TINY_EXTENT_COUNT, TINY_EXTENT_START_ID,
};
use crate::storage::TinyDeleteRecord;
use bytes::{Bytes, BytesMut};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::convert::TryFrom;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// Extent data is held in RAM. Good enough to run a partition end to end and for tests; a real
// deployment plugs in its own on-disk engine through `ExtentStore`.
pub struct InMemoryExtentStore {
    inner: Mutex<Inner>,
}

struct Inner {
    extents: BTreeMap<ExtentId, ExtentData>,
    recent_deletes: HashSet<ExtentId>,
    delete_log: BytesMut,
    logged_records: HashSet<TinyDeleteRecord>,
    pending_playback: Vec<TinyDeleteRecord>,
    finish_load: bool,
    closed: bool,
}

struct ExtentData {
    data: Vec<u8>,
    modify_time: i64,
}

impl ExtentData {
    fn empty() -> Self {
        ExtentData {
            data: Vec::new(),
            modify_time: chrono::Utc::now().timestamp(),
        }
    }

    fn info(&self, extent_id: ExtentId) -> ExtentInfo {
        ExtentInfo {
            extent_id,
            size: self.data.len() as u64,
            crc: crc32fast::hash(&self.data),
            modify_time: self.modify_time,
        }
    }

    fn punch_hole(&mut self, offset: u64, size: u64) {
        let len = self.data.len() as u64;
        let start = offset.min(len) as usize;
        let end = offset.saturating_add(size).min(len) as usize;
        for b in &mut self.data[start..end] {
            *b = 0;
        }
    }
}

impl InMemoryExtentStore {
    /// A store whose headers are already loaded, with all tiny extents pre-allocated.
    pub fn new() -> Self {
        let mut extents = BTreeMap::new();
        for extent_id in TINY_EXTENT_START_ID..TINY_EXTENT_START_ID + TINY_EXTENT_COUNT {
            extents.insert(extent_id, ExtentData::empty());
        }

        InMemoryExtentStore {
            inner: Mutex::new(Inner {
                extents,
                recent_deletes: HashSet::new(),
                delete_log: BytesMut::new(),
                logged_records: HashSet::new(),
                pending_playback: Vec::new(),
                finish_load: true,
                closed: false,
            }),
        }
    }

    /// Same as `new()` but reports that headers are still loading until `load()` is called.
    pub fn new_loading() -> Self {
        let store = Self::new();
        store.lock("new_loading").finish_load = false;
        store
    }

    pub fn set_modify_time(&self, extent_id: ExtentId, modify_time: i64) {
        if let Some(extent) = self.lock("set_modify_time").extents.get_mut(&extent_id) {
            extent.modify_time = modify_time;
        }
    }

    pub fn normal_extent_ids(&self) -> Vec<ExtentId> {
        self.lock("normal_extent_ids")
            .extents
            .keys()
            .copied()
            .filter(|id| !is_tiny_extent(*id))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.lock("is_closed").closed
    }

    fn reopen(&self) {
        self.lock("reopen").closed = false;
    }

    fn lock(&self, caller: &str) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|_| panic!("InMemoryExtentStore.{}() mutex guard poison", caller))
    }

    fn open_inner(&self, caller: &str) -> io::Result<std::sync::MutexGuard<'_, Inner>> {
        let inner = self.lock(caller);
        if inner.closed {
            return Err(io::Error::new(io::ErrorKind::Other, "extent store is closed"));
        }
        Ok(inner)
    }
}

impl Default for InMemoryExtentStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Largest extent an in-memory store will grow to.
const MAX_EXTENT_SIZE: u64 = 1 << 32;

fn write_range(offset: u64, len: usize) -> Option<(usize, usize)> {
    let end = offset.checked_add(len as u64)?;
    if end > MAX_EXTENT_SIZE {
        return None;
    }
    Some((usize::try_from(offset).ok()?, usize::try_from(end).ok()?))
}

fn not_found(extent_id: ExtentId) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("extent {} does not exist", extent_id))
}

impl Inner {
    fn append_record_once(&mut self, record: TinyDeleteRecord) -> bool {
        if !self.logged_records.insert(record) {
            return false;
        }
        record.encode_to(&mut self.delete_log);
        true
    }
}

impl ExtentStore for InMemoryExtentStore {
    fn create(&self, extent_id: ExtentId, is_tiny: bool) -> io::Result<()> {
        let mut inner = self.open_inner("create")?;
        if inner.extents.contains_key(&extent_id) {
            if is_tiny {
                return Ok(());
            }
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("extent {} already exists", extent_id),
            ));
        }
        inner.recent_deletes.remove(&extent_id);
        inner.extents.insert(extent_id, ExtentData::empty());
        Ok(())
    }

    fn read(&self, extent_id: ExtentId, offset: u64, size: u64) -> io::Result<(Bytes, u32)> {
        let inner = self.open_inner("read")?;
        let extent = inner.extents.get(&extent_id).ok_or_else(|| not_found(extent_id))?;

        let end = offset.saturating_add(size);
        if end > extent.data.len() as u64 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "read [{}, {}) past end of extent {} of size {}",
                    offset,
                    end,
                    extent_id,
                    extent.data.len()
                ),
            ));
        }

        let bytes = Bytes::copy_from_slice(&extent.data[offset as usize..end as usize]);
        let crc = crc32fast::hash(&bytes);
        Ok((bytes, crc))
    }

    fn write(&self, extent_id: ExtentId, offset: u64, data: &[u8]) -> io::Result<()> {
        let mut inner = self.open_inner("write")?;
        let extent = inner.extents.get_mut(&extent_id).ok_or_else(|| not_found(extent_id))?;

        let (start, end) = match write_range(offset, data.len()) {
            Some(range) => range,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "write of {} bytes at offset {} exceeds the addressable size of extent {}",
                        data.len(),
                        offset,
                        extent_id
                    ),
                ))
            }
        };
        if extent.data.len() < end {
            extent.data.resize(end, 0);
        }
        extent.data[start..end].copy_from_slice(data);
        extent.modify_time = chrono::Utc::now().timestamp();
        Ok(())
    }

    fn mark_delete(&self, extent_id: ExtentId, offset: u64, size: u64) -> io::Result<()> {
        let mut inner = self.open_inner("mark_delete")?;

        if is_tiny_extent(extent_id) {
            let extent = inner.extents.get_mut(&extent_id).ok_or_else(|| not_found(extent_id))?;
            extent.punch_hole(offset, size);
            inner.append_record_once(TinyDeleteRecord::new(extent_id, offset, size));
        } else if inner.extents.remove(&extent_id).is_some() {
            inner.recent_deletes.insert(extent_id);
        }
        Ok(())
    }

    fn has_extent(&self, extent_id: ExtentId) -> bool {
        self.lock("has_extent").extents.contains_key(&extent_id)
    }

    fn is_recent_delete(&self, extent_id: ExtentId) -> bool {
        self.lock("is_recent_delete").recent_deletes.contains(&extent_id)
    }

    fn is_finish_load(&self) -> bool {
        self.lock("is_finish_load").finish_load
    }

    fn load(&self) -> io::Result<()> {
        self.open_inner("load")?.finish_load = true;
        Ok(())
    }

    fn walk_extents_info(&self, visitor: &mut dyn FnMut(&ExtentInfo)) {
        let inner = self.lock("walk_extents_info");
        for (extent_id, extent) in inner.extents.iter() {
            visitor(&extent.info(*extent_id));
        }
    }

    fn extent_info(&self, extent_id: ExtentId) -> Option<ExtentInfo> {
        self.lock("extent_info")
            .extents
            .get(&extent_id)
            .map(|extent| extent.info(extent_id))
    }

    fn extent_count(&self) -> usize {
        self.lock("extent_count").extents.len()
    }

    fn used_size(&self) -> u64 {
        self.lock("used_size")
            .extents
            .values()
            .map(|extent| extent.data.len() as u64)
            .sum()
    }

    fn tiny_delete_record_cursor(&self) -> u64 {
        self.lock("tiny_delete_record_cursor").delete_log.len() as u64
    }

    fn read_tiny_delete_records(&self, offset: u64, max_size: u64) -> io::Result<Bytes> {
        let inner = self.open_inner("read_tiny_delete_records")?;
        let len = inner.delete_log.len() as u64;
        if offset >= len {
            return Ok(Bytes::new());
        }
        let end = offset.saturating_add(max_size).min(len);
        Ok(Bytes::copy_from_slice(&inner.delete_log[offset as usize..end as usize]))
    }

    fn persist_tiny_delete_record(&self, record: &TinyDeleteRecord) -> io::Result<()> {
        let mut inner = self.open_inner("persist_tiny_delete_record")?;
        if inner.append_record_once(*record) {
            inner.pending_playback.push(*record);
        }
        Ok(())
    }

    fn playback_tiny_delete(&self) -> io::Result<()> {
        let mut inner = self.open_inner("playback_tiny_delete")?;
        let pending = std::mem::take(&mut inner.pending_playback);
        for record in pending.into_iter().filter(|r| is_tiny_extent(r.extent_id)) {
            if let Some(extent) = inner.extents.get_mut(&record.extent_id) {
                extent.punch_hole(record.offset, record.size);
            }
        }
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        self.open_inner("flush").map(|_| ())
    }

    fn close(&self) {
        self.lock("close").closed = true;
    }
}

/// Hands out one `InMemoryExtentStore` per partition directory and keeps it across close and
/// reopen, so a partition can be stopped and loaded again within one process.
#[derive(Default)]
pub struct InMemoryExtentStoreFactory {
    stores: Mutex<HashMap<PathBuf, Arc<InMemoryExtentStore>>>,
}

impl InMemoryExtentStoreFactory {
    pub fn new() -> Self {
        InMemoryExtentStoreFactory::default()
    }

    pub fn store(&self, dir: &Path) -> Option<Arc<InMemoryExtentStore>> {
        self.stores
            .lock()
            .expect("InMemoryExtentStoreFactory.store() mutex guard poison")
            .get(dir)
            .cloned()
    }
}

impl ExtentStoreFactory for InMemoryExtentStoreFactory {
    fn open(&self, dir: &Path, _partition_id: u64, is_create: bool) -> io::Result<Arc<dyn ExtentStore>> {
        let mut stores = self
            .stores
            .lock()
            .expect("InMemoryExtentStoreFactory.open() mutex guard poison");

        if is_create {
            let store = Arc::new(InMemoryExtentStore::new_loading());
            stores.insert(dir.to_path_buf(), store.clone());
            return Ok(store);
        }

        let store = stores
            .entry(dir.to_path_buf())
            .or_insert_with(|| Arc::new(InMemoryExtentStore::new_loading()))
            .clone();
        store.reopen();
        Ok(store)
    }
}
