use crate::storage::ExtentId;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Copy, Clone, Debug)]
struct InFlightWrite {
    extent_id: ExtentId,
    offset: u64,
    size: u64,
}

/// Writes that have been proposed to raft but whose proposal has not resolved yet. Readers that
/// overlap one must not trust the local bytes.
#[derive(Default)]
pub(crate) struct InFlightHolder {
    next_seq: AtomicU64,
    writes: Mutex<BTreeMap<u64, InFlightWrite>>,
}

/// Keeps a write registered until dropped.
pub(crate) struct InFlightGuard<'a> {
    holder: &'a InFlightHolder,
    seq: u64,
}

impl InFlightHolder {
    pub fn new() -> Self {
        InFlightHolder::default()
    }

    pub fn register(&self, extent_id: ExtentId, offset: u64, size: u64) -> InFlightGuard<'_> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.writes
            .lock()
            .expect("InFlightHolder.writes mutex poisoned")
            .insert(
                seq,
                InFlightWrite {
                    extent_id,
                    offset,
                    size,
                },
            );
        InFlightGuard { holder: self, seq }
    }

    fn unregister(&self, seq: u64) {
        self.writes
            .lock()
            .expect("InFlightHolder.writes mutex poisoned")
            .remove(&seq);
    }

    pub fn overlaps(&self, extent_id: ExtentId, offset: u64, size: u64) -> bool {
        self.writes
            .lock()
            .expect("InFlightHolder.writes mutex poisoned")
            .values()
            .any(|w| {
                w.extent_id == extent_id
                    && offset < w.offset.saturating_add(w.size)
                    && w.offset < offset.saturating_add(size)
            })
    }

    pub fn len(&self) -> usize {
        self.writes.lock().expect("InFlightHolder.writes mutex poisoned").len()
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.holder.unregister(self.seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_until_released() {
        let holder = InFlightHolder::new();
        let guard = holder.register(1024, 100, 50);

        assert!(holder.overlaps(1024, 120, 1));
        assert!(!holder.overlaps(1024, 150, 10));
        assert!(!holder.overlaps(1025, 120, 1));

        drop(guard);

        assert!(!holder.overlaps(1024, 120, 1));
        assert_eq!(holder.len(), 0);
    }

    #[test]
    fn same_range_registered_twice() {
        let holder = InFlightHolder::new();
        let first = holder.register(1024, 0, 10);
        let second = holder.register(1024, 0, 10);
        assert_eq!(holder.len(), 2);

        drop(first);
        assert!(holder.overlaps(1024, 5, 1));

        drop(second);
        assert!(!holder.overlaps(1024, 5, 1));
    }

    #[test]
    fn ranges_at_the_end_of_the_offset_space() {
        fn run(expected: bool, offset: u64, size: u64) {
            let holder = InFlightHolder::new();
            let _guard = holder.register(1024, u64::MAX - 10, 100);
            assert_eq!(expected, holder.overlaps(1024, offset, size), "[{}, +{})", offset, size);
        }

        run(true, u64::MAX - 1, 1);
        run(true, u64::MAX - 20, 15);
        run(false, u64::MAX - 20, 10);
        run(false, 0, 4096);
    }
}
