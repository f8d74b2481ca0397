use crate::storage::{ExtentId, ExtentStore, PAGE_SIZE};
use std::io;

/// The tail of an extent whose bytes may not have been durable at the last confirmed flush.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct IssueFragment {
    pub extent_id: ExtentId,
    pub offset: u64,
    pub size: u64,
}

impl IssueFragment {
    /// The last page of an extent of `extent_size` bytes. A size that ends on a page boundary
    /// yields the whole last page rather than an empty one.
    pub fn tail_of(extent_id: ExtentId, extent_size: u64) -> Self {
        let offset = if extent_size % PAGE_SIZE == 0 {
            (extent_size / PAGE_SIZE - 1) * PAGE_SIZE
        } else {
            (extent_size / PAGE_SIZE) * PAGE_SIZE
        };

        IssueFragment {
            extent_id,
            offset,
            size: extent_size - offset,
        }
    }

    pub fn overlaps(&self, offset: u64, size: u64) -> bool {
        offset < self.offset + self.size && self.offset < offset.saturating_add(size)
    }
}

/// Find the extents written after `latest_flush_time` (unix seconds, one second of slack) and
/// return their tail fragments. A zero flush time means no flush was ever recorded and nothing
/// is reported.
pub fn scan_issue_fragments(store: &dyn ExtentStore, latest_flush_time: i64) -> io::Result<Vec<IssueFragment>> {
    if latest_flush_time == 0 {
        return Ok(Vec::new());
    }
    store.load()?;

    let safety_time = latest_flush_time - 1;
    let mut fragments = Vec::new();
    store.walk_extents_info(&mut |info| {
        if info.size > 0 && info.modify_time > safety_time {
            fragments.push(IssueFragment::tail_of(info.extent_id, info.size));
        }
    });
    Ok(fragments)
}
