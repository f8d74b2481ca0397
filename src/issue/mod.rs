mod fragment;
mod tracker;

pub use fragment::scan_issue_fragments;
pub use fragment::IssueFragment;
pub use tracker::FixReport;
pub use tracker::IssueTracker;
