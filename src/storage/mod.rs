mod extent_store;
mod in_memory;
mod tiny_delete_record;

pub use extent_store::extents_of_type;
pub use extent_store::is_tiny_extent;
pub use extent_store::ExtentId;
pub use extent_store::ExtentInfo;
pub use extent_store::ExtentStore;
pub use extent_store::ExtentStoreFactory;
pub use extent_store::ExtentType;
pub use extent_store::MAX_EXTENT_COUNT;
pub use extent_store::MIN_NORMAL_EXTENT_ID;
pub use extent_store::PAGE_SIZE;
pub use extent_store::TINY_EXTENT_COUNT;
pub use extent_store::TINY_EXTENT_START_ID;
pub use in_memory::InMemoryExtentStore;
pub use in_memory::InMemoryExtentStoreFactory;
pub use tiny_delete_record::RecordFormatError;
pub use tiny_delete_record::TinyDeleteRecord;
pub use tiny_delete_record::TINY_DELETE_RECORD_SIZE;
