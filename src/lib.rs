pub mod config;
pub mod page_cache;
pub mod storage;

pub use config::CacheConfig;
pub use page_cache::PageCache;
pub use storage::{CacheError, CacheResult, MemoryPageStore, PageId, PageManager, PageStore};
