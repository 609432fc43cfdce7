//! Storage layer for the page cache.
//!
//! This module provides the pieces the [`PageCache`](crate::PageCache) is built
//! from:
//!
//! - **Page**: a page number plus a fixed-size byte buffer
//! - **PageStore**: the raw page store the cache sits on top of, with a
//!   file-backed [`PageManager`] and a shared in-memory [`MemoryPageStore`]
//! - **SlotCache**: a fixed number of cache slots with LRU replacement
//! - **Journal**: the fixed-record write-ahead log and its crash recovery

pub mod buffer;
pub mod disk;
pub mod error;
pub mod journal;
pub mod page;

pub use buffer::{CacheStats, SlotCache, SlotId};
pub use disk::{MemoryPageStore, PageManager, PageStore};
pub use error::{CacheError, CacheResult, StoreError, StoreResult};
pub use journal::{Journal, JournalRecord, JournalTag, RecoveryStats};
pub use page::{Page, PageId};
