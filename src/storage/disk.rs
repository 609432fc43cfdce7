//! Raw page stores the cache sits on top of.

pub mod memory;
pub mod page_manager;

pub use memory::MemoryPageStore;
pub use page_manager::PageManager;

use crate::storage::error::StoreResult;
use crate::storage::page::PageId;

/// Page-addressed storage underneath the cache.
///
/// Implementations own their durability and allocation strategy. The cache
/// never retries a failed call.
pub trait PageStore {
    /// Bytes per page, fixed for the lifetime of the store.
    fn page_size(&self) -> usize;

    /// Return a fresh page number.
    fn allocate_page(&mut self) -> StoreResult<PageId>;

    /// Release a page number so it can be handed out again.
    fn deallocate_page(&mut self, page_id: PageId) -> StoreResult<()>;

    /// Fill `buf` with the content of `page_id`. Fails if the page is unknown.
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> StoreResult<()>;

    /// Persist the full content of `page_id`.
    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> StoreResult<()>;

    /// Make all prior writes durable.
    fn flush(&mut self) -> StoreResult<()>;

    /// Release resources. Later calls fail with `StoreError::Closed`.
    fn close(&mut self) -> StoreResult<()>;
}
