use crate::storage::disk::PageStore;
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::page::PageId;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// In-memory page store.
///
/// Clones share the same pages, so a caller can hand one handle to a
/// [`PageCache`](crate::PageCache) and keep another to look at what actually
/// reached the store. The write and flush counters exist for the same reason.
#[derive(Debug, Clone)]
pub struct MemoryPageStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug)]
struct MemoryInner {
    page_size: usize,
    pages: HashMap<PageId, Box<[u8]>>,
    free_pages: BTreeSet<PageId>,
    next_page: u64,
    writes: u64,
    flushes: u64,
    closed: bool,
}

impl MemoryPageStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner {
                page_size,
                pages: HashMap::new(),
                free_pages: BTreeSet::new(),
                next_page: 0,
                writes: 0,
                flushes: 0,
                closed: false,
            })),
        }
    }

    /// Copy of the stored content of `page_id`, if the page exists.
    pub fn page(&self, page_id: PageId) -> Option<Vec<u8>> {
        self.inner.lock().pages.get(&page_id).map(|data| data.to_vec())
    }

    /// Number of `write_page` calls served so far.
    pub fn write_count(&self) -> u64 {
        self.inner.lock().writes
    }

    /// Number of `flush` calls served so far.
    pub fn flush_count(&self) -> u64 {
        self.inner.lock().flushes
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Clear the closed flag so the same pages can back a new session.
    pub fn reopen(&self) -> Self {
        self.inner.lock().closed = false;
        self.clone()
    }
}

impl MemoryInner {
    fn check_open(&self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn check_len(&self, len: usize) -> StoreResult<()> {
        if len != self.page_size {
            return Err(StoreError::InvalidPageSize {
                expected: self.page_size,
                actual: len,
            });
        }
        Ok(())
    }
}

impl PageStore for MemoryPageStore {
    fn page_size(&self) -> usize {
        self.inner.lock().page_size
    }

    fn allocate_page(&mut self) -> StoreResult<PageId> {
        let mut inner = self.inner.lock();
        inner.check_open()?;

        let page_id = match inner.free_pages.pop_first() {
            Some(page_id) => page_id,
            None => {
                let page_id = PageId(inner.next_page);
                inner.next_page += 1;
                page_id
            }
        };
        let zeroed = vec![0u8; inner.page_size].into_boxed_slice();
        inner.pages.insert(page_id, zeroed);

        Ok(page_id)
    }

    fn deallocate_page(&mut self, page_id: PageId) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.check_open()?;

        if inner.pages.remove(&page_id).is_none() {
            return Err(StoreError::PageNotFound(page_id));
        }
        inner.free_pages.insert(page_id);

        Ok(())
    }

    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> StoreResult<()> {
        let inner = self.inner.lock();
        inner.check_open()?;
        inner.check_len(buf.len())?;

        let data = inner
            .pages
            .get(&page_id)
            .ok_or(StoreError::PageNotFound(page_id))?;
        buf.copy_from_slice(data);

        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.check_open()?;
        inner.check_len(data.len())?;

        inner.free_pages.remove(&page_id);
        if page_id.0 >= inner.next_page {
            inner.next_page = page_id.0 + 1;
        }
        inner.pages.insert(page_id, data.into());
        inner.writes += 1;

        Ok(())
    }

    fn flush(&mut self) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.check_open()?;
        inner.flushes += 1;
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.check_open()?;
        inner.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_handles() {
        let mut store = MemoryPageStore::new(4);
        let observer = store.clone();

        let page_id = store.allocate_page().unwrap();
        store.write_page(page_id, b"abcd").unwrap();

        assert_eq!(observer.page(page_id), Some(b"abcd".to_vec()));
        assert_eq!(observer.write_count(), 1);
    }

    #[test]
    fn test_allocate_reuses_lowest_free() {
        let mut store = MemoryPageStore::new(4);
        for expected in 0..4 {
            assert_eq!(store.allocate_page().unwrap(), PageId(expected));
        }

        store.deallocate_page(PageId(3)).unwrap();
        store.deallocate_page(PageId(1)).unwrap();
        assert_eq!(store.page(PageId(1)), None);

        assert_eq!(store.allocate_page().unwrap(), PageId(1));
        assert_eq!(store.page(PageId(1)), Some(vec![0u8; 4]));
        assert_eq!(store.allocate_page().unwrap(), PageId(3));
        assert_eq!(store.allocate_page().unwrap(), PageId(4));
    }

    #[test]
    fn test_read_unknown_page() {
        let mut store = MemoryPageStore::new(4);
        let mut buf = [0u8; 4];
        assert!(matches!(
            store.read_page(PageId(0), &mut buf),
            Err(StoreError::PageNotFound(PageId(0)))
        ));
        assert!(store.deallocate_page(PageId(0)).is_err());
    }

    #[test]
    fn test_write_unallocated_page_extends_store() {
        let mut store = MemoryPageStore::new(4);
        store.write_page(PageId(9), b"wxyz").unwrap();
        assert_eq!(store.allocate_page().unwrap(), PageId(10));

        let mut buf = [0u8; 4];
        store.read_page(PageId(9), &mut buf).unwrap();
        assert_eq!(&buf, b"wxyz");
    }

    #[test]
    fn test_close_and_reopen() {
        let mut store = MemoryPageStore::new(4);
        store.write_page(PageId(0), b"abcd").unwrap();
        store.close().unwrap();

        assert!(store.is_closed());
        assert!(matches!(store.flush(), Err(StoreError::Closed)));

        let mut reopened = store.reopen();
        let mut buf = [0u8; 4];
        reopened.read_page(PageId(0), &mut buf).unwrap();
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn test_wrong_buffer_length() {
        let mut store = MemoryPageStore::new(4);
        assert!(matches!(
            store.write_page(PageId(0), b"abc"),
            Err(StoreError::InvalidPageSize { expected: 4, actual: 3 })
        ));
    }
}
