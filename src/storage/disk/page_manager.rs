use crate::storage::disk::PageStore;
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::page::PageId;
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// File-backed page store: page `n` lives at byte offset `n * page_size`.
///
/// Deallocated page numbers are kept in memory and handed out again, lowest
/// first, before the file is grown.
pub struct PageManager {
    file: Option<File>,
    page_size: usize,
    free_pages: BTreeSet<PageId>,
}

impl PageManager {
    pub fn create(path: &Path, page_size: usize) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self::with_file(file, page_size))
    }

    pub fn open(path: &Path, page_size: usize) -> StoreResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        Ok(Self::with_file(file, page_size))
    }

    fn with_file(file: File, page_size: usize) -> Self {
        Self {
            file: Some(file),
            page_size,
            free_pages: BTreeSet::new(),
        }
    }

    pub fn num_pages(&self) -> StoreResult<u64> {
        let file_size = self.file()?.metadata()?.len();
        Ok(file_size / self.page_size as u64)
    }

    fn file(&self) -> StoreResult<&File> {
        self.file.as_ref().ok_or(StoreError::Closed)
    }

    fn file_mut(&mut self) -> StoreResult<&mut File> {
        self.file.as_mut().ok_or(StoreError::Closed)
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

    fn page_offset(&self, page_id: PageId) -> u64 {
        page_id.0 * self.page_size as u64
    }
}

impl PageStore for PageManager {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn allocate_page(&mut self) -> StoreResult<PageId> {
        if let Some(page_id) = self.free_pages.pop_first() {
            return Ok(page_id);
        }

        let current_pages = self.num_pages()?;
        let new_size = (current_pages + 1) * self.page_size as u64;
        self.file_mut()?.set_len(new_size)?;

        Ok(PageId(current_pages))
    }

    fn deallocate_page(&mut self, page_id: PageId) -> StoreResult<()> {
        if page_id.0 >= self.num_pages()? || !self.free_pages.insert(page_id) {
            return Err(StoreError::PageNotFound(page_id));
        }
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> StoreResult<()> {
        self.check_len(buf.len())?;

        if page_id.0 >= self.num_pages()? || self.free_pages.contains(&page_id) {
            return Err(StoreError::PageNotFound(page_id));
        }

        let offset = self.page_offset(page_id);
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;

        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> StoreResult<()> {
        self.check_len(data.len())?;

        let offset = self.page_offset(page_id);
        let end = offset + self.page_size as u64;
        // Writing a page makes it live again, even if it was on the free list.
        self.free_pages.remove(&page_id);

        let file = self.file_mut()?;
        if end > file.metadata()?.len() {
            file.set_len(end)?;
        }
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;

        Ok(())
    }

    fn flush(&mut self) -> StoreResult<()> {
        self.file_mut()?.sync_all()?;
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        let file = self.file.take().ok_or(StoreError::Closed)?;
        file.sync_all()?;
        Ok(())
    }
}
