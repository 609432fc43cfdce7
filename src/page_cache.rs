use crate::config::CacheConfig;
use crate::storage::{
    CacheError, CacheResult, CacheStats, Journal, Page, PageId, PageStore, RecoveryStats,
    SlotCache, StoreError,
};
use log::{debug, info};

/// Durable page cache over a [`PageStore`].
///
/// Reads are served from a fixed number of LRU-managed slots. Every write is
/// logged to the journal before it reaches the store, and the journal is
/// replayed from its last checkpoint when the cache is opened again after a
/// crash.
///
/// Dropping a `PageCache` without calling [`close`](Self::close) leaves the
/// journal as a crash would.
pub struct PageCache<S: PageStore> {
    store: S,
    cache: SlotCache,
    journal: Journal,
    page_size: usize,
    checkpoint_threshold: usize,
    writes_since_checkpoint: usize,
    recovery: Option<RecoveryStats>,
}

impl<S: PageStore> PageCache<S> {
    /// Open the cache on top of `store`, recovering from the journal if one
    /// already exists at the configured path.
    pub fn open(mut store: S, config: &CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        if store.page_size() != config.page_size() {
            return Err(CacheError::Configuration(format!(
                "store page size {} does not match configured page size {}",
                store.page_size(),
                config.page_size()
            )));
        }

        let (journal, recovery) = Journal::open(
            config.journal_path(),
            config.page_size(),
            config.sync_on_append,
            &mut store,
        )?;

        info!(
            "Opened page cache with {} slots of {} bytes, journal {:?}",
            config.slot_count(),
            config.page_size(),
            journal.path()
        );

        Ok(Self {
            store,
            cache: SlotCache::with_lru(config.slot_count()),
            journal,
            page_size: config.page_size(),
            checkpoint_threshold: config.checkpoint_threshold,
            writes_since_checkpoint: 0,
            recovery,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of cache slots.
    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Replay statistics, or None if the journal was created by this open.
    pub fn recovery_stats(&self) -> Option<RecoveryStats> {
        self.recovery
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.cache.contains(page_id)
    }

    pub fn is_dirty(&self, page_id: PageId) -> bool {
        self.cache.is_dirty(page_id)
    }

    /// Resident page numbers in ascending order.
    pub fn resident_pages(&self) -> Vec<PageId> {
        self.cache.resident_pages()
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn allocate_page(&mut self) -> CacheResult<PageId> {
        Ok(self.store.allocate_page()?)
    }

    /// Drop `page_id` from the cache without writing it back, then release it
    /// in the store.
    pub fn deallocate_page(&mut self, page_id: PageId) -> CacheResult<()> {
        self.cache.release(page_id);
        self.store.deallocate_page(page_id)?;
        Ok(())
    }

    /// Copy the cached content of `page_id` into `buf`, loading it from the
    /// store on a miss.
    pub fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> CacheResult<()> {
        self.check_len(buf.len())?;

        let slot_id = match self.cache.lookup(page_id) {
            Some(slot_id) => slot_id,
            None => {
                let slot_id = self.cache.acquire_free_slot(&mut self.store)?;
                let mut page = Page::new(page_id, self.page_size);
                self.store.read_page(page_id, page.data_mut())?;
                self.cache.install(slot_id, page, false);
                slot_id
            }
        };

        let page = self
            .cache
            .page(slot_id)
            .ok_or(StoreError::PageNotFound(page_id))?;
        buf.copy_from_slice(page.data());
        self.cache.touch(slot_id);

        Ok(())
    }

    /// Log `data` as the new content of `page_id` and write it through to the
    /// store.
    ///
    /// Once `checkpoint_threshold` writes have been counted, the next write
    /// runs a full flush before it is logged.
    pub fn write_page(&mut self, page_id: PageId, data: &[u8]) -> CacheResult<()> {
        self.check_len(data.len())?;

        if self.writes_since_checkpoint == self.checkpoint_threshold {
            self.writes_since_checkpoint = 0;
            debug!("Write threshold {} reached, checkpointing", self.checkpoint_threshold);
            self.flush()?;
        } else {
            self.writes_since_checkpoint += 1;
        }

        self.journal.append_change(page_id, data)?;

        let slot_id = match self.cache.lookup(page_id) {
            Some(slot_id) => {
                self.cache.overwrite(slot_id, data);
                slot_id
            }
            None => {
                let slot_id = self.cache.acquire_free_slot(&mut self.store)?;
                self.cache.install(slot_id, Page::from_data(page_id, data), true);
                slot_id
            }
        };
        self.cache.flush_slot(slot_id, &mut self.store)?;
        self.cache.touch(slot_id);

        Ok(())
    }

    /// Write back every dirty page, flush the store and append a checkpoint.
    pub fn flush(&mut self) -> CacheResult<()> {
        let written = self.cache.flush_all(&mut self.store)?;
        self.store.flush()?;
        self.journal.checkpoint()?;
        debug!("Checkpoint taken after writing back {} pages", written);
        Ok(())
    }

    /// Flush, close the store and finish the journal with `DBCLOSE`.
    pub fn close(mut self) -> CacheResult<()> {
        self.flush()?;
        self.store.close()?;
        self.journal.close()?;

        let stats = self.cache.stats();
        info!(
            "Closed page cache: {} hits, {} misses, {} evictions",
            stats.hits, stats.misses, stats.evictions
        );
        Ok(())
    }

    fn check_len(&self, len: usize) -> CacheResult<()> {
        if len != self.page_size {
            return Err(CacheError::InvalidPageSize {
                expected: self.page_size,
                actual: len,
            });
        }
        Ok(())
    }
}
