pub mod lru;
pub mod replacer;

use crate::storage::disk::PageStore;
use crate::storage::error::{CacheError, CacheResult};
use crate::storage::page::{Page, PageId};
use log::{debug, trace};
use replacer::Replacer;
use std::collections::HashMap;

pub use replacer::SlotId;

/// A cache slot: at most one page plus its dirty flag.
#[derive(Debug, Default)]
struct Slot {
    page: Option<Page>,
    is_dirty: bool,
}

/// Counters describing how the cache has been used.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found the page resident.
    pub hits: u64,
    /// Lookups that did not.
    pub misses: u64,
    /// Occupied slots reassigned to another page.
    pub evictions: u64,
    /// Dirty pages written back to the store.
    pub pages_written: u64,
}

/// Fixed array of slots with a replacement policy and a page table.
///
/// The page table maps exactly the occupied slots. Empty slots always sit at
/// the cold end of the replacement order, so the victim is an empty slot
/// whenever one exists.
#[derive(Debug)]
pub struct SlotCache {
    slots: Vec<Slot>,
    page_table: HashMap<PageId, SlotId>,
    replacer: Box<dyn Replacer>,
    stats: CacheStats,
}

impl SlotCache {
    pub fn new(replacer: Box<dyn Replacer>) -> Self {
        let capacity = replacer.capacity();
        Self {
            slots: (0..capacity).map(|_| Slot::default()).collect(),
            page_table: HashMap::with_capacity(capacity),
            replacer,
            stats: CacheStats::default(),
        }
    }

    /// Slot cache with `capacity` slots and LRU replacement.
    pub fn with_lru(capacity: usize) -> Self {
        Self::new(Box::new(lru::LruReplacer::new(capacity)))
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Slot holding `page_id`, counted as a hit or a miss.
    pub fn lookup(&mut self, page_id: PageId) -> Option<SlotId> {
        let slot_id = self.page_table.get(&page_id).copied();
        match slot_id {
            Some(_) => self.stats.hits += 1,
            None => self.stats.misses += 1,
        }
        slot_id
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.page_table.contains_key(&page_id)
    }

    pub fn is_dirty(&self, page_id: PageId) -> bool {
        self.page_table
            .get(&page_id)
            .is_some_and(|&slot_id| self.slots[slot_id].is_dirty)
    }

    /// Resident page numbers in ascending order.
    pub fn resident_pages(&self) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self.page_table.keys().copied().collect();
        pages.sort();
        pages
    }

    pub fn resident_count(&self) -> usize {
        self.page_table.len()
    }

    pub fn page(&self, slot_id: SlotId) -> Option<&Page> {
        self.slots.get(slot_id).and_then(|slot| slot.page.as_ref())
    }

    /// Mark a slot as most recently used.
    pub fn touch(&mut self, slot_id: SlotId) {
        self.replacer.touch(slot_id);
    }

    /// Return an empty slot, evicting the least recently used page if needed.
    ///
    /// A dirty victim is written back to `store` before it is dropped. If that
    /// write fails the victim stays resident and dirty.
    pub fn acquire_free_slot<S: PageStore + ?Sized>(
        &mut self,
        store: &mut S,
    ) -> CacheResult<SlotId> {
        let slot_id = self
            .replacer
            .victim()
            .ok_or_else(|| CacheError::Configuration("slot cache has no slots".to_string()))?;

        if self.slots[slot_id].page.is_some() {
            self.flush_slot(slot_id, store)?;

            let slot = &mut self.slots[slot_id];
            if let Some(page) = slot.page.take() {
                self.page_table.remove(&page.id());
                self.stats.evictions += 1;
                debug!("Evicted page {} from slot {}", page.id(), slot_id);
            }
        }

        Ok(slot_id)
    }

    /// Place `page` into an empty slot and record it in the page table.
    pub fn install(&mut self, slot_id: SlotId, page: Page, is_dirty: bool) {
        debug_assert!(self.slots[slot_id].page.is_none(), "slot {} is occupied", slot_id);
        self.page_table.insert(page.id(), slot_id);
        self.slots[slot_id] = Slot {
            page: Some(page),
            is_dirty,
        };
    }

    /// Replace the content of an occupied slot and mark it dirty.
    ///
    /// Returns false if the slot is empty.
    pub fn overwrite(&mut self, slot_id: SlotId, data: &[u8]) -> bool {
        let slot = &mut self.slots[slot_id];
        match slot.page.as_mut() {
            Some(page) => {
                page.data_mut().copy_from_slice(data);
                slot.is_dirty = true;
                true
            }
            None => false,
        }
    }

    /// Drop `page_id` from the cache without writing it back.
    ///
    /// The freed slot moves to the cold end so it is reused first. Returns
    /// whether the page was resident.
    pub fn release(&mut self, page_id: PageId) -> bool {
        let Some(slot_id) = self.page_table.remove(&page_id) else {
            return false;
        };

        self.slots[slot_id] = Slot::default();
        self.replacer.demote(slot_id);
        debug!("Released page {} from slot {}", page_id, slot_id);
        true
    }

    /// Write a slot back to `store` if it is dirty. Returns whether it wrote.
    pub fn flush_slot<S: PageStore + ?Sized>(
        &mut self,
        slot_id: SlotId,
        store: &mut S,
    ) -> CacheResult<bool> {
        let slot = &mut self.slots[slot_id];
        match slot.page.as_ref() {
            Some(page) if slot.is_dirty => {
                store.write_page(page.id(), page.data())?;
                slot.is_dirty = false;
                self.stats.pages_written += 1;
                trace!("Wrote back page {} from slot {}", page.id(), slot_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Write every dirty slot back to `store`. Returns how many were written.
    pub fn flush_all<S: PageStore + ?Sized>(&mut self, store: &mut S) -> CacheResult<usize> {
        let mut written = 0;
        for slot_id in 0..self.slots.len() {
            if self.flush_slot(slot_id, store)? {
                written += 1;
            }
        }
        Ok(written)
    }
}
