//! Page cache configuration.

use std::path::{Path, PathBuf};

use crate::storage::error::{CacheError, CacheResult};

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default cache size in bytes (64 pages).
pub const DEFAULT_CACHE_SIZE: usize = 64 * DEFAULT_PAGE_SIZE;

/// Default number of writes between implicit checkpoints.
pub const DEFAULT_CHECKPOINT_THRESHOLD: usize = 1000;

/// Page cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Bytes per page. Must match the underlying store.
    pub page_size: usize,
    /// Bytes of page data the cache may hold. Must be a multiple of `page_size`.
    pub cache_size: usize,
    /// Location of the journal file.
    pub journal_path: PathBuf,
    /// Number of writes after which a full flush and checkpoint is taken.
    pub checkpoint_threshold: usize,
    /// Whether to sync the journal after every change record.
    pub sync_on_append: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            page_size: DEFAULT_PAGE_SIZE,
            cache_size: DEFAULT_CACHE_SIZE,
            journal_path: PathBuf::from("journal.log"),
            checkpoint_threshold: DEFAULT_CHECKPOINT_THRESHOLD,
            sync_on_append: true,
        }
    }
}

impl CacheConfig {
    /// Default configuration with the journal at `journal_path`.
    pub fn new(journal_path: impl Into<PathBuf>) -> Self {
        CacheConfig {
            journal_path: journal_path.into(),
            ..Default::default()
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    /// Set the cache size as a number of pages of the current page size.
    pub fn with_cache_pages(mut self, pages: usize) -> Self {
        self.cache_size = pages * self.page_size;
        self
    }

    pub fn with_checkpoint_threshold(mut self, threshold: usize) -> Self {
        self.checkpoint_threshold = threshold;
        self
    }

    pub fn with_sync_on_append(mut self, sync_on_append: bool) -> Self {
        self.sync_on_append = sync_on_append;
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    /// Number of cache slots.
    pub fn slot_count(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        self.cache_size / self.page_size
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.page_size == 0 {
            return Err(CacheError::Configuration(
                "page size must be greater than zero".to_string(),
            ));
        }
        if self.cache_size % self.page_size != 0 {
            return Err(CacheError::Configuration(format!(
                "page size {} should divide cache size {}",
                self.page_size, self.cache_size
            )));
        }
        if self.slot_count() == 0 {
            return Err(CacheError::Configuration(
                "cache must hold at least one page".to_string(),
            ));
        }
        if self.checkpoint_threshold == 0 {
            return Err(CacheError::Configuration(
                "checkpoint threshold must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
