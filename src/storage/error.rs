//! Storage layer error types.

use thiserror::Error;

use crate::storage::page::PageId;

/// Errors raised by a [`PageStore`](crate::storage::PageStore) implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Page not found: {0}")]
    PageNotFound(PageId),

    #[error("Invalid page buffer: expected {expected} bytes, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Page store is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the page cache.
///
/// Any of these is terminal for the instance that returned it.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Journal IO error: {0}")]
    JournalIo(#[from] std::io::Error),

    #[error("Journal recovery failed: {0}")]
    Recovery(String),

    #[error("Store IO error: {0}")]
    StoreIo(#[from] StoreError),

    #[error("Invalid page buffer: expected {expected} bytes, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },
}

/// Result type for page store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for page cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
