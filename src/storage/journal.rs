//! Write-ahead journal.
//!
//! This module implements the journal the page cache logs every write to:
//! - Fixed-length record encoding with a tag enum
//! - A record-indexed cursor for scanning the journal file
//! - Appending change and marker records
//! - Startup recovery from the last checkpoint

pub mod cursor;
pub mod manager;
pub mod record;

pub use cursor::RecordCursor;
pub use manager::{Journal, RecoveryStats};
pub use record::{JournalRecord, JournalTag, RecordError, RecordLayout};
