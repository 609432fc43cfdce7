//! Journal record layout and encoding.
//!
//! Every record has the same length: a 7-byte ASCII tag, an 8-byte
//! little-endian page number and a full page of payload. Only `CHANGE_`
//! records use the page number and payload. The other tags zero them and put
//! the `|` delimiter in the last byte of the record.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use thiserror::Error;

use crate::storage::page::PageId;

/// Width of the tag field.
pub const TAG_LEN: usize = 7;

/// Width of the page number field.
pub const PAGE_NUMBER_LEN: usize = 8;

/// Last byte of every marker record.
pub const RECORD_DELIMITER: u8 = b'|';

/// Journal record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JournalTag {
    /// A full page image written by the cache.
    Change,
    /// Everything before this record is durable in the store.
    Checkpoint,
    /// A session started.
    DbOpen,
    /// A session ended cleanly.
    DbClose,
}

impl JournalTag {
    pub const ALL: [JournalTag; 4] = [
        JournalTag::Change,
        JournalTag::Checkpoint,
        JournalTag::DbOpen,
        JournalTag::DbClose,
    ];

    pub const fn as_bytes(&self) -> &'static [u8; TAG_LEN] {
        match self {
            JournalTag::Change => b"CHANGE_",
            JournalTag::Checkpoint => b"CHCKPNT",
            JournalTag::DbOpen => b"DB_OPEN",
            JournalTag::DbClose => b"DBCLOSE",
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_bytes().as_slice() == bytes)
    }
}

impl fmt::Display for JournalTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tags are ASCII.
        f.write_str(std::str::from_utf8(self.as_bytes()).unwrap_or("?"))
    }
}

/// Errors decoding a single record.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecordError {
    #[error("Unknown record tag: {0:?}")]
    UnknownTag([u8; TAG_LEN]),

    #[error("Record truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// A decoded journal record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalRecord {
    Change { page_id: PageId, data: Vec<u8> },
    Checkpoint,
    DbOpen,
    DbClose,
}

impl JournalRecord {
    pub fn tag(&self) -> JournalTag {
        match self {
            JournalRecord::Change { .. } => JournalTag::Change,
            JournalRecord::Checkpoint => JournalTag::Checkpoint,
            JournalRecord::DbOpen => JournalTag::DbOpen,
            JournalRecord::DbClose => JournalTag::DbClose,
        }
    }
}

/// Record geometry for one page size.
///
/// Writing and scanning both go through this type so the record length can
/// never disagree between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    page_size: usize,
}

impl RecordLayout {
    pub fn new(page_size: usize) -> Self {
        Self { page_size }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn record_len(&self) -> usize {
        TAG_LEN + PAGE_NUMBER_LEN + self.page_size
    }

    /// Encode a `CHANGE_` record into `out`, which must be `record_len` long.
    pub fn encode_change(&self, page_id: PageId, data: &[u8], out: &mut [u8]) {
        debug_assert_eq!(data.len(), self.page_size);
        debug_assert_eq!(out.len(), self.record_len());

        out[..TAG_LEN].copy_from_slice(JournalTag::Change.as_bytes());
        LittleEndian::write_u64(&mut out[TAG_LEN..TAG_LEN + PAGE_NUMBER_LEN], page_id.0);
        out[TAG_LEN + PAGE_NUMBER_LEN..].copy_from_slice(data);
    }

    /// Encode a marker record into `out`, zero-filling everything between the
    /// tag and the delimiter.
    pub fn encode_marker(&self, tag: JournalTag, out: &mut [u8]) {
        debug_assert_ne!(tag, JournalTag::Change);
        debug_assert_eq!(out.len(), self.record_len());

        out[..TAG_LEN].copy_from_slice(tag.as_bytes());
        out[TAG_LEN..].fill(0);
        if let Some(last) = out.last_mut() {
            *last = RECORD_DELIMITER;
        }
    }

    /// Read only the tag of an encoded record.
    pub fn decode_tag(&self, record: &[u8]) -> Result<JournalTag, RecordError> {
        let bytes = record.get(..TAG_LEN).ok_or(RecordError::Truncated {
            expected: TAG_LEN,
            actual: record.len(),
        })?;
        JournalTag::from_bytes(bytes).ok_or_else(|| {
            let mut raw = [0u8; TAG_LEN];
            raw.copy_from_slice(bytes);
            RecordError::UnknownTag(raw)
        })
    }

    pub fn decode(&self, record: &[u8]) -> Result<JournalRecord, RecordError> {
        if record.len() != self.record_len() {
            return Err(RecordError::Truncated {
                expected: self.record_len(),
                actual: record.len(),
            });
        }

        Ok(match self.decode_tag(record)? {
            JournalTag::Change => JournalRecord::Change {
                page_id: PageId(LittleEndian::read_u64(
                    &record[TAG_LEN..TAG_LEN + PAGE_NUMBER_LEN],
                )),
                data: record[TAG_LEN + PAGE_NUMBER_LEN..].to_vec(),
            },
            JournalTag::Checkpoint => JournalRecord::Checkpoint,
            JournalTag::DbOpen => JournalRecord::DbOpen,
            JournalTag::DbClose => JournalRecord::DbClose,
        })
    }
}
