use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use super::record::{JournalTag, RecordLayout, TAG_LEN};

/// Record-indexed view over a journal file.
///
/// Only whole records are addressable. A partial record at the end of the file
/// (a torn append) is excluded from `record_count` and reported by
/// `torn_tail_len`.
pub struct RecordCursor<'a> {
    file: &'a mut File,
    layout: RecordLayout,
    file_len: u64,
}

impl<'a> RecordCursor<'a> {
    pub fn new(file: &'a mut File, layout: RecordLayout) -> io::Result<Self> {
        let file_len = file.metadata()?.len();
        Ok(Self {
            file,
            layout,
            file_len,
        })
    }

    fn record_len(&self) -> u64 {
        self.layout.record_len() as u64
    }

    pub fn record_count(&self) -> u64 {
        self.file_len / self.record_len()
    }

    /// Byte length covered by whole records.
    pub fn aligned_len(&self) -> u64 {
        self.record_count() * self.record_len()
    }

    pub fn torn_tail_len(&self) -> u64 {
        self.file_len - self.aligned_len()
    }

    fn seek_to(&mut self, index: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(index * self.record_len()))?;
        Ok(())
    }

    /// Tag of record `index`, or None if the tag bytes are not a known tag.
    pub fn tag_at(&mut self, index: u64) -> io::Result<Option<JournalTag>> {
        self.seek_to(index)?;
        let mut tag = [0u8; TAG_LEN];
        self.file.read_exact(&mut tag)?;
        Ok(JournalTag::from_bytes(&tag))
    }

    /// Read record `index` into `buf`, which must be `record_len` long.
    pub fn read_at(&mut self, index: u64, buf: &mut [u8]) -> io::Result<()> {
        self.seek_to(index)?;
        self.file.read_exact(buf)
    }

    /// Index of the last record carrying `tag`, scanning backward from the
    /// end. Stops at the first record of the file.
    pub fn rfind(&mut self, tag: JournalTag) -> io::Result<Option<u64>> {
        for index in (0..self.record_count()).rev() {
            if self.tag_at(index)? == Some(tag) {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }
}
