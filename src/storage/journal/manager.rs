//! Journal file handling and crash recovery.
//!
//! The journal is append-only. A fresh journal starts with a checkpoint so
//! that every journal has a recovery anchor, and each session appends a
//! `DB_OPEN` marker once recovery has finished.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, trace, warn};

use super::cursor::RecordCursor;
use super::record::{JournalRecord, JournalTag, RecordLayout};
use crate::storage::disk::PageStore;
use crate::storage::error::{CacheError, CacheResult};
use crate::storage::page::PageId;

/// Outcome of replaying a journal at startup.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Index of the checkpoint recovery started after.
    pub checkpoint_index: u64,
    /// Whole records read after the checkpoint.
    pub records_scanned: u64,
    /// `CHANGE_` records written to the store.
    pub changes_replayed: u64,
    /// Records with an unrecognised tag, skipped.
    pub unknown_records: u64,
    /// Bytes of a partial trailing record that were cut off.
    pub truncated_bytes: u64,
}

/// Write-ahead journal with fixed-length records.
pub struct Journal {
    file: File,
    path: PathBuf,
    layout: RecordLayout,
    sync_on_append: bool,
    /// One encoded record, reused for every append and scan.
    scratch: Vec<u8>,
    record_count: u64,
}

impl Journal {
    /// Open the journal at `path`.
    ///
    /// A missing journal is created with a checkpoint. An existing one is
    /// replayed into `store` from its last checkpoint, and the returned stats
    /// describe that replay. Either way a `DB_OPEN` record is appended.
    pub fn open<S: PageStore + ?Sized>(
        path: &Path,
        page_size: usize,
        sync_on_append: bool,
        store: &mut S,
    ) -> CacheResult<(Self, Option<RecoveryStats>)> {
        let existed = path.try_exists()?;
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let layout = RecordLayout::new(page_size);
        let mut journal = Journal {
            file,
            path: path.to_path_buf(),
            layout,
            sync_on_append,
            scratch: vec![0u8; layout.record_len()],
            record_count: 0,
        };

        let stats = if existed {
            Some(journal.recover(store)?)
        } else {
            info!("Creating journal at {:?}", path);
            journal.append_marker(JournalTag::Checkpoint, true)?;
            None
        };
        journal.append_marker(JournalTag::DbOpen, true)?;

        Ok((journal, stats))
    }

    /// Replay every `CHANGE_` record after the last checkpoint into `store`.
    fn recover<S: PageStore + ?Sized>(&mut self, store: &mut S) -> CacheResult<RecoveryStats> {
        let layout = self.layout;
        let mut cursor = RecordCursor::new(&mut self.file, layout)?;
        let record_count = cursor.record_count();

        let checkpoint_index = cursor.rfind(JournalTag::Checkpoint)?.ok_or_else(|| {
            CacheError::Recovery(format!(
                "no checkpoint record among {} records in {:?}",
                record_count, self.path
            ))
        })?;

        let mut stats = RecoveryStats {
            checkpoint_index,
            truncated_bytes: cursor.torn_tail_len(),
            ..Default::default()
        };

        for index in checkpoint_index + 1..record_count {
            cursor.read_at(index, &mut self.scratch)?;
            stats.records_scanned += 1;

            match layout.decode(&self.scratch) {
                Ok(JournalRecord::Change { page_id, data }) => {
                    store.write_page(page_id, &data)?;
                    stats.changes_replayed += 1;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("Skipping journal record {}: {}", index, err);
                    stats.unknown_records += 1;
                }
            }
        }

        let aligned_len = cursor.aligned_len();
        if stats.truncated_bytes > 0 {
            warn!(
                "Truncating {} bytes of partial record at the end of {:?}",
                stats.truncated_bytes, self.path
            );
            self.file.set_len(aligned_len)?;
        }
        if stats.changes_replayed > 0 {
            store.flush()?;
        }
        self.record_count = record_count;

        info!(
            "Recovered journal {:?}: replayed {} of {} records after checkpoint {}",
            self.path, stats.changes_replayed, stats.records_scanned, checkpoint_index
        );
        Ok(stats)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of whole records in the journal.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Append a `CHANGE_` record holding the full image of `page_id`.
    pub fn append_change(&mut self, page_id: PageId, data: &[u8]) -> CacheResult<()> {
        if data.len() != self.layout.page_size() {
            return Err(CacheError::InvalidPageSize {
                expected: self.layout.page_size(),
                actual: data.len(),
            });
        }

        self.layout.encode_change(page_id, data, &mut self.scratch);
        self.write_scratch(self.sync_on_append)?;
        trace!("Journaled change to page {}", page_id);
        Ok(())
    }

    /// Append a checkpoint marker and sync it.
    pub fn checkpoint(&mut self) -> CacheResult<()> {
        self.append_marker(JournalTag::Checkpoint, true)
    }

    /// Append the `DBCLOSE` marker and release the file.
    pub fn close(mut self) -> CacheResult<()> {
        self.append_marker(JournalTag::DbClose, true)?;
        info!("Closed journal {:?} at {} records", self.path, self.record_count);
        Ok(())
    }

    fn append_marker(&mut self, tag: JournalTag, sync: bool) -> CacheResult<()> {
        self.layout.encode_marker(tag, &mut self.scratch);
        self.write_scratch(sync)?;
        trace!("Journaled {} marker", tag);
        Ok(())
    }

    fn write_scratch(&mut self, sync: bool) -> CacheResult<()> {
        self.file.write_all(&self.scratch)?;
        if sync {
            self.file.sync_data()?;
        }
        self.record_count += 1;
        Ok(())
    }

    /// Decode every whole record of the journal at `path`.
    ///
    /// Records with an unknown tag are skipped, as recovery does.
    pub fn read_records(path: &Path, page_size: usize) -> CacheResult<Vec<JournalRecord>> {
        let mut file = File::open(path)?;
        let layout = RecordLayout::new(page_size);
        let mut cursor = RecordCursor::new(&mut file, layout)?;
        let mut buf = vec![0u8; layout.record_len()];

        let mut records = Vec::with_capacity(cursor.record_count() as usize);
        for index in 0..cursor.record_count() {
            cursor.read_at(index, &mut buf)?;
            match layout.decode(&buf) {
                Ok(record) => records.push(record),
                Err(err) => warn!("Skipping journal record {}: {}", index, err),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::MemoryPageStore;
    use anyhow::Result;
    use std::fs;
    use tempfile::TempDir;

    const PAGE_SIZE: usize = 4;

    fn change(page_id: u64, data: &[u8]) -> JournalRecord {
        JournalRecord::Change {
            page_id: PageId(page_id),
            data: data.to_vec(),
        }
    }

    /// Write raw records to `path` as a previous session would have.
    fn write_journal(path: &Path, records: &[JournalRecord]) -> Result<()> {
        let layout = RecordLayout::new(PAGE_SIZE);
        let mut bytes = Vec::new();
        let mut buf = vec![0u8; layout.record_len()];
        for record in records {
            match record {
                JournalRecord::Change { page_id, data } => {
                    layout.encode_change(*page_id, data, &mut buf)
                }
                other => layout.encode_marker(other.tag(), &mut buf),
            }
            bytes.extend_from_slice(&buf);
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    #[test]
    fn test_fresh_journal() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("journal.log");
        let mut store = MemoryPageStore::new(PAGE_SIZE);

        let (journal, stats) = Journal::open(&path, PAGE_SIZE, false, &mut store)?;
        assert!(stats.is_none());
        assert_eq!(journal.record_count(), 2);
        assert_eq!(fs::metadata(&path)?.len(), 2 * 19);

        let records = Journal::read_records(&path, PAGE_SIZE)?;
        assert_eq!(records, vec![JournalRecord::Checkpoint, JournalRecord::DbOpen]);

        Ok(())
    }

    #[test]
    fn test_appends_and_close() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("journal.log");
        let mut store = MemoryPageStore::new(PAGE_SIZE);

        let (mut journal, _) = Journal::open(&path, PAGE_SIZE, true, &mut store)?;
        journal.append_change(PageId(3), b"abcd")?;
        journal.checkpoint()?;
        journal.close()?;

        let records = Journal::read_records(&path, PAGE_SIZE)?;
        assert_eq!(
            records,
            vec![
                JournalRecord::Checkpoint,
                JournalRecord::DbOpen,
                change(3, b"abcd"),
                JournalRecord::Checkpoint,
                JournalRecord::DbClose,
            ]
        );

        Ok(())
    }

    #[test]
    fn test_append_rejects_wrong_length() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("journal.log");
        let mut store = MemoryPageStore::new(PAGE_SIZE);

        let (mut journal, _) = Journal::open(&path, PAGE_SIZE, false, &mut store)?;
        assert!(matches!(
            journal.append_change(PageId(0), b"toolong"),
            Err(CacheError::InvalidPageSize { expected: 4, actual: 7 })
        ));
        assert_eq!(journal.record_count(), 2);

        Ok(())
    }

    #[test]
    fn test_recovery_replays_after_last_checkpoint() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("journal.log");
        write_journal(
            &path,
            &[
                JournalRecord::Checkpoint,
                JournalRecord::DbOpen,
                change(1, b"old1"),
                JournalRecord::Checkpoint,
                change(5, b"AAAA"),
                change(5, b"BBBB"),
                change(9, b"CCCC"),
            ],
        )?;

        let mut store = MemoryPageStore::new(PAGE_SIZE);
        let (journal, stats) = Journal::open(&path, PAGE_SIZE, false, &mut store)?;
        let stats = stats.expect("existing journal is recovered");

        assert_eq!(stats.checkpoint_index, 3);
        assert_eq!(stats.records_scanned, 3);
        assert_eq!(stats.changes_replayed, 3);
        assert_eq!(store.page(PageId(5)), Some(b"BBBB".to_vec()));
        assert_eq!(store.page(PageId(9)), Some(b"CCCC".to_vec()));
        // Changes before the checkpoint are already in the store.
        assert_eq!(store.page(PageId(1)), None);
        assert_eq!(store.flush_count(), 1);

        assert_eq!(journal.record_count(), 8);
        let records = Journal::read_records(&path, PAGE_SIZE)?;
        assert_eq!(records.last(), Some(&JournalRecord::DbOpen));

        Ok(())
    }

    #[test]
    fn test_recovery_skips_markers() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("journal.log");
        write_journal(
            &path,
            &[
                JournalRecord::Checkpoint,
                JournalRecord::DbOpen,
                change(2, b"xxxx"),
                JournalRecord::DbClose,
                JournalRecord::DbOpen,
                change(2, b"yyyy"),
            ],
        )?;

        let mut store = MemoryPageStore::new(PAGE_SIZE);
        let (_journal, stats) = Journal::open(&path, PAGE_SIZE, false, &mut store)?;
        let stats = stats.expect("existing journal is recovered");

        assert_eq!(stats.records_scanned, 5);
        assert_eq!(stats.changes_replayed, 2);
        assert_eq!(store.page(PageId(2)), Some(b"yyyy".to_vec()));

        Ok(())
    }

    #[test]
    fn test_clean_shutdown_replays_nothing() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("journal.log");
        write_journal(
            &path,
            &[
                JournalRecord::Checkpoint,
                JournalRecord::DbOpen,
                change(2, b"xxxx"),
                JournalRecord::Checkpoint,
                JournalRecord::DbClose,
            ],
        )?;

        let mut store = MemoryPageStore::new(PAGE_SIZE);
        let (_journal, stats) = Journal::open(&path, PAGE_SIZE, false, &mut store)?;
        let stats = stats.expect("existing journal is recovered");

        assert_eq!(stats.changes_replayed, 0);
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.flush_count(), 0);

        Ok(())
    }

    #[test]
    fn test_missing_checkpoint_is_recovery_error() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("journal.log");
        write_journal(&path, &[JournalRecord::DbOpen, change(1, b"abcd")])?;

        let mut store = MemoryPageStore::new(PAGE_SIZE);
        let result = Journal::open(&path, PAGE_SIZE, false, &mut store);
        assert!(matches!(result, Err(CacheError::Recovery(_))));
        assert_eq!(store.write_count(), 0);

        Ok(())
    }

    #[test]
    fn test_empty_existing_journal_is_recovery_error() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("journal.log");
        fs::write(&path, b"")?;

        let mut store = MemoryPageStore::new(PAGE_SIZE);
        let result = Journal::open(&path, PAGE_SIZE, false, &mut store);
        assert!(matches!(result, Err(CacheError::Recovery(_))));

        Ok(())
    }

    #[test]
    fn test_torn_tail_is_ignored_and_truncated() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("journal.log");
        write_journal(
            &path,
            &[JournalRecord::Checkpoint, JournalRecord::DbOpen, change(4, b"good")],
        )?;
        let mut bytes = fs::read(&path)?;
        bytes.extend_from_slice(b"CHANGE_\x04\x00\x00");
        fs::write(&path, &bytes)?;

        let mut store = MemoryPageStore::new(PAGE_SIZE);
        let (journal, stats) = Journal::open(&path, PAGE_SIZE, false, &mut store)?;
        let stats = stats.expect("existing journal is recovered");

        assert_eq!(stats.truncated_bytes, 10);
        assert_eq!(stats.changes_replayed, 1);
        assert_eq!(store.page(PageId(4)), Some(b"good".to_vec()));

        // The DB_OPEN marker lands on a record boundary.
        assert_eq!(journal.record_count(), 4);
        assert_eq!(fs::metadata(&path)?.len(), 4 * 19);
        let records = Journal::read_records(&path, PAGE_SIZE)?;
        assert_eq!(records[3], JournalRecord::DbOpen);

        Ok(())
    }

    #[test]
    fn test_unknown_record_is_skipped() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("journal.log");
        write_journal(
            &path,
            &[JournalRecord::Checkpoint, change(1, b"one!"), change(2, b"two!")],
        )?;
        // Corrupt the tag of the first change.
        let mut bytes = fs::read(&path)?;
        bytes[19..26].copy_from_slice(b"XXXXXXX");
        fs::write(&path, &bytes)?;

        let mut store = MemoryPageStore::new(PAGE_SIZE);
        let (_journal, stats) = Journal::open(&path, PAGE_SIZE, false, &mut store)?;
        let stats = stats.expect("existing journal is recovered");

        assert_eq!(stats.unknown_records, 1);
        assert_eq!(stats.changes_replayed, 1);
        assert_eq!(store.page(PageId(1)), None);
        assert_eq!(store.page(PageId(2)), Some(b"two!".to_vec()));

        Ok(())
    }

    #[test]
    fn test_replay_is_idempotent() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("journal.log");
        let records = [
            JournalRecord::Checkpoint,
            change(5, b"AAAA"),
            change(5, b"BBBB"),
            change(9, b"CCCC"),
        ];

        let mut store = MemoryPageStore::new(PAGE_SIZE);
        for _ in 0..2 {
            write_journal(&path, &records)?;
            Journal::open(&path, PAGE_SIZE, false, &mut store)?;
            assert_eq!(store.page(PageId(5)), Some(b"BBBB".to_vec()));
            assert_eq!(store.page(PageId(9)), Some(b"CCCC".to_vec()));
        }
        assert_eq!(store.write_count(), 6);

        Ok(())
    }
}
