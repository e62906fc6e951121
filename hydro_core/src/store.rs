//! Water log persistence.
//!
//! [`LogStore`] is the boundary contract the rest of the system talks to.
//! [`JournalStore`] implements it with an append-only JSON Lines journal:
//! every create and every delete is one line, written under an exclusive
//! file lock, and reads replay the journal under a shared lock.
//!
//! Any failure crossing this boundary is reported as [`Error::Store`];
//! input problems keep their [`Error::Validation`] kind.

use crate::{validate, DateRange, Error, LogEntry, NewLogEntry, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Default journal file name inside the data directory
pub const JOURNAL_FILE: &str = "water_log.jsonl";

/// Read/write/delete contract for water log entries
pub trait LogStore {
    /// Entries newest first, optionally limited to a `logged_at` range
    fn list(&self, range: Option<DateRange>) -> Result<Vec<LogEntry>>;

    /// Store a new entry and return it with its assigned id
    fn add(&mut self, new: NewLogEntry) -> Result<LogEntry>;

    /// Remove an entry. Returns `false` when no such entry exists.
    fn delete(&mut self, id: Uuid) -> Result<bool>;
}

fn build_entry(new: NewLogEntry) -> Result<LogEntry> {
    let amount = validate::amount(new.amount)?;
    let now = Utc::now();
    Ok(LogEntry {
        id: Uuid::new_v4(),
        amount,
        logged_at: new.logged_at.unwrap_or(now),
        created_at: now,
    })
}

fn select(mut entries: Vec<LogEntry>, range: Option<DateRange>) -> Vec<LogEntry> {
    if let Some(range) = range {
        entries.retain(|e| range.contains(e.logged_at));
    }
    entries.sort_by(|a, b| b.logged_at.cmp(&a.logged_at));
    entries
}

fn boundary(err: Error) -> Error {
    match err {
        Error::Validation(_) | Error::Store(_) => err,
        other => Error::store(other),
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Volatile store, used by tests and as a scratch store for hosts
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Vec<LogEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<LogEntry>) -> Self {
        Self { entries }
    }
}

impl LogStore for MemoryStore {
    fn list(&self, range: Option<DateRange>) -> Result<Vec<LogEntry>> {
        Ok(select(self.entries.clone(), range))
    }

    fn add(&mut self, new: NewLogEntry) -> Result<LogEntry> {
        let entry = build_entry(new)?;
        self.entries.push(entry.clone());
        Ok(entry)
    }

    fn delete(&mut self, id: Uuid) -> Result<bool> {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        Ok(self.entries.len() != before)
    }
}

// ============================================================================
// Journal store
// ============================================================================

/// One line of the journal
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum JournalRecord {
    Created {
        entry: LogEntry,
    },
    Deleted {
        id: Uuid,
        deleted_at: DateTime<Utc>,
    },
}

/// Outcome of [`JournalStore::compact`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompactReport {
    pub records_before: usize,
    pub entries_kept: usize,
}

/// JSONL-backed log store with file locking
pub struct JournalStore {
    path: PathBuf,
}

impl JournalStore {
    /// Create a journal store for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Journal store at the default file name inside `data_dir`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(JOURNAL_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Sidecar lock file next to the journal.
    ///
    /// Compaction replaces the journal's inode, so readers and writers
    /// lock this file rather than the journal.
    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| JOURNAL_FILE.into());
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn with_lock<T>(&self, exclusive: bool, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.ensure_parent_dir()?;
        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(self.lock_path())?;

        if exclusive {
            lock.lock_exclusive()?;
        } else {
            lock.lock_shared()?;
        }

        let result = f();
        lock.unlock()?;
        result
    }

    fn append(&self, record: &JournalRecord) -> Result<()> {
        self.with_lock(true, || {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;

            let mut writer = std::io::BufWriter::new(&file);
            let line = serde_json::to_string(record)?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            Ok(())
        })
    }

    fn read_records(&self) -> Result<Vec<JournalRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        self.with_lock(false, || self.read_records_locked())
    }

    /// Parse the journal; the caller holds the lock
    fn read_records_locked(&self) -> Result<Vec<JournalRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();

        // Raw bytes: a torn write may leave invalid UTF-8 behind
        for (line_num, line_result) in reader.split(b'\n').enumerate() {
            let line = line_result?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match serde_json::from_slice::<JournalRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        "Skipping unreadable journal line {} in {:?}: {}",
                        line_num + 1,
                        self.path,
                        e
                    );
                }
            }
        }

        tracing::debug!("Read {} journal records", records.len());
        Ok(records)
    }

    /// Replay the journal into the set of live entries, in insertion order
    fn live_entries(&self) -> Result<Vec<LogEntry>> {
        Ok(replay(self.read_records()?))
    }

    /// Rewrite the journal with only live entries.
    ///
    /// The new journal is written to a temp file in the same directory,
    /// synced, then renamed over the old one. The exclusive lock is held
    /// from the read through the rename.
    pub fn compact(&self) -> Result<CompactReport> {
        self.with_lock(true, || self.compact_locked())
            .map_err(boundary)
    }

    fn compact_locked(&self) -> Result<CompactReport> {
        let records = self.read_records_locked()?;
        let records_before = records.len();
        let live = replay(records);

        let parent = self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "journal path missing parent")
        })?;
        let temp = NamedTempFile::new_in(parent)?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            for entry in &live {
                let record = JournalRecord::Created {
                    entry: entry.clone(),
                };
                writer.write_all(serde_json::to_string(&record)?.as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::info!(
            "Compacted journal {:?}: {} records -> {} entries",
            self.path,
            records_before,
            live.len()
        );

        Ok(CompactReport {
            records_before,
            entries_kept: live.len(),
        })
    }
}

fn replay(records: Vec<JournalRecord>) -> Vec<LogEntry> {
    let mut slots: Vec<Option<LogEntry>> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for record in records {
        match record {
            JournalRecord::Created { entry } => {
                if index.contains_key(&entry.id) {
                    tracing::warn!("Duplicate journal entry {} ignored", entry.id);
                    continue;
                }
                index.insert(entry.id, slots.len());
                slots.push(Some(entry));
            }
            JournalRecord::Deleted { id, .. } => {
                if let Some(slot) = index.remove(&id) {
                    slots[slot] = None;
                }
            }
        }
    }

    slots.into_iter().flatten().collect()
}

impl LogStore for JournalStore {
    fn list(&self, range: Option<DateRange>) -> Result<Vec<LogEntry>> {
        let entries = self.live_entries().map_err(boundary)?;
        Ok(select(entries, range))
    }

    fn add(&mut self, new: NewLogEntry) -> Result<LogEntry> {
        let entry = build_entry(new)?;
        self.append(&JournalRecord::Created {
            entry: entry.clone(),
        })
        .map_err(boundary)?;

        tracing::debug!("Logged {}ml as {}", entry.amount, entry.id);
        Ok(entry)
    }

    fn delete(&mut self, id: Uuid) -> Result<bool> {
        let exists = self
            .live_entries()
            .map_err(boundary)?
            .iter()
            .any(|e| e.id == id);

        if !exists {
            tracing::debug!("Delete of unknown entry {} is a no-op", id);
            return Ok(false);
        }

        self.append(&JournalRecord::Deleted {
            id,
            deleted_at: Utc::now(),
        })
        .map_err(boundary)?;

        tracing::debug!("Deleted entry {}", id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn journal(dir: &tempfile::TempDir) -> JournalStore {
        JournalStore::in_dir(dir.path())
    }

    #[test]
    fn test_add_and_list_single_entry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = journal(&temp_dir);

        let entry = store.add(NewLogEntry::now(250)).unwrap();
        assert_eq!(entry.amount, 250);

        let entries = store.list(None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], entry);
    }

    #[test]
    fn test_list_missing_journal_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JournalStore::new(temp_dir.path().join("nonexistent.jsonl"));
        assert!(store.list(None).unwrap().is_empty());
    }

    #[test]
    fn test_add_rejects_zero_amount() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = journal(&temp_dir);

        let err = store.add(NewLogEntry::now(0)).unwrap_err();
        assert!(err.is_validation());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_list_newest_first_and_range_filter() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = journal(&temp_dir);
        let now = Utc::now();

        store.add(NewLogEntry::at(100, now - Duration::days(3))).unwrap();
        store.add(NewLogEntry::at(200, now)).unwrap();
        store.add(NewLogEntry::at(300, now - Duration::days(1))).unwrap();

        let all = store.list(None).unwrap();
        let amounts: Vec<_> = all.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![200, 300, 100]);

        let range = DateRange::new(now - Duration::days(2), now + Duration::seconds(1));
        let recent = store.list(Some(range)).unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = journal(&temp_dir);

        let keep = store.add(NewLogEntry::now(250)).unwrap();
        let gone = store.add(NewLogEntry::now(500)).unwrap();

        assert!(store.delete(gone.id).unwrap());
        assert!(!store.delete(gone.id).unwrap());
        assert!(!store.delete(Uuid::new_v4()).unwrap());

        let entries = store.list(None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, keep.id);
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = journal(&temp_dir);
        store.add(NewLogEntry::now(250)).unwrap();

        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        writeln!(file, "{{ not json").unwrap();
        drop(file);

        store.add(NewLogEntry::now(300)).unwrap();
        assert_eq!(store.list(None).unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = journal(&temp_dir);
        let entry = store.add(NewLogEntry::now(250)).unwrap();

        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        file.write_all(b"\xff\xfe garbage\n").unwrap();
        drop(file);

        let entries = store.list(None).unwrap();
        assert_eq!(entries, vec![entry]);

        // Still writable and compactable afterwards
        store.add(NewLogEntry::now(100)).unwrap();
        let report = store.compact().unwrap();
        assert_eq!(report.entries_kept, 2);
    }

    #[test]
    fn test_replay_skips_duplicates_and_applies_deletes() {
        let now = Utc::now();
        let entry = LogEntry {
            id: Uuid::new_v4(),
            amount: 250,
            logged_at: now,
            created_at: now,
        };
        let other = LogEntry {
            id: Uuid::new_v4(),
            amount: 400,
            ..entry.clone()
        };

        let records = vec![
            JournalRecord::Created { entry: entry.clone() },
            JournalRecord::Created { entry: other.clone() },
            JournalRecord::Created { entry: entry.clone() },
            JournalRecord::Deleted { id: entry.id, deleted_at: now },
            JournalRecord::Deleted { id: Uuid::new_v4(), deleted_at: now },
        ];
        assert_eq!(replay(records), vec![other]);
    }

    #[test]
    fn test_compact_drops_deleted_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = journal(&temp_dir);

        let a = store.add(NewLogEntry::now(100)).unwrap();
        store.add(NewLogEntry::now(200)).unwrap();
        store.delete(a.id).unwrap();

        let report = store.compact().unwrap();
        assert_eq!(report.records_before, 3);
        assert_eq!(report.entries_kept, 1);

        let lines = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(lines.lines().count(), 1);
        assert_eq!(store.list(None).unwrap()[0].amount, 200);

        // Only the journal and its lock file remain
        let mut files: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        files.sort();
        assert_eq!(files, vec!["water_log.jsonl", "water_log.jsonl.lock"]);
    }

    #[test]
    fn test_unreadable_journal_is_store_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        // A directory where the journal file should be
        let path = temp_dir.path().join(JOURNAL_FILE);
        std::fs::create_dir(&path).unwrap();
        let store = JournalStore::new(path);
        let err = store.list(None).unwrap_err();
        assert!(err.is_store());
    }

    #[test]
    fn test_memory_store_contract() {
        let mut store = MemoryStore::new();
        let entry = store.add(NewLogEntry::now(330)).unwrap();
        assert_eq!(store.list(None).unwrap().len(), 1);
        assert!(store.delete(entry.id).unwrap());
        assert!(!store.delete(entry.id).unwrap());
        assert!(store.add(NewLogEntry::now(0)).is_err());
    }
}
