//! File-backed term database
//!
//! A database directory holds two files:
//!
//! - `terms.snap`: full snapshot. Header `DSSE` + little-endian `u32` format
//!   version, then a bincode body `(Vec<Term>, Option<DbInfo>)`.
//! - `terms.wal`: write-ahead log of every mutation since the snapshot, as
//!   length-prefixed bincode [`WalEntry`] records.
//!
//! Opening loads the snapshot and replays the log. [`TermDb::checkpoint`]
//! writes a new snapshot (temp file + rename) and truncates the log.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    DbInfo, MemoryTermStore, StoreError, StoreResult, Term, TermFilter, TermStore, TermUpdate,
};

const SNAPSHOT_MAGIC: &[u8; 4] = b"DSSE";
const SNAPSHOT_VERSION: u32 = 1;

// ============================================================================
// Write-Ahead Log
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalEntry {
    Insert(Term),
    Update { id: String, update: TermUpdate },
    SetInfo(DbInfo),
}

/// Append-only mutation log.
///
/// Appends are buffered; [`WriteAheadLog::sync`] flushes and fsyncs.
pub struct WriteAheadLog {
    writer: BufWriter<File>,
    entries: u64,
}

impl WriteAheadLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            entries: 0,
        })
    }

    /// Append one entry; returns the number of bytes written.
    pub fn append(&mut self, entry: &WalEntry) -> StoreResult<u64> {
        let data = bincode::serialize(entry)?;
        let len = data.len() as u32;
        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(&data)?;
        self.entries += 1;
        Ok(len as u64 + 4)
    }

    pub fn sync(&mut self) -> std::io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()
    }

    /// Entries appended through this handle.
    pub fn entries_written(&self) -> u64 {
        self.entries
    }

    /// Replay every complete entry in the log at `path`.
    ///
    /// A torn final record (crash mid-append) ends the replay with a warning.
    pub fn replay<F>(path: &Path, mut handler: F) -> StoreResult<u64>
    where
        F: FnMut(WalEntry) -> StoreResult<()>,
    {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(file);
        let mut replayed = 0u64;

        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut data = vec![0u8; len];
            match reader.read_exact(&mut data) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    tracing::warn!(
                        path = %path.display(),
                        replayed,
                        "ignoring torn record at end of write-ahead log"
                    );
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let entry: WalEntry = bincode::deserialize(&data)?;
            handler(entry)?;
            replayed += 1;
        }

        Ok(replayed)
    }

    /// Drop all entries (after a checkpoint).
    pub fn truncate(&mut self) -> std::io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().set_len(0)?;
        self.entries = 0;
        Ok(())
    }
}

// ============================================================================
// Snapshot
// ============================================================================

fn encode_snapshot(terms: &BTreeMap<String, Term>, info: &Option<DbInfo>) -> StoreResult<Vec<u8>> {
    let body = bincode::serialize(&(terms.values().collect::<Vec<_>>(), info))?;
    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(SNAPSHOT_MAGIC);
    out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

fn decode_snapshot(bytes: &[u8]) -> Result<(Vec<Term>, Option<DbInfo>), String> {
    if bytes.len() < 8 || &bytes[0..4] != SNAPSHOT_MAGIC {
        return Err("not a Dassie snapshot (bad header)".to_string());
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..8]);
    let version = u32::from_le_bytes(version);
    if version != SNAPSHOT_VERSION {
        return Err(format!("unsupported snapshot version {version}"));
    }
    bincode::deserialize(&bytes[8..]).map_err(|e| format!("corrupt snapshot: {e}"))
}

// ============================================================================
// Term database
// ============================================================================

/// Memory store made durable by a snapshot + write-ahead log.
pub struct TermDb {
    dir: PathBuf,
    store: MemoryTermStore,
    wal: Mutex<WriteAheadLog>,
}

impl TermDb {
    pub const SNAPSHOT_FILE: &'static str = "terms.snap";
    pub const WAL_FILE: &'static str = "terms.wal";

    /// Open an existing database directory.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let unreachable = |reason: String| StoreError::Unreachable {
            path: dir.clone(),
            reason,
        };
        let unavailable = |reason: String| StoreError::Unavailable {
            path: dir.clone(),
            reason,
        };

        if !dir.is_dir() {
            return Err(unreachable("no such directory".to_string()));
        }
        let snapshot_path = dir.join(Self::SNAPSHOT_FILE);
        let wal_path = dir.join(Self::WAL_FILE);
        if !snapshot_path.exists() && !wal_path.exists() {
            return Err(unreachable(
                "no database files (has it been built?)".to_string(),
            ));
        }

        let (terms, info) = if snapshot_path.exists() {
            let bytes = std::fs::read(&snapshot_path).map_err(|e| unreachable(e.to_string()))?;
            decode_snapshot(&bytes).map_err(unavailable)?
        } else {
            (Vec::new(), None)
        };

        let terms: BTreeMap<String, Term> = terms.into_iter().map(|t| (t.id.clone(), t)).collect();
        let store = MemoryTermStore::with_contents(terms, info);

        let replayed = WriteAheadLog::replay(&wal_path, |entry| match entry {
            WalEntry::Insert(term) => store.insert(term),
            WalEntry::Update { id, update } => store.update(&id, update),
            WalEntry::SetInfo(info) => store.set_info(info),
        })
        .map_err(|e| unavailable(format!("write-ahead log replay failed: {e}")))?;

        let wal = WriteAheadLog::open(&wal_path).map_err(|e| unreachable(e.to_string()))?;

        tracing::debug!(
            dir = %dir.display(),
            terms = store.count()?,
            replayed,
            "opened term database"
        );

        Ok(Self {
            dir,
            store,
            wal: Mutex::new(wal),
        })
    }

    /// Create an empty database, replacing any previous one in `dir`.
    pub fn create(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        for name in [Self::SNAPSHOT_FILE, Self::WAL_FILE] {
            match std::fs::remove_file(dir.join(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        let wal = WriteAheadLog::open(&dir.join(Self::WAL_FILE))?;
        let db = Self {
            dir,
            store: MemoryTermStore::new(),
            wal: Mutex::new(wal),
        };
        db.checkpoint()?;
        Ok(db)
    }

    /// Write a fresh snapshot and empty the log.
    pub fn checkpoint(&self) -> StoreResult<()> {
        let mut wal = self.wal.lock();
        let info = self.store.info()?;
        let bytes = self.store.with_terms(|terms| encode_snapshot(terms, &info))?;

        let tmp = self.dir.join(format!("{}.tmp", Self::SNAPSHOT_FILE));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, self.dir.join(Self::SNAPSHOT_FILE))?;
        wal.truncate()?;

        tracing::info!(
            dir = %self.dir.display(),
            bytes = bytes.len(),
            "checkpointed term database"
        );
        Ok(())
    }

    /// Flush buffered log entries to disk.
    pub fn sync(&self) -> StoreResult<()> {
        self.wal.lock().sync()?;
        Ok(())
    }

    /// Entries logged since the last checkpoint (by this handle).
    pub fn pending_entries(&self) -> u64 {
        self.wal.lock().entries_written()
    }
}

#[cfg(test)]
impl TermDb {
    /// Wrap an existing store and an already-open log file.
    pub(crate) fn with_log(dir: PathBuf, store: MemoryTermStore, log: File) -> Self {
        Self {
            dir,
            store,
            wal: Mutex::new(WriteAheadLog {
                writer: BufWriter::new(log),
                entries: 0,
            }),
        }
    }
}

impl TermStore for TermDb {
    fn find_one(&self, id: &str) -> StoreResult<Option<Term>> {
        self.store.find_one(id)
    }

    fn find(&self, filter: TermFilter) -> StoreResult<Vec<Term>> {
        self.store.find(filter)
    }

    fn find_ids(&self, filter: TermFilter) -> StoreResult<Vec<String>> {
        self.store.find_ids(filter)
    }

    // Writes hold the log lock from the precondition check to the apply, so
    // the log never records a change the memory store then rejects, and a
    // failed append leaves memory untouched.
    fn insert(&self, term: Term) -> StoreResult<()> {
        let mut wal = self.wal.lock();
        if self.store.contains(&term.id)? {
            return Err(StoreError::DuplicateId(term.id));
        }
        wal.append(&WalEntry::Insert(term.clone()))?;
        self.store.insert(term)
    }

    fn update(&self, id: &str, update: TermUpdate) -> StoreResult<()> {
        let mut wal = self.wal.lock();
        if !self.store.contains(id)? {
            return Err(StoreError::MissingTerm(id.to_string()));
        }
        wal.append(&WalEntry::Update {
            id: id.to_string(),
            update: update.clone(),
        })?;
        self.store.update(id, update)
    }

    fn contains(&self, id: &str) -> StoreResult<bool> {
        self.store.contains(id)
    }

    fn count(&self) -> StoreResult<usize> {
        self.store.count()
    }

    fn search(&self, pattern: &Regex) -> StoreResult<Vec<Term>> {
        self.store.search(pattern)
    }

    fn search_words(&self, query: &str) -> StoreResult<Vec<Term>> {
        self.store.search_words(query)
    }

    fn ensure_indexes(&self) -> StoreResult<()> {
        self.store.ensure_indexes()
    }

    fn info(&self) -> StoreResult<Option<DbInfo>> {
        self.store.info()
    }

    fn set_info(&self, info: DbInfo) -> StoreResult<()> {
        let mut wal = self.wal.lock();
        wal.append(&WalEntry::SetInfo(info.clone()))?;
        self.store.set_info(info)
    }
}

impl Drop for TermDb {
    fn drop(&mut self) {
        if let Err(e) = self.wal.get_mut().sync() {
            tracing::warn!(dir = %self.dir.display(), error = %e, "failed to flush write-ahead log");
        }
    }
}
