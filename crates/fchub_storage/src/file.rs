//! Durable keyed store backed by an append-only batch log.

use crate::backend::{KeyValueStore, ScanControl};
use crate::batch::{BatchOp, WriteBatch};
use crate::error::{StorageError, StorageResult};
use crate::memory::MemoryStore;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

const LENGTH_PREFIX: usize = 4;

/// A file-backed keyed store.
///
/// Every committed [`WriteBatch`] is CBOR-encoded and appended to a log file
/// as `len (u32 LE) ∥ payload`. The ordered map is rebuilt by replaying the
/// log on open, so data survives process restarts.
///
/// # Durability
///
/// - with `sync_on_commit` (the default) each commit calls `File::sync_data()`
/// - a torn final record left by a crash is discarded on open
/// - [`FileStore::compact`] rewrites the log as one snapshot batch
///
/// # Example
///
/// ```no_run
/// use fchub_storage::{FileStore, KeyValueStore, WriteBatch};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("hub.log")).unwrap();
/// let mut batch = WriteBatch::new();
/// batch.put(b"key".to_vec(), b"value".to_vec());
/// store.commit(batch).unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    log: Mutex<File>,
    map: MemoryStore,
    sync_on_commit: bool,
    closed: AtomicBool,
}

impl FileStore {
    /// Opens or creates a store at `path`, replaying any existing log.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or a complete record
    /// fails to decode.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let map = MemoryStore::new();
        let (records, valid_len) = replay(&mut file, &map)?;
        let file_len = file.metadata()?.len();
        if valid_len < file_len {
            warn!(
                path = %path.display(),
                discarded = file_len - valid_len,
                "discarding torn record at end of batch log"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::End(0))?;

        info!(path = %path.display(), records, entries = map.len(), "opened file store");

        Ok(Self {
            path: path.to_path_buf(),
            log: Mutex::new(file),
            map,
            sync_on_commit: true,
            closed: AtomicBool::new(false),
        })
    }

    /// Opens or creates a store, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the log cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Sets whether each commit waits for the log to reach disk.
    #[must_use]
    pub fn with_sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Returns the path to the batch log.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Forces the log to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the sync fails.
    pub fn sync(&self) -> StorageResult<()> {
        self.ensure_open()?;
        self.log.lock().sync_all()?;
        Ok(())
    }

    /// Rewrites the log as a single batch holding the live entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the compacted log cannot be written or swapped in.
    pub fn compact(&self) -> StorageResult<()> {
        self.ensure_open()?;
        let mut log = self.log.lock();

        let mut snapshot = WriteBatch::new();
        for (key, value) in self.map.snapshot() {
            snapshot.put(key, value);
        }

        let tmp_path = self.path.with_extension("compact");
        {
            let mut tmp = File::create(&tmp_path)?;
            if !snapshot.is_empty() {
                tmp.write_all(&encode_record(&snapshot)?)?;
            }
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        let mut reopened = OpenOptions::new().read(true).write(true).open(&self.path)?;
        reopened.seek(SeekFrom::End(0))?;
        *log = reopened;

        info!(path = %self.path.display(), entries = snapshot.len(), "compacted batch log");
        Ok(())
    }

    /// Closes the store. Further operations fail with [`StorageError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub fn close(&self) -> StorageResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.log.lock().sync_all()?;
        Ok(())
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        self.map.get(key)
    }

    fn commit(&self, batch: WriteBatch) -> StorageResult<()> {
        self.ensure_open()?;
        if batch.is_empty() {
            return Ok(());
        }

        let record = encode_record(&batch)?;
        let mut log = self.log.lock();
        log.write_all(&record)?;
        if self.sync_on_commit {
            log.sync_data()?;
        } else {
            log.flush()?;
        }
        self.map.apply(batch.into_ops());
        Ok(())
    }

    fn scan_prefix_from(
        &self,
        prefix: &[u8],
        from: &[u8],
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> ScanControl,
    ) -> StorageResult<()> {
        self.ensure_open()?;
        self.map.scan_prefix_from(prefix, from, visitor)
    }

    fn last_with_prefix(&self, prefix: &[u8]) -> StorageResult<Option<(Vec<u8>, Vec<u8>)>> {
        self.ensure_open()?;
        self.map.last_with_prefix(prefix)
    }
}

fn encode_record(batch: &WriteBatch) -> StorageResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(batch, &mut payload)
        .map_err(|e| StorageError::Codec(e.to_string()))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| StorageError::Codec(format!("batch too large: {} bytes", payload.len())))?;

    let mut record = Vec::with_capacity(LENGTH_PREFIX + payload.len());
    record.extend_from_slice(&len.to_le_bytes());
    record.extend_from_slice(&payload);
    Ok(record)
}

/// Replays every complete record into `map`.
///
/// Returns the number of records applied and the byte length of the valid
/// log prefix.
fn replay(file: &mut File, map: &MemoryStore) -> StorageResult<(usize, u64)> {
    let mut bytes = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut bytes)?;

    let mut offset = 0usize;
    let mut records = 0usize;
    while bytes.len() - offset >= LENGTH_PREFIX {
        let mut len_bytes = [0u8; LENGTH_PREFIX];
        len_bytes.copy_from_slice(&bytes[offset..offset + LENGTH_PREFIX]);
        let len = u32::from_le_bytes(len_bytes) as usize;

        let start = offset + LENGTH_PREFIX;
        let Some(end) = start.checked_add(len).filter(|end| *end <= bytes.len()) else {
            break;
        };

        let batch: WriteBatch = ciborium::from_reader(&bytes[start..end]).map_err(|e| {
            StorageError::Corrupted(format!("record at offset {offset} failed to decode: {e}"))
        })?;
        map.apply(batch.into_ops());

        offset = end;
        records += 1;
    }

    Ok((records, offset as u64))
}
