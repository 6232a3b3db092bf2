//! Write-Ahead Logging (WAL) and snapshot persistence for the metadata key space

use super::txn::{KeyValue, KvMutation};
use crate::core::{MetaError, Result};
use chrono::Utc;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const WAL_FILE: &str = "routemeta.wal";
pub const SNAPSHOT_FILE: &str = "routemeta.snapshot";
const SNAPSHOT_VERSION: u32 = 1;

fn unavailable(context: &str, err: impl std::fmt::Display) -> MetaError {
    MetaError::Unavailable(format!("{}: {}", context, err))
}

// ============================================================================
// WAL Entry Types
// ============================================================================

/// Write-Ahead Log entry types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalEntry {
    /// Mutations of one committed transaction, applied together on replay
    Batch(Vec<KvMutation>),
}

// ============================================================================
// Key Space Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct KvSnapshot {
    pub version: u32,
    pub kvs: Vec<KeyValue>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: i64,
    pub key_count: usize,
}

impl KvSnapshot {
    pub fn new(kvs: &BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            kvs: kvs
                .iter()
                .map(|(key, value)| KeyValue::new(key.clone(), value.clone()))
                .collect(),
            metadata: SnapshotMetadata {
                created_at: Utc::now().timestamp_millis(),
                key_count: kvs.len(),
            },
        }
    }

    pub fn into_map(self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.kvs.into_iter().map(|kv| (kv.key, kv.value)).collect()
    }
}

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurabilityMode {
    /// fsync after every append
    Sync,
    /// flush to the OS after every append
    #[default]
    Async,
    /// nothing is written to disk
    None,
}

// ============================================================================
// WAL Manager
// ============================================================================

pub struct WalManager {
    wal_path: PathBuf,
    wal_file: Option<BufWriter<File>>,
    durability_mode: DurabilityMode,
    /// Length of the log up to the last acknowledged record
    len: u64,
    /// Set when a failed append could not be rolled back; cleared by `clear`
    poisoned: bool,
    entries_since_checkpoint: usize,
    checkpoint_threshold: usize,
    #[cfg(test)]
    faults: InjectedFaults,
}

#[cfg(test)]
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct InjectedFaults {
    /// Fail the next append after its record reached the file
    pub after_flush: bool,
    /// Fail truncating the log back after a failed append
    pub rollback: bool,
}

impl WalManager {
    pub fn new<P: AsRef<Path>>(wal_path: P, durability_mode: DurabilityMode) -> Result<Self> {
        let wal_path = wal_path.as_ref().to_path_buf();
        if let Some(parent) = wal_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| unavailable("Failed to create WAL directory", e))?;
        }

        let (wal_file, len) = if durability_mode != DurabilityMode::None {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&wal_path)
                .map_err(|e| unavailable("Failed to open WAL file", e))?;
            let len = file
                .metadata()
                .map_err(|e| unavailable("Failed to stat WAL file", e))?
                .len();
            (Some(BufWriter::new(file)), len)
        } else {
            (None, 0)
        };

        Ok(Self {
            wal_path,
            wal_file,
            durability_mode,
            len,
            poisoned: false,
            entries_since_checkpoint: 0,
            checkpoint_threshold: 1000,
            #[cfg(test)]
            faults: InjectedFaults::default(),
        })
    }

    /// Appends one length-prefixed MessagePack record.
    ///
    /// On error the log is truncated back to its previous length, so a record
    /// reported as failed is never replayed. If that truncation fails too the
    /// WAL refuses every append until the next checkpoint.
    pub fn append(&mut self, entry: &WalEntry) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        if self.poisoned {
            return Err(MetaError::Unavailable(format!(
                "WAL {} has an unrolled-back record, writes are refused until a checkpoint",
                self.wal_path.display()
            )));
        }
        let serialized =
            rmp_serde::to_vec(entry).map_err(|e| unavailable("Failed to serialize WAL entry", e))?;
        let mut record = Vec::with_capacity(4 + serialized.len());
        record.extend_from_slice(&(serialized.len() as u32).to_le_bytes());
        record.extend_from_slice(&serialized);

        if let Err(err) = self.write_record(&record) {
            self.rollback();
            return Err(err);
        }
        self.len += record.len() as u64;
        self.entries_since_checkpoint += 1;
        Ok(())
    }

    fn write_record(&mut self, record: &[u8]) -> Result<()> {
        let file = self
            .wal_file
            .as_mut()
            .ok_or_else(|| MetaError::Unavailable("WAL file not initialized".to_string()))?;
        file.write_all(record)
            .map_err(|e| unavailable("Failed to write WAL", e))?;
        file.flush()
            .map_err(|e| unavailable("Failed to flush WAL", e))?;
        #[cfg(test)]
        if std::mem::take(&mut self.faults.after_flush) {
            return Err(unavailable("Failed to sync WAL", "injected fault"));
        }
        if self.durability_mode == DurabilityMode::Sync {
            file.get_mut()
                .sync_all()
                .map_err(|e| unavailable("Failed to sync WAL", e))?;
        }
        Ok(())
    }

    /// Drops buffered bytes without flushing them and cuts the file back to the
    /// last acknowledged record.
    fn rollback(&mut self) {
        if let Some(writer) = self.wal_file.take() {
            let (_file, _unflushed) = writer.into_parts();
        }
        match self.truncate_to(self.len) {
            Ok(file) => self.wal_file = Some(BufWriter::new(file)),
            Err(err) => {
                error!(
                    "Failed to roll back WAL {} to {} bytes, refusing writes until checkpoint: {}",
                    self.wal_path.display(),
                    self.len,
                    err
                );
                self.poisoned = true;
            }
        }
    }

    fn truncate_to(&self, len: u64) -> std::io::Result<File> {
        #[cfg(test)]
        if self.faults.rollback {
            return Err(std::io::Error::other("injected fault"));
        }
        let file = OpenOptions::new().append(true).open(&self.wal_path)?;
        file.set_len(len)?;
        file.sync_all()?;
        Ok(file)
    }

    #[cfg(test)]
    pub(crate) fn inject_faults(&mut self, faults: InjectedFaults) {
        self.faults = faults;
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Reads every complete record. A torn trailing record is dropped.
    pub fn read_all(&self) -> Result<Vec<WalEntry>> {
        if !self.wal_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.wal_path)
            .map_err(|e| unavailable("Failed to open WAL for reading", e))?;
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(unavailable("Failed to read WAL entry length", e)),
            }
            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut data = vec![0u8; len];
            match reader.read_exact(&mut data) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    warn!(
                        "Ignoring torn WAL record at end of {} ({} bytes expected)",
                        self.wal_path.display(),
                        len
                    );
                    break;
                }
                Err(e) => return Err(unavailable("Failed to read WAL entry data", e)),
            }
            match rmp_serde::from_slice::<WalEntry>(&data) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(
                        "Stopping WAL replay at undecodable record in {}: {}",
                        self.wal_path.display(),
                        e
                    );
                    break;
                }
            }
        }
        Ok(entries)
    }

    pub fn clear(&mut self) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        self.wal_file = None;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.wal_path)
            .map_err(|e| unavailable("Failed to truncate WAL", e))?;
        drop(file);
        let file = OpenOptions::new()
            .append(true)
            .open(&self.wal_path)
            .map_err(|e| unavailable("Failed to reopen WAL", e))?;
        self.wal_file = Some(BufWriter::new(file));
        self.len = 0;
        self.poisoned = false;
        self.entries_since_checkpoint = 0;
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.entries_since_checkpoint >= self.checkpoint_threshold
    }

    pub fn entries_since_checkpoint(&self) -> usize {
        self.entries_since_checkpoint
    }

    pub fn set_checkpoint_threshold(&mut self, threshold: usize) {
        self.checkpoint_threshold = threshold;
    }

    pub fn path(&self) -> &Path {
        &self.wal_path
    }
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    snapshot_path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    /// Writes the snapshot to a temp file in the same directory, then renames it over
    /// the previous snapshot.
    pub fn save(&self, snapshot: &KvSnapshot) -> Result<()> {
        let parent = self
            .snapshot_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent)
            .map_err(|e| unavailable("Failed to create snapshot directory", e))?;

        let serialized = rmp_serde::to_vec(snapshot)
            .map_err(|e| unavailable("Failed to serialize snapshot", e))?;
        let temp = NamedTempFile::new_in(&parent)
            .map_err(|e| unavailable("Failed to create temp file", e))?;
        let mut writer = BufWriter::new(temp);
        writer
            .write_all(&serialized)
            .map_err(|e| unavailable("Failed to write snapshot", e))?;
        let temp = writer
            .into_inner()
            .map_err(|e| unavailable("Failed to flush snapshot", e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| unavailable("Failed to sync snapshot", e))?;
        temp.persist(&self.snapshot_path)
            .map_err(|e| unavailable("Failed to rename snapshot", e))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<KvSnapshot>> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let mut file = File::open(&self.snapshot_path)
            .map_err(|e| unavailable("Failed to open snapshot", e))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| unavailable("Failed to read snapshot", e))?;
        let snapshot: KvSnapshot = rmp_serde::from_slice(&data)
            .map_err(|e| MetaError::Internal(format!("Failed to deserialize snapshot: {}", e)))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(MetaError::Internal(format!(
                "Unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(Some(snapshot))
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }
}

// ============================================================================
// Persistence Manager
// ============================================================================

pub struct PersistenceManager {
    wal: WalManager,
    snapshot: SnapshotManager,
    durability_mode: DurabilityMode,
}

impl PersistenceManager {
    pub fn new<P: AsRef<Path>>(data_dir: P, durability_mode: DurabilityMode) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let wal = WalManager::new(data_dir.join(WAL_FILE), durability_mode)?;
        let snapshot = SnapshotManager::new(data_dir.join(SNAPSHOT_FILE));
        Ok(Self {
            wal,
            snapshot,
            durability_mode,
        })
    }

    pub fn log(&mut self, entry: &WalEntry) -> Result<()> {
        self.wal.append(entry)
    }

    pub fn checkpoint(&mut self, kvs: &BTreeMap<Vec<u8>, Vec<u8>>) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        self.snapshot.save(&KvSnapshot::new(kvs))?;
        self.wal.clear()?;
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.wal.needs_checkpoint()
    }

    /// Snapshot plus WAL replay. Returns an empty key space for a fresh directory.
    pub fn recover(&self) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
        let mut kvs = match self.snapshot.load()? {
            Some(snapshot) => snapshot.into_map(),
            None => BTreeMap::new(),
        };

        for entry in self.wal.read_all()? {
            match entry {
                WalEntry::Batch(mutations) => super::memory::apply_mutations(&mut kvs, mutations),
            }
        }
        Ok(kvs)
    }

    pub fn wal(&self) -> &WalManager {
        &self.wal
    }

    pub fn wal_mut(&mut self) -> &mut WalManager {
        &mut self.wal
    }

    pub fn snapshot(&self) -> &SnapshotManager {
        &self.snapshot
    }

    pub fn durability_mode(&self) -> DurabilityMode {
        self.durability_mode
    }
}
