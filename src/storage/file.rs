use super::engine::KvBackend;
use super::memory::MemoryKvBackend;
use super::persistence::{DurabilityMode, PersistenceManager, WalEntry};
use super::txn::{KeyValue, Txn, TxnOp, TxnOpResponse, TxnResponse};
use crate::core::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{Level, event};

/// Durable key space: in-memory state with a write-ahead log and snapshots.
///
/// A transaction's mutations are appended to the WAL while the key space write
/// lock is held and only become visible after the append succeeded. A failed
/// append is rolled back, so nothing a caller saw fail is replayed on reopen.
///
/// Holding the lock across the append keeps log order identical to apply order.
/// The cost is that with [`DurabilityMode::Sync`] every reader, including
/// routes of unrelated tables, waits out the fsync of an in-flight write.
/// [`DurabilityMode::Async`] only holds the lock for the write to the OS.
pub struct FileKvBackend {
    data_dir: PathBuf,
    state: MemoryKvBackend,
    persistence: Mutex<PersistenceManager>,
}

impl FileKvBackend {
    /// Opens (or creates) a store in `data_dir`, recovering snapshot + WAL.
    pub fn open<P: AsRef<Path>>(
        data_dir: P,
        durability_mode: DurabilityMode,
        checkpoint_threshold: usize,
    ) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let mut persistence = PersistenceManager::new(&data_dir, durability_mode)?;
        persistence
            .wal_mut()
            .set_checkpoint_threshold(checkpoint_threshold);
        let kvs = persistence.recover()?;
        // Replay may have stopped at a torn record; fold the log into a snapshot
        // so new records are never appended behind it.
        let wal_len = std::fs::metadata(persistence.wal().path())
            .map(|m| m.len())
            .unwrap_or(0);
        if wal_len > 0 {
            persistence.checkpoint(&kvs)?;
        }
        event!(
            Level::INFO,
            dir = %data_dir.display(),
            keys = kvs.len(),
            "metadata store recovered"
        );
        Ok(Self {
            data_dir,
            state: MemoryKvBackend::from_map(kvs),
            persistence: Mutex::new(persistence),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Writes a snapshot of the current key space and truncates the WAL.
    pub async fn checkpoint(&self) -> Result<()> {
        let keys = self
            .state
            .inspect(|kvs| {
                let mut persistence = self.persistence.lock()?;
                persistence.checkpoint(kvs)?;
                Ok(kvs.len())
            })
            .await?;
        event!(Level::DEBUG, keys, "metadata store checkpointed");
        Ok(())
    }

    async fn checkpoint_if_needed(&self) -> Result<()> {
        let needed = self.persistence.lock()?.needs_checkpoint();
        if needed {
            self.checkpoint().await?;
        }
        Ok(())
    }

    /// Test hook: fail the next `n` mutating transactions.
    pub fn fail_next_writes(&self, n: usize) {
        self.state.fail_next_writes(n);
    }

    /// Test hook: fail the next `n` transactions writing under `prefix`.
    pub fn fail_writes_under(&self, prefix: impl Into<Vec<u8>>, n: usize) {
        self.state.fail_writes_under(prefix, n);
    }
}

#[async_trait]
impl KvBackend for FileKvBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &[u8]) -> Result<Option<KeyValue>> {
        self.state.get(key).await
    }

    async fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<KeyValue>> {
        self.state.batch_get(keys).await
    }

    async fn range(&self, prefix: &[u8]) -> Result<Vec<KeyValue>> {
        self.state.range(prefix).await
    }

    async fn put(&self, kv: KeyValue) -> Result<()> {
        self.txn(Txn::new().and_then([TxnOp::Put(kv.key, kv.value)]))
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<bool> {
        let resp = self
            .txn(Txn::new().and_then([TxnOp::Delete(key.to_vec())]))
            .await?;
        Ok(matches!(
            resp.responses.first(),
            Some(TxnOpResponse::Delete { existed: true })
        ))
    }

    async fn txn(&self, txn: Txn) -> Result<TxnResponse> {
        let resp = self
            .state
            .txn_with(txn, |mutations| {
                let mut persistence = self.persistence.lock()?;
                persistence.log(&WalEntry::Batch(mutations.to_vec()))
            })
            .await?;
        if let Err(err) = self.checkpoint_if_needed().await {
            // The txn is already durable in the WAL; a failed checkpoint is retried later.
            log::warn!("Checkpoint of {} failed: {}", self.data_dir.display(), err);
        }
        Ok(resp)
    }
}
