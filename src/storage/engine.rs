use super::txn::{KeyValue, Txn, TxnResponse};
use crate::core::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Key-value backend trait - allows pluggable metadata stores.
///
/// Every failure to reach or commit to the store is reported as
/// `MetaError::Unavailable` so callers can retry.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Read a single key
    async fn get(&self, key: &[u8]) -> Result<Option<KeyValue>>;

    /// Read several keys at once; missing keys are skipped
    async fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<KeyValue>>;

    /// All pairs whose key starts with `prefix`, in key order
    async fn range(&self, prefix: &[u8]) -> Result<Vec<KeyValue>>;

    /// Unconditional write
    async fn put(&self, kv: KeyValue) -> Result<()>;

    /// Unconditional delete; returns whether the key existed
    async fn delete(&self, key: &[u8]) -> Result<bool>;

    /// Atomic compare-then-apply
    async fn txn(&self, txn: Txn) -> Result<TxnResponse>;
}

pub type KvBackendRef = Arc<dyn KvBackend>;
