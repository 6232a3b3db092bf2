use super::engine::KvBackend;
use super::txn::{KeyValue, KvMutation, Txn, TxnOp, TxnOpResponse, TxnResponse};
use crate::core::{MetaError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tokio::sync::RwLock;

/// Ordered in-memory key space.
///
/// Transactions evaluate their guards and apply their writes under a single
/// write lock, readers take the read lock, so a reader observes either all of a
/// transaction or none of it.
pub struct MemoryKvBackend {
    kvs: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    /// Upcoming mutating calls that fail with `Unavailable`
    injected: Mutex<InjectedFailure>,
}

#[derive(Debug, Default)]
struct InjectedFailure {
    /// Only txns writing under this prefix are failed; empty matches all.
    prefix: Vec<u8>,
    remaining: usize,
}

impl MemoryKvBackend {
    pub fn new() -> Self {
        Self {
            kvs: RwLock::new(BTreeMap::new()),
            injected: Mutex::new(InjectedFailure::default()),
        }
    }

    /// Build a backend pre-populated from a recovered key space
    pub fn from_map(kvs: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        Self {
            kvs: RwLock::new(kvs),
            injected: Mutex::new(InjectedFailure::default()),
        }
    }

    /// Make the next `n` mutating transactions fail as if the store were down.
    pub fn fail_next_writes(&self, n: usize) {
        self.fail_writes_under(Vec::new(), n);
    }

    /// Like [`fail_next_writes`](Self::fail_next_writes), but only counts and fails
    /// transactions that write a key starting with `prefix`.
    pub fn fail_writes_under(&self, prefix: impl Into<Vec<u8>>, n: usize) {
        let mut injected = self
            .injected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *injected = InjectedFailure {
            prefix: prefix.into(),
            remaining: n,
        };
    }

    pub async fn len(&self) -> usize {
        self.kvs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.kvs.read().await.is_empty()
    }

    /// Copy of the whole key space (for snapshots)
    pub async fn dump(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.kvs.read().await.clone()
    }

    /// Runs `f` over the key space while holding the read lock, so no
    /// transaction commits in between.
    pub(crate) async fn inspect<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&BTreeMap<Vec<u8>, Vec<u8>>) -> Result<R>,
    {
        let kvs = self.kvs.read().await;
        f(&kvs)
    }

    fn take_injected_failure(&self, txn: &Txn) -> Result<bool> {
        if !txn.mutates() {
            return Ok(false);
        }
        let mut injected = self.injected.lock()?;
        if injected.remaining == 0 || !txn.writes_under(&injected.prefix) {
            return Ok(false);
        }
        injected.remaining -= 1;
        Ok(true)
    }

    /// Runs `txn`, calling `before_commit` with the staged mutations while the
    /// write lock is held. If `before_commit` fails nothing is applied.
    pub(crate) async fn txn_with<F>(&self, txn: Txn, before_commit: F) -> Result<TxnResponse>
    where
        F: FnOnce(&[KvMutation]) -> Result<()>,
    {
        if self.take_injected_failure(&txn)? {
            return Err(MetaError::Unavailable(
                "injected write failure".to_string(),
            ));
        }

        let mut kvs = self.kvs.write().await;
        let succeeded = txn
            .compare
            .iter()
            .all(|cmp| cmp.holds(kvs.get(cmp.key()).map(|v| v.as_slice())));
        let ops = if succeeded { txn.success } else { txn.failure };

        // Stage writes so that gets later in the same branch observe them.
        let mut staged: HashMap<Vec<u8>, Option<Vec<u8>>> = HashMap::new();
        let mut mutations = Vec::new();
        let mut responses = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                TxnOp::Get(key) => {
                    let current = match staged.get(&key) {
                        Some(value) => value.clone(),
                        None => kvs.get(&key).cloned(),
                    };
                    responses.push(TxnOpResponse::Get(
                        current.map(|value| KeyValue { key, value }),
                    ));
                }
                TxnOp::Put(key, value) => {
                    staged.insert(key.clone(), Some(value.clone()));
                    mutations.push(KvMutation::Put { key, value });
                    responses.push(TxnOpResponse::Put);
                }
                TxnOp::Delete(key) => {
                    let existed = match staged.get(&key) {
                        Some(value) => value.is_some(),
                        None => kvs.contains_key(&key),
                    };
                    staged.insert(key.clone(), None);
                    mutations.push(KvMutation::Delete { key });
                    responses.push(TxnOpResponse::Delete { existed });
                }
            }
        }

        if !mutations.is_empty() {
            before_commit(&mutations)?;
            apply_mutations(&mut kvs, mutations);
        }

        Ok(TxnResponse {
            succeeded,
            responses,
        })
    }
}

/// Apply committed mutations in order
pub(crate) fn apply_mutations(kvs: &mut BTreeMap<Vec<u8>, Vec<u8>>, mutations: Vec<KvMutation>) {
    for mutation in mutations {
        match mutation {
            KvMutation::Put { key, value } => {
                kvs.insert(key, value);
            }
            KvMutation::Delete { key } => {
                kvs.remove(&key);
            }
        }
    }
}

impl Default for MemoryKvBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvBackend for MemoryKvBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &[u8]) -> Result<Option<KeyValue>> {
        let kvs = self.kvs.read().await;
        Ok(kvs.get(key).map(|value| KeyValue::new(key, value.clone())))
    }

    async fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<KeyValue>> {
        let kvs = self.kvs.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| {
                kvs.get(key)
                    .map(|value| KeyValue::new(key.clone(), value.clone()))
            })
            .collect())
    }

    async fn range(&self, prefix: &[u8]) -> Result<Vec<KeyValue>> {
        let kvs = self.kvs.read().await;
        Ok(kvs
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| KeyValue::new(key.clone(), value.clone()))
            .collect())
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
        self.txn_with(txn, |_| Ok(())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::txn::Compare;

    #[tokio::test]
    async fn txn_applies_only_when_guards_hold() {
        let kv = MemoryKvBackend::new();
        let create = || {
            Txn::new()
                .when([Compare::KeyAbsent(b"a".to_vec())])
                .and_then([TxnOp::Put(b"a".to_vec(), b"1".to_vec())])
                .or_else([TxnOp::Get(b"a".to_vec())])
        };

        let first = kv.txn(create()).await.unwrap();
        assert!(first.succeeded);

        let second = kv.txn(create()).await.unwrap();
        assert!(!second.succeeded);
        let fetched: Vec<_> = second.fetched().collect();
        assert_eq!(fetched[0].unwrap().value, b"1".to_vec());
    }

    #[tokio::test]
    async fn range_is_prefix_bounded_and_ordered() {
        let kv = MemoryKvBackend::new();
        kv.put(KeyValue::new("p/b", "2")).await.unwrap();
        kv.put(KeyValue::new("p/a", "1")).await.unwrap();
        kv.put(KeyValue::new("q/a", "3")).await.unwrap();

        let found = kv.range(b"p/").await.unwrap();
        let keys: Vec<_> = found.iter().map(|kv| kv.key.clone()).collect();
        assert_eq!(keys, vec![b"p/a".to_vec(), b"p/b".to_vec()]);
    }

    #[tokio::test]
    async fn injected_failure_leaves_no_effect() {
        let kv = MemoryKvBackend::new();
        kv.fail_next_writes(1);
        let err = kv.put(KeyValue::new("k", "v")).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(kv.get(b"k").await.unwrap().is_none());

        kv.put(KeyValue::new("k", "v")).await.unwrap();
        assert!(kv.get(b"k").await.unwrap().is_some());
        assert!(kv.delete(b"k").await.unwrap());
        assert!(!kv.delete(b"k").await.unwrap());
    }

    #[tokio::test]
    async fn prefix_scoped_failure_skips_other_writes() {
        let kv = MemoryKvBackend::new();
        kv.fail_writes_under("route/", 1);
        kv.put(KeyValue::new("seq", "1")).await.unwrap();
        let err = kv
            .txn(Txn::new().and_then([
                TxnOp::Put(b"route/a".to_vec(), b"r".to_vec()),
                TxnOp::Put(b"id/1".to_vec(), b"a".to_vec()),
            ]))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(kv.get(b"id/1").await.unwrap().is_none());
        assert_eq!(kv.len().await, 1);

        // The injected failure is spent.
        kv.put(KeyValue::new("route/a", "r")).await.unwrap();
        assert_eq!(kv.len().await, 2);
    }

    #[tokio::test]
    async fn failing_commit_hook_discards_staged_writes() {
        let kv = MemoryKvBackend::new();
        let txn = Txn::new().and_then([TxnOp::Put(b"k".to_vec(), b"v".to_vec())]);
        let result = kv
            .txn_with(txn, |_| Err(MetaError::Unavailable("disk full".into())))
            .await;
        assert!(result.is_err());
        assert!(kv.is_empty().await);
    }
}
