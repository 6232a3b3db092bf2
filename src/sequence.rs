// ============================================================================
// Id sequence backed by the metadata store
// ============================================================================

use crate::core::{MetaError, Result};
use crate::storage::{Compare, KvBackendRef, Txn, TxnOp};
use tracing::{Level, event};

/// Hands out increasing ids stored under a single key.
///
/// Allocation is a compare-and-swap on the stored value, so several routers
/// sharing one store never hand out the same id. Ids are never reused; an id
/// whose table failed to commit is simply skipped.
pub struct Sequence {
    kv: KvBackendRef,
    key: Vec<u8>,
    start: u64,
    max: u64,
    max_attempts: usize,
}

impl Sequence {
    pub fn new(
        kv: KvBackendRef,
        key: impl Into<Vec<u8>>,
        start: u64,
        max: u64,
        max_attempts: usize,
    ) -> Self {
        Self {
            kv,
            key: key.into(),
            start,
            max,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Returns the next id.
    ///
    /// Fails with `Unavailable` when the store rejects the write, when every CAS
    /// attempt lost against concurrent allocators, or when the id space is used up.
    pub async fn next(&self) -> Result<u64> {
        for attempt in 1..=self.max_attempts {
            let current = self.kv.get(&self.key).await?;
            let (value, compare) = match current {
                Some(kv) => (decode(&kv.value)?, Compare::ValueEquals(self.key.clone(), kv.value)),
                None => (self.start, Compare::KeyAbsent(self.key.clone())),
            };
            let next = value.checked_add(1).filter(|_| value <= self.max);
            let Some(next) = next else {
                return Err(MetaError::Unavailable(format!(
                    "id sequence '{}' exhausted at {}",
                    String::from_utf8_lossy(&self.key),
                    value
                )));
            };

            let txn = Txn::new()
                .when([compare])
                .and_then([TxnOp::Put(self.key.clone(), encode(next))]);
            if self.kv.txn(txn).await?.succeeded {
                return Ok(value);
            }
            event!(Level::DEBUG, attempt, "id sequence CAS lost, retrying");
        }
        Err(MetaError::Unavailable(format!(
            "id sequence '{}' contended for {} attempts",
            String::from_utf8_lossy(&self.key),
            self.max_attempts
        )))
    }

    /// Next id without allocating it.
    pub async fn peek(&self) -> Result<u64> {
        match self.kv.get(&self.key).await? {
            Some(kv) => decode(&kv.value),
            None => Ok(self.start),
        }
    }
}

fn encode(value: u64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

fn decode(raw: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = raw.try_into().map_err(|_| {
        MetaError::Internal(format!("sequence value has {} bytes, expected 8", raw.len()))
    })?;
    Ok(u64::from_be_bytes(bytes))
}
