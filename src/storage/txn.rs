// ============================================================================
// Transactions over the key-value backend
// ============================================================================

use serde::{Deserialize, Serialize};

/// A key/value pair as stored in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl KeyValue {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Guard evaluated before a transaction applies its operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compare {
    KeyAbsent(Vec<u8>),
    KeyExists(Vec<u8>),
    ValueEquals(Vec<u8>, Vec<u8>),
}

impl Compare {
    pub fn key(&self) -> &[u8] {
        match self {
            Compare::KeyAbsent(key) | Compare::KeyExists(key) | Compare::ValueEquals(key, _) => {
                key
            }
        }
    }

    /// Evaluates the guard against the current value of its key.
    pub fn holds(&self, current: Option<&[u8]>) -> bool {
        match self {
            Compare::KeyAbsent(_) => current.is_none(),
            Compare::KeyExists(_) => current.is_some(),
            Compare::ValueEquals(_, expected) => current == Some(expected.as_slice()),
        }
    }
}

/// A single committed write, as recorded in the write-ahead log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KvMutation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
    Get(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOpResponse {
    Put,
    Delete { existed: bool },
    Get(Option<KeyValue>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnResponse {
    pub succeeded: bool,
    pub responses: Vec<TxnOpResponse>,
}

impl TxnResponse {
    /// Values returned by `Get` operations, in op order.
    pub fn fetched(&self) -> impl Iterator<Item = Option<&KeyValue>> {
        self.responses.iter().filter_map(|resp| match resp {
            TxnOpResponse::Get(kv) => Some(kv.as_ref()),
            _ => None,
        })
    }
}

/// Compare-then-apply transaction.
///
/// If every compare holds, `success` ops are applied atomically; otherwise the
/// `failure` ops run. Failure ops are expected to be reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Txn {
    pub compare: Vec<Compare>,
    pub success: Vec<TxnOp>,
    pub failure: Vec<TxnOp>,
}

impl Txn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn when(mut self, compare: impl IntoIterator<Item = Compare>) -> Self {
        self.compare.extend(compare);
        self
    }

    pub fn and_then(mut self, ops: impl IntoIterator<Item = TxnOp>) -> Self {
        self.success.extend(ops);
        self
    }

    pub fn or_else(mut self, ops: impl IntoIterator<Item = TxnOp>) -> Self {
        self.failure.extend(ops);
        self
    }

    /// Concatenates guards and ops of several transactions into one.
    pub fn merge_all(txns: impl IntoIterator<Item = Txn>) -> Self {
        txns.into_iter().fold(Txn::new(), |acc, txn| {
            acc.when(txn.compare)
                .and_then(txn.success)
                .or_else(txn.failure)
        })
    }

    /// Returns true if any op of the success branch writes.
    pub fn mutates(&self) -> bool {
        self.success
            .iter()
            .any(|op| matches!(op, TxnOp::Put(..) | TxnOp::Delete(_)))
    }

    /// Whether the success branch writes a key starting with `prefix`.
    pub fn writes_under(&self, prefix: &[u8]) -> bool {
        self.success.iter().any(|op| match op {
            TxnOp::Put(key, _) | TxnOp::Delete(key) => key.starts_with(prefix),
            TxnOp::Get(_) => false,
        })
    }
}
