pub mod engine;
pub mod file;
pub mod memory;
pub mod persistence;
pub mod txn;

pub use engine::{KvBackend, KvBackendRef};
pub use file::FileKvBackend;
pub use memory::MemoryKvBackend;
pub use persistence::{DurabilityMode, PersistenceManager};
pub use txn::{Compare, KeyValue, KvMutation, Txn, TxnOp, TxnOpResponse, TxnResponse};
