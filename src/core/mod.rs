pub mod error;
pub mod types;

pub use error::{MetaError, Result, StatusCode};
pub use types::{HeaderError, Peer, RequestHeader, ResponseHeader, TableId, TableName};
