use super::{MetaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Table identity
// ============================================================================

/// Namespace-qualified table identifier: `catalog.schema.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName {
    pub catalog_name: String,
    pub schema_name: String,
    pub table_name: String,
}

impl TableName {
    pub fn new(
        catalog_name: impl Into<String>,
        schema_name: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            catalog_name: catalog_name.into(),
            schema_name: schema_name.into(),
            table_name: table_name.into(),
        }
    }

    /// Parses the dotted form `catalog.schema.table`. Only the first two dots
    /// separate parts, so the table part may itself contain dots.
    pub fn parse(dotted: &str) -> Result<Self> {
        let parts: Vec<&str> = dotted.splitn(3, '.').collect();
        if parts.len() != 3 {
            return Err(MetaError::InvalidArgument(format!(
                "table name '{}' must have the form catalog.schema.table",
                dotted
            )));
        }
        let name = Self::new(parts[0], parts[1], parts[2]);
        name.validate()?;
        Ok(name)
    }

    pub fn validate(&self) -> Result<()> {
        for (part, value) in [
            ("catalog_name", &self.catalog_name),
            ("schema_name", &self.schema_name),
            ("table_name", &self.table_name),
        ] {
            if value.trim().is_empty() {
                return Err(MetaError::InvalidArgument(format!(
                    "{} must not be empty",
                    part
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.catalog_name, self.schema_name, self.table_name
        )
    }
}

/// Numeric surrogate id, assigned once at creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TableId {
    pub id: u32,
}

impl TableId {
    pub fn new(id: u32) -> Self {
        Self { id }
    }
}

impl From<u32> for TableId {
    fn from(id: u32) -> Self {
        Self { id }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

// ============================================================================
// Peers
// ============================================================================

/// A physical storage node. Referenced by index from region routes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Peer {
    pub id: u64,
    pub addr: String,
}

impl Peer {
    pub fn new(id: u64, addr: impl Into<String>) -> Self {
        Self {
            id,
            addr: addr.into(),
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}({})", self.id, self.addr)
    }
}

// ============================================================================
// Headers
// ============================================================================

/// Opaque request metadata. The router only echoes it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestHeader {
    pub protocol_version: u64,
    pub cluster_id: u64,
    pub member_id: u64,
}

impl RequestHeader {
    pub fn new(cluster_id: u64, member_id: u64) -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            cluster_id,
            member_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeaderError {
    pub code: i32,
    pub err_msg: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub protocol_version: u64,
    pub cluster_id: u64,
    pub error: Option<HeaderError>,
}

impl ResponseHeader {
    /// Builds a success header echoing the request's version and cluster.
    pub fn success(request: Option<&RequestHeader>) -> Self {
        let (protocol_version, cluster_id) = request
            .map(|h| (h.protocol_version, h.cluster_id))
            .unwrap_or((crate::PROTOCOL_VERSION, 0));
        Self {
            protocol_version,
            cluster_id,
            error: None,
        }
    }

    pub fn failed(request: Option<&RequestHeader>, err: &MetaError) -> Self {
        let mut header = Self::success(request);
        header.error = Some(HeaderError {
            code: err.status_code() as i32,
            err_msg: err.message().to_string(),
        });
        header
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
