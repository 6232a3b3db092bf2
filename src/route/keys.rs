//! Keys used in the metadata store.
//!
//! 1. Table route key: `__table_route/{catalog}/{schema}/{table}`
//!    - The value is an encoded `TableRouteValue`.
//! 2. Table id key: `__table_id/{table_id}`
//!    - The value is the encoded `TableName`; this is the secondary index used to
//!      address a table by id.
//! 3. Table id sequence: `__table_id_seq`
//!    - Next id to hand out, big-endian u64.

use crate::core::{MetaError, Result, TableId, TableName};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

pub const TABLE_ROUTE_PREFIX: &str = "__table_route";
pub const TABLE_ID_PREFIX: &str = "__table_id";
pub const TABLE_ID_SEQUENCE_KEY: &str = "__table_id_seq";

pub const NAME_PATTERN: &str = r"[a-zA-Z_:-][a-zA-Z0-9_:\-\.@#]*";

lazy_static! {
    static ref NAME_REGEX: Regex = Regex::new(&format!("^{NAME_PATTERN}$")).unwrap();
    static ref TABLE_ROUTE_KEY_PATTERN: Regex = Regex::new(&format!(
        "^{TABLE_ROUTE_PREFIX}/({NAME_PATTERN})/({NAME_PATTERN})/({NAME_PATTERN})$"
    ))
    .unwrap();
    static ref TABLE_ID_KEY_PATTERN: Regex =
        Regex::new(&format!("^{TABLE_ID_PREFIX}/([0-9]+)$")).unwrap();
}

/// Checks that every part of `name` can be embedded in a store key.
pub fn validate_table_name(name: &TableName) -> Result<()> {
    name.validate()?;
    for part in [&name.catalog_name, &name.schema_name, &name.table_name] {
        if !NAME_REGEX.is_match(part) {
            return Err(MetaError::InvalidArgument(format!(
                "invalid name '{}', expected {}",
                part, NAME_PATTERN
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRouteKey {
    pub table_name: TableName,
}

impl TableRouteKey {
    pub fn new(table_name: TableName) -> Self {
        Self { table_name }
    }

    /// Prefix shared by every table route key.
    pub fn range_prefix() -> Vec<u8> {
        format!("{TABLE_ROUTE_PREFIX}/").into_bytes()
    }

    pub fn as_raw_key(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    pub fn from_raw_key(raw: &[u8]) -> Result<Self> {
        let key = std::str::from_utf8(raw)
            .map_err(|e| MetaError::InvalidArgument(format!("table route key is not UTF-8: {}", e)))?;
        let captures = TABLE_ROUTE_KEY_PATTERN.captures(key).ok_or_else(|| {
            MetaError::InvalidArgument(format!("invalid table route key: {}", key))
        })?;
        Ok(Self::new(TableName::new(
            &captures[1],
            &captures[2],
            &captures[3],
        )))
    }
}

impl fmt::Display for TableRouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            TABLE_ROUTE_PREFIX,
            self.table_name.catalog_name,
            self.table_name.schema_name,
            self.table_name.table_name
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableIdKey {
    pub table_id: TableId,
}

impl TableIdKey {
    pub fn new(table_id: TableId) -> Self {
        Self { table_id }
    }

    pub fn as_raw_key(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    pub fn from_raw_key(raw: &[u8]) -> Result<Self> {
        let key = std::str::from_utf8(raw)
            .map_err(|e| MetaError::InvalidArgument(format!("table id key is not UTF-8: {}", e)))?;
        let captures = TABLE_ID_KEY_PATTERN
            .captures(key)
            .ok_or_else(|| MetaError::InvalidArgument(format!("invalid table id key: {}", key)))?;
        let id = captures[1]
            .parse::<u32>()
            .map_err(|e| MetaError::InvalidArgument(format!("invalid table id in key {}: {}", key, e)))?;
        Ok(Self::new(TableId::new(id)))
    }
}

impl fmt::Display for TableIdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", TABLE_ID_PREFIX, self.table_id.id)
    }
}
