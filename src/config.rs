use crate::core::{MetaError, Result};
use crate::placement::PlacementKind;
use crate::storage::DurabilityMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Router configuration
///
/// Built with chained setters or loaded from a JSON file. Every field has a
/// default, so a config file only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Directory for WAL and snapshots. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,

    /// How hard the WAL pushes writes to disk
    pub durability: DurabilityMode,

    /// WAL records between automatic checkpoints
    pub checkpoint_threshold: usize,

    /// Replicas per region, leader included
    pub replicas: usize,

    /// Built-in placement policy
    pub placement: PlacementKind,

    /// First table id handed out on a fresh store
    pub table_id_start: u64,

    /// Compare-and-swap attempts before id allocation gives up
    pub max_cas_attempts: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            durability: DurabilityMode::default(),
            checkpoint_threshold: 1000,
            replicas: 3,
            placement: PlacementKind::default(),
            // Ids below 1024 are reserved for system tables.
            table_id_start: 1024,
            max_cas_attempts: 16,
        }
    }
}

impl RouterConfig {
    /// In-memory configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the data directory (enables the durable store)
    pub fn data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.data_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set durability mode
    pub fn durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode;
        self
    }

    /// Set checkpoint threshold
    pub fn checkpoint_threshold(mut self, threshold: usize) -> Self {
        self.checkpoint_threshold = threshold;
        self
    }

    /// Set replicas per region
    pub fn replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas;
        self
    }

    /// Set placement policy
    pub fn placement(mut self, placement: PlacementKind) -> Self {
        self.placement = placement;
        self
    }

    /// Set first table id
    pub fn table_id_start(mut self, start: u64) -> Self {
        self.table_id_start = start;
        self
    }

    /// Set CAS attempts for id allocation
    pub fn max_cas_attempts(mut self, attempts: usize) -> Self {
        self.max_cas_attempts = attempts;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.replicas == 0 {
            return Err(MetaError::InvalidArgument(
                "replicas must be >= 1".to_string(),
            ));
        }
        if self.max_cas_attempts == 0 {
            return Err(MetaError::InvalidArgument(
                "max_cas_attempts must be >= 1".to_string(),
            ));
        }
        if self.checkpoint_threshold == 0 {
            return Err(MetaError::InvalidArgument(
                "checkpoint_threshold must be >= 1".to_string(),
            ));
        }
        if self.table_id_start > u32::MAX as u64 {
            return Err(MetaError::InvalidArgument(format!(
                "table_id_start {} exceeds the table id range",
                self.table_id_start
            )));
        }
        Ok(())
    }

    /// Load a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MetaError::InvalidArgument(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| MetaError::InvalidArgument(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = RouterConfig::new()
            .data_dir("/tmp/routemeta")
            .durability(DurabilityMode::Sync)
            .replicas(1)
            .placement(PlacementKind::LeastLoaded)
            .table_id_start(1);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/routemeta")));
        assert_eq!(config.replicas, 1);
        assert_eq!(config.checkpoint_threshold, 1000);
        config.validate().unwrap();
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config =
            RouterConfig::from_json(r#"{"replicas": 2, "placement": "least_loaded"}"#).unwrap();
        assert_eq!(config.replicas, 2);
        assert_eq!(config.placement, PlacementKind::LeastLoaded);
        assert_eq!(config.table_id_start, 1024);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(RouterConfig::from_json(r#"{"replicas": 0}"#).is_err());
        assert!(RouterConfig::new().max_cas_attempts(0).validate().is_err());
        assert!(RouterConfig::new().table_id_start(1 << 40).validate().is_err());
        assert!(RouterConfig::from_json("not json").is_err());
    }
}
