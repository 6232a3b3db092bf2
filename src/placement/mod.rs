//! Peer selection for new regions.
//!
//! The route manager never decides where a region lives. It asks a
//! [`PlacementPolicy`] for an assignment over a snapshot of healthy peers
//! obtained from a [`PeerProvider`], then validates what comes back.

pub mod assignment;
pub mod least_loaded;
pub mod membership;
pub mod round_robin;

pub use assignment::{PeerAssignment, RegionPlacement};
pub use least_loaded::LeastLoadedPolicy;
pub use membership::StaticPeerProvider;
pub use round_robin::RoundRobinPolicy;

use crate::core::{Peer, Result, TableName};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Source of the current cluster membership.
///
/// Implementations return a point-in-time snapshot; the manager reads it once
/// per `create` call.
#[async_trait]
pub trait PeerProvider: Send + Sync {
    async fn healthy_peers(&self) -> Result<Vec<Peer>>;
}

/// Inputs available to a placement decision.
#[derive(Debug, Clone)]
pub struct PlacementContext {
    pub table_name: TableName,
    pub healthy_peers: Vec<Peer>,
}

/// Chooses a leader and followers for each region of a new table.
pub trait PlacementPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// Returns one placement per region, indexes referring to `PeerAssignment::peers`.
    fn choose_peers(&self, ctx: &PlacementContext, region_count: usize)
        -> Result<PeerAssignment>;
}

pub type PeerProviderRef = Arc<dyn PeerProvider>;
pub type PlacementPolicyRef = Arc<dyn PlacementPolicy>;

/// Built-in policies selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementKind {
    #[default]
    RoundRobin,
    LeastLoaded,
}

impl PlacementKind {
    pub fn build(self, replicas: usize) -> PlacementPolicyRef {
        match self {
            PlacementKind::RoundRobin => Arc::new(RoundRobinPolicy::new(replicas)),
            PlacementKind::LeastLoaded => Arc::new(LeastLoadedPolicy::new(replicas)),
        }
    }
}

impl std::str::FromStr for PlacementKind {
    type Err = crate::core::MetaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "round_robin" | "round-robin" => Ok(Self::RoundRobin),
            "least_loaded" | "least-loaded" => Ok(Self::LeastLoaded),
            other => Err(crate::core::MetaError::InvalidArgument(format!(
                "unknown placement policy '{}'",
                other
            ))),
        }
    }
}
