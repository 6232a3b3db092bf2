// ============================================================================
// Route data model
// ============================================================================

use crate::core::{MetaError, Peer, Result, TableId, TableName};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Boundary rule: partition `i` owns keys in `[value_list of i-1, value_list of i)`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Partition {
    #[serde(with = "bytes_list")]
    pub column_list: Vec<Vec<u8>>,
    #[serde(with = "bytes_list")]
    pub value_list: Vec<Vec<u8>>,
}

/// Encodes each element as a MessagePack `bin` rather than an integer array.
mod bytes_list {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_bytes::{ByteBuf, Bytes};

    pub fn serialize<S: Serializer>(list: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(list.iter().map(|item| Bytes::new(item)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let list = Vec::<ByteBuf>::deserialize(deserializer)?;
        Ok(list.into_iter().map(ByteBuf::into_vec).collect())
    }
}

impl Partition {
    pub fn new(column_list: Vec<Vec<u8>>, value_list: Vec<Vec<u8>>) -> Self {
        Self {
            column_list,
            value_list,
        }
    }

    /// Single-column partition with one upper bound.
    pub fn single(column: impl Into<Vec<u8>>, bound: impl Into<Vec<u8>>) -> Self {
        Self {
            column_list: vec![column.into()],
            value_list: vec![bound.into()],
        }
    }
}

/// One partition's physical shard.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Region {
    pub id: u64,
    pub name: String,
    pub partition: Option<Partition>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

/// Placement of one region: a leader peer and its read replicas, by index into
/// the peer list of the enclosing record or response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegionRoute {
    pub region: Option<Region>,
    pub leader_peer_index: u64,
    #[serde(default)]
    pub follower_peer_indexes: Vec<u64>,
}

impl RegionRoute {
    pub fn region_id(&self) -> Option<u64> {
        self.region.as_ref().map(|r| r.id)
    }

    /// Checks that every index points into a peer list of `peer_count` entries and
    /// that leader and followers are pairwise distinct.
    pub fn validate_indexes(&self, peer_count: usize) -> Result<()> {
        let region = self.region_id().unwrap_or_default();
        if self.leader_peer_index as usize >= peer_count {
            return Err(MetaError::InvalidArgument(format!(
                "region {}: leader peer index {} out of range for {} peers",
                region, self.leader_peer_index, peer_count
            )));
        }
        let mut seen = HashSet::new();
        seen.insert(self.leader_peer_index);
        for follower in &self.follower_peer_indexes {
            if *follower as usize >= peer_count {
                return Err(MetaError::InvalidArgument(format!(
                    "region {}: follower peer index {} out of range for {} peers",
                    region, follower, peer_count
                )));
            }
            if !seen.insert(*follower) {
                return Err(MetaError::InvalidArgument(format!(
                    "region {}: peer index {} used more than once",
                    region, follower
                )));
            }
        }
        Ok(())
    }
}

/// The logical table. `table_schema` is opaque to the router.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Table {
    pub id: u64,
    pub table_name: Option<TableName>,
    #[serde(default, with = "serde_bytes")]
    pub table_schema: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableRoute {
    pub table: Option<Table>,
    #[serde(default)]
    pub region_routes: Vec<RegionRoute>,
}

impl TableRoute {
    pub fn table_id(&self) -> Option<TableId> {
        self.table
            .as_ref()
            .and_then(|t| u32::try_from(t.id).ok())
            .map(TableId::new)
    }

    pub fn table_name(&self) -> Option<&TableName> {
        self.table.as_ref().and_then(|t| t.table_name.as_ref())
    }

    pub fn region_ids(&self) -> Vec<u64> {
        self.region_routes
            .iter()
            .filter_map(RegionRoute::region_id)
            .collect()
    }

    pub fn region_route(&self, region_id: u64) -> Option<&RegionRoute> {
        self.region_routes
            .iter()
            .find(|route| route.region_id() == Some(region_id))
    }
}

/// The persisted unit: a table route together with the peers its indexes refer to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableRouteValue {
    #[serde(default)]
    pub peers: Vec<Peer>,
    pub table_route: Option<TableRoute>,
}

impl TableRouteValue {
    pub fn new(peers: Vec<Peer>, table_route: TableRoute) -> Self {
        Self {
            peers,
            table_route: Some(table_route),
        }
    }

    pub fn table_route(&self) -> Result<&TableRoute> {
        self.table_route
            .as_ref()
            .ok_or_else(|| MetaError::Internal("table route value has no table route".into()))
    }

    /// Enforces the record-level invariants: unique peer ids, every index valid
    /// against this record's own peers, unique region ids, and every region route
    /// carrying a region.
    pub fn validate(&self) -> Result<()> {
        let mut peer_ids = HashSet::new();
        for peer in &self.peers {
            if !peer_ids.insert(peer.id) {
                return Err(MetaError::InvalidArgument(format!(
                    "peer id {} listed more than once",
                    peer.id
                )));
            }
        }

        let route = self.table_route()?;
        if route.table.is_none() {
            return Err(MetaError::InvalidArgument(
                "table route has no table".to_string(),
            ));
        }
        let mut region_ids = HashSet::new();
        for region_route in &route.region_routes {
            let Some(region_id) = region_route.region_id() else {
                return Err(MetaError::InvalidArgument(
                    "region route has no region".to_string(),
                ));
            };
            if !region_ids.insert(region_id) {
                return Err(MetaError::InvalidArgument(format!(
                    "region id {} listed more than once",
                    region_id
                )));
            }
            region_route.validate_indexes(self.peers.len())?;
        }
        Ok(())
    }

    pub fn leader_peer(&self, region_id: u64) -> Option<&Peer> {
        let route = self.table_route.as_ref()?.region_route(region_id)?;
        self.peers.get(route.leader_peer_index as usize)
    }

    pub fn follower_peers(&self, region_id: u64) -> Vec<&Peer> {
        let Some(route) = self
            .table_route
            .as_ref()
            .and_then(|r| r.region_route(region_id))
        else {
            return Vec::new();
        };
        route
            .follower_peer_indexes
            .iter()
            .filter_map(|idx| self.peers.get(*idx as usize))
            .collect()
    }

    /// Distinct leader peers across all regions, in first-seen order.
    pub fn find_leaders(&self) -> Vec<&Peer> {
        let mut seen = HashSet::new();
        self.table_route
            .iter()
            .flat_map(|route| route.region_routes.iter())
            .filter_map(|route| self.peers.get(route.leader_peer_index as usize))
            .filter(|peer| seen.insert(peer.id))
            .collect()
    }

    pub fn region_ids(&self) -> Vec<u64> {
        self.table_route
            .as_ref()
            .map(TableRoute::region_ids)
            .unwrap_or_default()
    }
}
