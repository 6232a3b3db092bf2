use super::model::{RegionRoute, TableRoute, TableRouteValue};
use crate::core::{MetaError, Peer, RequestHeader, ResponseHeader, Result};
use crate::rpc::RouteResponse;
use std::collections::{HashMap, HashSet};

/// Folds several stored route values into one response.
///
/// Each value carries its own peer list. The response carries a single peer
/// list shared by every table route, so peers are interned by id in first-seen order
/// and every leader/follower index is rewritten to point into the shared list.
/// A table added twice is kept once.
#[derive(Debug, Default)]
pub struct RouteResponseBuilder {
    peers: Vec<Peer>,
    peer_index: HashMap<u64, u64>,
    table_routes: Vec<TableRoute>,
    seen_tables: HashSet<u64>,
}

impl RouteResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table's route. Returns false if that table was already added.
    pub fn add(&mut self, value: TableRouteValue) -> Result<bool> {
        let TableRouteValue { peers, table_route } = value;
        let mut route = table_route.ok_or_else(|| {
            MetaError::Internal("stored route value has no table route".to_string())
        })?;
        let table_id = route
            .table
            .as_ref()
            .map(|t| t.id)
            .ok_or_else(|| MetaError::Internal("stored table route has no table".to_string()))?;
        if !self.seen_tables.insert(table_id) {
            return Ok(false);
        }

        for region_route in &mut route.region_routes {
            self.reindex(region_route, &peers, table_id)?;
        }
        self.table_routes.push(route);
        Ok(true)
    }

    fn reindex(&mut self, region_route: &mut RegionRoute, peers: &[Peer], table_id: u64) -> Result<()> {
        region_route.leader_peer_index =
            self.intern(peers, region_route.leader_peer_index, table_id)?;
        let followers = std::mem::take(&mut region_route.follower_peer_indexes);
        region_route.follower_peer_indexes = followers
            .into_iter()
            .map(|idx| self.intern(peers, idx, table_id))
            .collect::<Result<_>>()?;
        Ok(())
    }

    fn intern(&mut self, peers: &[Peer], local_index: u64, table_id: u64) -> Result<u64> {
        let peer = peers.get(local_index as usize).ok_or_else(|| {
            MetaError::Internal(format!(
                "stored route of table {} references peer index {} of {}",
                table_id,
                local_index,
                peers.len()
            ))
        })?;
        if let Some(idx) = self.peer_index.get(&peer.id) {
            return Ok(*idx);
        }
        let idx = self.peers.len() as u64;
        self.peers.push(peer.clone());
        self.peer_index.insert(peer.id, idx);
        Ok(idx)
    }

    pub fn table_count(&self) -> usize {
        self.table_routes.len()
    }

    pub fn finish(self, request: Option<&RequestHeader>) -> RouteResponse {
        RouteResponse {
            header: Some(ResponseHeader::success(request)),
            peers: self.peers,
            table_routes: self.table_routes,
        }
    }
}
