use super::keys::{TABLE_ID_SEQUENCE_KEY, TableIdKey, TableRouteKey, validate_table_name};
use super::merge::RouteResponseBuilder;
use super::model::{Region, RegionRoute, Table, TableRoute, TableRouteValue};
use super::partition::validate_partitions;
use crate::config::RouterConfig;
use crate::core::{MetaError, RequestHeader, Result, TableId, TableName};
use crate::placement::{PeerAssignment, PeerProviderRef, PlacementContext, PlacementPolicyRef};
use crate::rpc::codec::{decode, encode};
use crate::rpc::{CreateRequest, DeleteRequest, RouteRequest, RouteResponse, Router};
use crate::sequence::Sequence;
use crate::storage::{Compare, KvBackendRef, Txn, TxnOp};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{Instrument, Level, event, info_span};

/// Owns the mapping from table identity to region placement.
///
/// Every mutation is a single compare-then-apply transaction on the two keys of
/// a table (route key and id index), so concurrent callers on the same table
/// serialize in the store while unrelated tables never contend.
pub struct RouteTableManager {
    kv: KvBackendRef,
    peers: PeerProviderRef,
    policy: PlacementPolicyRef,
    table_ids: Sequence,
}

/// A table as observed in the store, with the raw bytes used as txn guards.
struct ResolvedTable {
    table_name: TableName,
    table_id: TableId,
    route_bytes: Vec<u8>,
    id_bytes: Option<Vec<u8>>,
}

impl RouteTableManager {
    pub fn new(
        kv: KvBackendRef,
        peers: PeerProviderRef,
        policy: PlacementPolicyRef,
        config: &RouterConfig,
    ) -> Self {
        let table_ids = Sequence::new(
            kv.clone(),
            TABLE_ID_SEQUENCE_KEY,
            config.table_id_start,
            u32::MAX as u64,
            config.max_cas_attempts,
        );
        Self {
            kv,
            peers,
            policy,
            table_ids,
        }
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    // ========================================================================
    // Create
    // ========================================================================

    pub async fn create(&self, req: CreateRequest) -> Result<RouteResponse> {
        let span = info_span!(
            "route.create",
            table = %req.table_name.as_ref().map(|t| t.to_string()).unwrap_or_default(),
            partitions = req.partitions.len()
        );
        self.create_inner(req).instrument(span).await
    }

    async fn create_inner(&self, req: CreateRequest) -> Result<RouteResponse> {
        let CreateRequest {
            header,
            table_name,
            partitions,
            table_info,
        } = req;
        let table_name = table_name
            .ok_or_else(|| MetaError::InvalidArgument("table_name is required".to_string()))?;
        validate_table_name(&table_name)?;
        validate_partitions(&partitions)?;

        let route_key = TableRouteKey::new(table_name.clone());
        if self.kv.get(&route_key.as_raw_key()).await?.is_some() {
            event!(Level::WARN, table = %table_name, "table already routed");
            return Err(MetaError::AlreadyExists(table_name.to_string()));
        }

        let table_id = self.allocate_table_id().await?;
        let assignment = self.place(&table_name, partitions.len()).await?;

        let region_routes = partitions
            .into_iter()
            .zip(assignment.regions)
            .enumerate()
            .map(|(i, (partition, placement))| RegionRoute {
                region: Some(Region {
                    id: i as u64,
                    name: format!("{}_{}", table_name.table_name, i),
                    partition: Some(partition),
                    attrs: BTreeMap::new(),
                }),
                leader_peer_index: placement.leader as u64,
                follower_peer_indexes: placement.followers.into_iter().map(|f| f as u64).collect(),
            })
            .collect();
        let table_route = TableRoute {
            table: Some(Table {
                id: table_id.id as u64,
                table_name: Some(table_name.clone()),
                table_schema: table_info,
            }),
            region_routes,
        };
        let value = TableRouteValue::new(assignment.peers, table_route);
        value
            .validate()
            .map_err(|e| MetaError::Internal(format!("built an invalid route: {}", e)))?;

        let id_key = TableIdKey::new(table_id);
        let txn = Txn::merge_all([
            create_route_txn(&route_key, &value)?,
            create_id_txn(&id_key, &table_name)?,
        ]);
        let resp = self.kv.txn(txn).await?;
        if !resp.succeeded {
            return match resp.fetched().next().flatten() {
                Some(_) => {
                    event!(Level::WARN, table = %table_name, "lost create race");
                    Err(MetaError::AlreadyExists(table_name.to_string()))
                }
                None => Err(MetaError::Internal(format!(
                    "table id {} is already indexed",
                    table_id
                ))),
            };
        }

        event!(
            Level::DEBUG,
            table = %table_name,
            table_id = table_id.id,
            regions = value.region_ids().len(),
            "table routed"
        );
        let mut builder = RouteResponseBuilder::new();
        builder.add(value)?;
        Ok(builder.finish(header.as_ref()))
    }

    async fn allocate_table_id(&self) -> Result<TableId> {
        let id = self.table_ids.next().await?;
        let id = u32::try_from(id)
            .map_err(|_| MetaError::Unavailable(format!("table id {} out of range", id)))?;
        Ok(TableId::new(id))
    }

    async fn place(&self, table_name: &TableName, region_count: usize) -> Result<PeerAssignment> {
        let healthy_peers = self.peers.healthy_peers().await?;
        let ctx = PlacementContext {
            table_name: table_name.clone(),
            healthy_peers,
        };
        let assignment = self.policy.choose_peers(&ctx, region_count)?;
        assignment.validate(region_count)?;
        Ok(assignment.compact())
    }

    // ========================================================================
    // Route
    // ========================================================================

    pub async fn route(&self, req: RouteRequest) -> Result<RouteResponse> {
        let span = info_span!(
            "route.lookup",
            names = req.table_names.len(),
            ids = req.table_ids.len()
        );
        self.route_inner(req).instrument(span).await
    }

    async fn route_inner(&self, req: RouteRequest) -> Result<RouteResponse> {
        let RouteRequest {
            header,
            table_names,
            table_ids,
        } = req;

        // Names that cannot form a key cannot be routed either.
        let mut wanted: Vec<(TableName, Option<TableId>)> = table_names
            .into_iter()
            .filter(|name| validate_table_name(name).is_ok())
            .map(|name| (name, None))
            .collect();
        let by_id = self.resolve_ids(&table_ids).await?;
        wanted.extend(
            table_ids
                .iter()
                .filter_map(|id| by_id.get(id).map(|name| (name.clone(), Some(*id)))),
        );

        let mut seen = HashSet::new();
        wanted.retain(|(name, id)| seen.insert((name.clone(), *id)));
        let keys: Vec<Vec<u8>> = wanted
            .iter()
            .map(|(name, _)| TableRouteKey::new(name.clone()).as_raw_key())
            .collect();
        let found: HashMap<Vec<u8>, Vec<u8>> = self
            .kv
            .batch_get(&keys)
            .await?
            .into_iter()
            .map(|kv| (kv.key, kv.value))
            .collect();

        let mut builder = RouteResponseBuilder::new();
        for ((name, requested_id), key) in wanted.iter().zip(&keys) {
            let Some(bytes) = found.get(key) else {
                continue;
            };
            let value: TableRouteValue = decode_stored(bytes, name)?;
            // The id index and the route are read separately; a table recreated
            // in between carries a new id and does not answer the old one.
            if let Some(id) = requested_id {
                if route_table_id(&value)? != *id {
                    continue;
                }
            }
            builder.add(value)?;
        }

        event!(Level::DEBUG, tables = builder.table_count(), "routes resolved");
        Ok(builder.finish(header.as_ref()))
    }

    async fn resolve_ids(&self, table_ids: &[TableId]) -> Result<HashMap<TableId, TableName>> {
        if table_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let keys: Vec<Vec<u8>> = table_ids
            .iter()
            .map(|id| TableIdKey::new(*id).as_raw_key())
            .collect();
        let mut resolved = HashMap::with_capacity(table_ids.len());
        for kv in self.kv.batch_get(&keys).await? {
            let key = TableIdKey::from_raw_key(&kv.key)
                .map_err(|e| MetaError::Internal(e.to_string()))?;
            let name: TableName = decode(&kv.value).map_err(|e| {
                MetaError::Internal(format!("corrupt index entry {}: {}", key, e))
            })?;
            resolved.insert(key.table_id, name);
        }
        Ok(resolved)
    }

    // ========================================================================
    // Delete
    // ========================================================================

    pub async fn delete(&self, req: DeleteRequest) -> Result<RouteResponse> {
        let span = info_span!(
            "route.delete",
            table = %req.table_name.as_ref().map(|t| t.to_string()).unwrap_or_default(),
            table_id = req.table_id.map(|id| id.id as i64).unwrap_or(-1)
        );
        self.delete_inner(req).instrument(span).await
    }

    async fn delete_inner(&self, req: DeleteRequest) -> Result<RouteResponse> {
        let DeleteRequest {
            header,
            table_name,
            table_id,
        } = req;
        if table_name.is_none() && table_id.is_none() {
            return Err(MetaError::InvalidArgument(
                "delete needs a table name or a table id".to_string(),
            ));
        }

        let resolved = self
            .resolve(table_name.as_ref(), table_id)
            .await?
            .ok_or_else(|| MetaError::NotFound(describe(table_name.as_ref(), table_id)))?;

        let route_key = TableRouteKey::new(resolved.table_name.clone()).as_raw_key();
        let id_key = TableIdKey::new(resolved.table_id).as_raw_key();
        let id_guard = match resolved.id_bytes {
            Some(bytes) => Compare::ValueEquals(id_key.clone(), bytes),
            None => Compare::KeyAbsent(id_key.clone()),
        };
        let txn = Txn::new()
            .when([
                Compare::ValueEquals(route_key.clone(), resolved.route_bytes),
                id_guard,
            ])
            .and_then([TxnOp::Delete(route_key), TxnOp::Delete(id_key)]);

        if !self.kv.txn(txn).await?.succeeded {
            event!(Level::WARN, table = %resolved.table_name, "delete raced with another mutation");
            return match self.resolve(table_name.as_ref(), table_id).await? {
                None => Err(MetaError::NotFound(describe(table_name.as_ref(), table_id))),
                Some(_) => Err(MetaError::Unavailable(format!(
                    "table {} changed concurrently, retry",
                    resolved.table_name
                ))),
            };
        }

        event!(
            Level::DEBUG,
            table = %resolved.table_name,
            table_id = resolved.table_id.id,
            "table route deleted"
        );
        Ok(RouteResponse::empty(header.as_ref()))
    }

    /// Resolves a table addressed by name, id, or both.
    ///
    /// Returns `None` when nothing matches. When both identities are given they
    /// must name the same table; a mismatch, including one side existing while
    /// the other does not, is InvalidArgument.
    async fn resolve(
        &self,
        table_name: Option<&TableName>,
        table_id: Option<TableId>,
    ) -> Result<Option<ResolvedTable>> {
        let mut id_bytes = None;
        let name_from_id = match table_id {
            Some(id) => match self.kv.get(&TableIdKey::new(id).as_raw_key()).await? {
                Some(kv) => {
                    let name: TableName = decode(&kv.value).map_err(|e| {
                        MetaError::Internal(format!("corrupt index entry for id {}: {}", id, e))
                    })?;
                    id_bytes = Some(kv.value);
                    Some(name)
                }
                None => None,
            },
            None => None,
        };

        let name = match (table_name, name_from_id) {
            (Some(given), Some(indexed)) if *given != indexed => {
                return Err(MetaError::InvalidArgument(format!(
                    "table id {} belongs to {}, not {}",
                    table_id.map(|id| id.id).unwrap_or_default(),
                    indexed,
                    given
                )));
            }
            (_, Some(indexed)) => indexed,
            (Some(given), None) if table_id.is_none() => given.clone(),
            (Some(given), None) => {
                // Id unknown: only a conflict if the name itself is routed.
                if self.read_route(given).await?.is_some() {
                    return Err(MetaError::InvalidArgument(format!(
                        "table {} does not have id {}",
                        given,
                        table_id.map(|id| id.id).unwrap_or_default()
                    )));
                }
                return Ok(None);
            }
            (None, None) => return Ok(None),
        };

        let Some((value, route_bytes)) = self.read_route(&name).await? else {
            return Ok(None);
        };
        let routed_id = route_table_id(&value)?;
        if let Some(id) = table_id {
            if routed_id != id {
                return Err(MetaError::InvalidArgument(format!(
                    "table {} has id {}, not {}",
                    name, routed_id, id
                )));
            }
        } else {
            id_bytes = self
                .kv
                .get(&TableIdKey::new(routed_id).as_raw_key())
                .await?
                .map(|kv| kv.value);
        }

        Ok(Some(ResolvedTable {
            table_name: name,
            table_id: routed_id,
            route_bytes,
            id_bytes,
        }))
    }

    async fn read_route(&self, name: &TableName) -> Result<Option<(TableRouteValue, Vec<u8>)>> {
        if validate_table_name(name).is_err() {
            return Ok(None);
        }
        let key = TableRouteKey::new(name.clone()).as_raw_key();
        match self.kv.get(&key).await? {
            Some(kv) => {
                let value = decode_stored(&kv.value, name)?;
                Ok(Some((value, kv.value)))
            }
            None => Ok(None),
        }
    }

    // ========================================================================
    // Read helpers
    // ========================================================================

    pub async fn get_by_name(&self, name: &TableName) -> Result<Option<TableRouteValue>> {
        Ok(self.read_route(name).await?.map(|(value, _)| value))
    }

    pub async fn get_by_id(&self, table_id: TableId) -> Result<Option<TableRouteValue>> {
        let Some(kv) = self.kv.get(&TableIdKey::new(table_id).as_raw_key()).await? else {
            return Ok(None);
        };
        let name: TableName = decode(&kv.value)
            .map_err(|e| MetaError::Internal(format!("corrupt index entry for id {}: {}", table_id, e)))?;
        let value = self.get_by_name(&name).await?;
        match value {
            Some(value) if route_table_id(&value)? == table_id => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Every routed table, in key order.
    pub async fn list_tables(&self) -> Result<Vec<TableName>> {
        self.kv
            .range(&TableRouteKey::range_prefix())
            .await?
            .iter()
            .map(|kv| TableRouteKey::from_raw_key(&kv.key).map(|key| key.table_name))
            .collect()
    }
}

fn create_route_txn(key: &TableRouteKey, value: &TableRouteValue) -> Result<Txn> {
    let raw_key = key.as_raw_key();
    Ok(Txn::new()
        .when([Compare::KeyAbsent(raw_key.clone())])
        .and_then([TxnOp::Put(raw_key.clone(), encode(value)?)])
        .or_else([TxnOp::Get(raw_key)]))
}

fn create_id_txn(key: &TableIdKey, table_name: &TableName) -> Result<Txn> {
    let raw_key = key.as_raw_key();
    Ok(Txn::new()
        .when([Compare::KeyAbsent(raw_key.clone())])
        .and_then([TxnOp::Put(raw_key, encode(table_name)?)]))
}

fn decode_stored(bytes: &[u8], name: &TableName) -> Result<TableRouteValue> {
    decode(bytes).map_err(|e| MetaError::Internal(format!("corrupt route for {}: {}", name, e)))
}

fn route_table_id(value: &TableRouteValue) -> Result<TableId> {
    let id = value
        .table_route()?
        .table
        .as_ref()
        .map(|t| t.id)
        .ok_or_else(|| MetaError::Internal("stored route has no table".to_string()))?;
    u32::try_from(id)
        .map(TableId::new)
        .map_err(|_| MetaError::Internal(format!("stored table id {} out of range", id)))
}

fn describe(table_name: Option<&TableName>, table_id: Option<TableId>) -> String {
    match (table_name, table_id) {
        (Some(name), Some(id)) => format!("table {} (id {})", name, id),
        (Some(name), None) => format!("table {}", name),
        (None, Some(id)) => format!("table id {}", id),
        (None, None) => "table".to_string(),
    }
}

fn respond(header: Option<&RequestHeader>, result: Result<RouteResponse>) -> RouteResponse {
    match result {
        Ok(resp) => resp,
        Err(err) => {
            event!(
                Level::WARN,
                code = err.status_code() as i32,
                error = %err,
                "route request failed"
            );
            RouteResponse::failed(header, &err)
        }
    }
}

#[async_trait]
impl Router for RouteTableManager {
    async fn create(&self, req: CreateRequest) -> RouteResponse {
        let header = req.header;
        respond(header.as_ref(), RouteTableManager::create(self, req).await)
    }

    async fn route(&self, req: RouteRequest) -> RouteResponse {
        let header = req.header;
        respond(header.as_ref(), RouteTableManager::route(self, req).await)
    }

    async fn delete(&self, req: DeleteRequest) -> RouteResponse {
        let header = req.header;
        respond(header.as_ref(), RouteTableManager::delete(self, req).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Peer, StatusCode};
    use crate::placement::{RoundRobinPolicy, StaticPeerProvider};
    use crate::route::Partition;
    use crate::storage::{KvBackend, MemoryKvBackend};
    use std::sync::Arc;

    fn peers() -> Vec<Peer> {
        (1..=4).map(|i| Peer::new(i, format!("10.0.0.{}:4001", i))).collect()
    }

    fn manager_with(kv: Arc<MemoryKvBackend>) -> RouteTableManager {
        let provider = Arc::new(StaticPeerProvider::new(peers()).unwrap());
        RouteTableManager::new(
            kv,
            provider,
            Arc::new(RoundRobinPolicy::new(3)),
            &RouterConfig::default(),
        )
    }

    fn manager() -> RouteTableManager {
        manager_with(Arc::new(MemoryKvBackend::new()))
    }

    fn name(t: &str) -> TableName {
        TableName::new("greptime", "public", t)
    }

    fn partitions(n: usize) -> Vec<Partition> {
        (0..n)
            .map(|i| Partition::single("ts", vec![b'a' + i as u8]))
            .collect()
    }

    #[tokio::test]
    async fn create_assigns_regions_in_partition_order() {
        let m = manager();
        let resp = m
            .create(CreateRequest::new(name("cpu"), partitions(3)).with_table_info(vec![1, 2, 3]))
            .await
            .unwrap();

        assert_eq!(resp.table_routes.len(), 1);
        let route = &resp.table_routes[0];
        assert_eq!(route.region_ids(), vec![0, 1, 2]);
        assert_eq!(route.table_id(), Some(TableId::new(1024)));
        assert_eq!(route.table.as_ref().unwrap().table_schema, vec![1, 2, 3]);
        for (i, rr) in route.region_routes.iter().enumerate() {
            let region = rr.region.as_ref().unwrap();
            assert_eq!(region.name, format!("cpu_{}", i));
            assert!(resp.peer(rr.leader_peer_index).is_some());
            assert!(!rr.follower_peer_indexes.contains(&rr.leader_peer_index));
            assert_eq!(rr.follower_peer_indexes.len(), 2);
        }
    }

    #[tokio::test]
    async fn second_create_is_rejected_and_keeps_the_first_record() {
        let m = manager();
        m.create(CreateRequest::new(name("cpu"), partitions(1)))
            .await
            .unwrap();
        let before = m.get_by_name(&name("cpu")).await.unwrap();

        let err = m
            .create(CreateRequest::new(name("cpu"), partitions(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, MetaError::AlreadyExists(_)));
        assert_eq!(m.get_by_name(&name("cpu")).await.unwrap(), before);
    }

    #[tokio::test]
    async fn create_rejects_bad_input() {
        let m = manager();
        let err = m.create(CreateRequest::new(name("cpu"), vec![])).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidArgument);

        let unordered = vec![Partition::single("ts", "b"), Partition::single("ts", "a")];
        let err = m
            .create(CreateRequest::new(name("cpu"), unordered))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidArgument);

        let err = m.create(CreateRequest::default()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidArgument);
        assert!(m.list_tables().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_without_peers_is_unavailable() {
        let kv = Arc::new(MemoryKvBackend::new());
        let m = RouteTableManager::new(
            kv,
            Arc::new(StaticPeerProvider::default()),
            Arc::new(RoundRobinPolicy::new(1)),
            &RouterConfig::default(),
        );
        let err = m
            .create(CreateRequest::new(name("cpu"), partitions(1)))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(m.get_by_name(&name("cpu")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_route_commit_leaves_nothing_behind() {
        let kv = Arc::new(MemoryKvBackend::new());
        let m = manager_with(kv.clone());
        m.create(CreateRequest::new(name("warmup"), partitions(1)))
            .await
            .unwrap();
        assert_eq!(m.table_ids.peek().await.unwrap(), 1025);

        // Only the commit of the route record and its id index fails; the id
        // allocation before it goes through.
        kv.fail_writes_under(TableRouteKey::range_prefix(), 1);
        let err = m
            .create(CreateRequest::new(name("cpu"), partitions(1)))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::Unavailable);
        assert_eq!(m.table_ids.peek().await.unwrap(), 1026);

        let routes = kv.range(&TableRouteKey::range_prefix()).await.unwrap();
        assert_eq!(routes.len(), 1);
        assert!(kv
            .get(&TableIdKey::new(TableId::new(1025)).as_raw_key())
            .await
            .unwrap()
            .is_none());
        assert!(m.get_by_name(&name("cpu")).await.unwrap().is_none());

        let created = m
            .create(CreateRequest::new(name("cpu"), partitions(1)))
            .await
            .unwrap();
        assert_eq!(created.table_routes[0].table_id(), Some(TableId::new(1026)));
    }

    #[tokio::test]
    async fn empty_route_request_is_empty() {
        let resp = manager().route(RouteRequest::default()).await.unwrap();
        assert!(resp.is_empty());
        assert!(resp.header.unwrap().is_success());
    }

    #[tokio::test]
    async fn route_by_name_and_id_deduplicates() {
        let m = manager();
        let created = m
            .create(CreateRequest::new(name("cpu"), partitions(2)))
            .await
            .unwrap();
        let id = created.table_routes[0].table_id().unwrap();

        let resp = m
            .route(RouteRequest {
                header: None,
                table_names: vec![name("cpu"), name("cpu"), name("missing")],
                table_ids: vec![id, TableId::new(7)],
            })
            .await
            .unwrap();
        assert_eq!(resp.table_routes.len(), 1);
        assert_eq!(resp.table_routes[0], created.table_routes[0]);
        assert_eq!(resp.peers, created.peers);
    }

    #[tokio::test]
    async fn route_ignores_names_that_cannot_be_keys() {
        let m = manager();
        let resp = m
            .route(RouteRequest::by_names(vec![TableName::new("a/b", "c", "d")]))
            .await
            .unwrap();
        assert!(resp.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_both_keys() {
        let kv = Arc::new(MemoryKvBackend::new());
        let m = manager_with(kv.clone());
        let created = m
            .create(CreateRequest::new(name("cpu"), partitions(1)))
            .await
            .unwrap();
        let id = created.table_routes[0].table_id().unwrap();

        let resp = m.delete(DeleteRequest::by_id(id)).await.unwrap();
        assert!(resp.is_empty());
        assert!(kv.get(&TableIdKey::new(id).as_raw_key()).await.unwrap().is_none());
        assert!(m.get_by_name(&name("cpu")).await.unwrap().is_none());

        let err = m.delete(DeleteRequest::by_name(name("cpu"))).await.unwrap_err();
        assert!(matches!(err, MetaError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_needs_a_consistent_identity() {
        let m = manager();
        let err = m.delete(DeleteRequest::default()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidArgument);

        let cpu = m
            .create(CreateRequest::new(name("cpu"), partitions(1)))
            .await
            .unwrap();
        m.create(CreateRequest::new(name("mem"), partitions(1)))
            .await
            .unwrap();
        let cpu_id = cpu.table_routes[0].table_id().unwrap();

        let mismatched = DeleteRequest {
            header: None,
            table_name: Some(name("mem")),
            table_id: Some(cpu_id),
        };
        let err = m.delete(mismatched).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidArgument);
        assert_eq!(m.list_tables().await.unwrap(), vec![name("cpu"), name("mem")]);

        let matching = DeleteRequest {
            header: None,
            table_name: Some(name("cpu")),
            table_id: Some(cpu_id),
        };
        m.delete(matching).await.unwrap();
        assert_eq!(m.list_tables().await.unwrap(), vec![name("mem")]);
    }

    #[tokio::test]
    async fn get_by_id_follows_the_index() {
        let m = manager();
        let created = m
            .create(CreateRequest::new(name("cpu"), partitions(1)))
            .await
            .unwrap();
        let id = created.table_routes[0].table_id().unwrap();
        let value = m.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(value.table_route().unwrap().table_name(), Some(&name("cpu")));
        assert!(m.get_by_id(TableId::new(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn router_reports_failures_in_header() {
        let m = manager();
        let header = RequestHeader::new(42, 7);
        let resp = Router::delete(&m, DeleteRequest::by_name(name("nope")).with_header(header)).await;
        let response_header = resp.header.clone().unwrap();
        assert_eq!(response_header.cluster_id, 42);
        assert_eq!(
            response_header.error.as_ref().map(|e| e.code),
            Some(StatusCode::NotFound as i32)
        );
        assert!(matches!(resp.into_result(), Err(MetaError::NotFound(_))));
    }
}
