use crate::config::RouterConfig;
use crate::core::{Peer, Result};
use crate::placement::{PeerProviderRef, PlacementPolicyRef, StaticPeerProvider};
use crate::route::RouteTableManager;
use crate::rpc::{CreateRequest, DeleteRequest, RouteRequest, RouteResponse, Router};
use crate::storage::{FileKvBackend, KvBackendRef, MemoryKvBackend};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{Level, event};

/// One-stop handle: store, placement and route manager wired from a config.
///
/// # Examples
///
/// ```
/// use routemeta::{CreateRequest, MetaRouter, Partition, Peer, RouterConfig, TableName};
///
/// # tokio_test::block_on(async {
/// let router = MetaRouter::open(
///     RouterConfig::new().replicas(1),
///     vec![Peer::new(1, "127.0.0.1:4001")],
/// )
/// .unwrap();
///
/// let name = TableName::new("greptime", "public", "cpu");
/// let resp = router
///     .manager()
///     .create(CreateRequest::new(name, vec![Partition::single("ts", "m")]))
///     .await
///     .unwrap();
/// assert_eq!(resp.table_routes.len(), 1);
/// # });
/// ```
pub struct MetaRouter {
    config: RouterConfig,
    manager: RouteTableManager,
    file: Option<Arc<FileKvBackend>>,
    membership: Option<Arc<StaticPeerProvider>>,
}

impl MetaRouter {
    /// Opens a router over the store described by `config`.
    ///
    /// With `data_dir` set the store is file backed and prior state is
    /// recovered; otherwise everything lives in memory. `peers` seeds a static
    /// membership that can be changed later through [`MetaRouter::membership`].
    pub fn open(config: RouterConfig, peers: Vec<Peer>) -> Result<Self> {
        config.validate()?;
        let membership = Arc::new(StaticPeerProvider::new(peers)?);
        let policy = config.placement.build(config.replicas);

        let (kv, file): (KvBackendRef, Option<Arc<FileKvBackend>>) = match &config.data_dir {
            Some(dir) => {
                let file = Arc::new(FileKvBackend::open(
                    dir,
                    config.durability,
                    config.checkpoint_threshold,
                )?);
                (file.clone() as KvBackendRef, Some(file))
            }
            None => (Arc::new(MemoryKvBackend::new()) as KvBackendRef, None),
        };

        event!(
            Level::INFO,
            backend = kv.name(),
            placement = policy.name(),
            replicas = config.replicas,
            "route table opened"
        );
        let manager = RouteTableManager::new(kv, membership.clone(), policy, &config);
        Ok(Self {
            config,
            manager,
            file,
            membership: Some(membership),
        })
    }

    /// Builds a router over caller-supplied collaborators.
    pub fn with_backend(
        config: RouterConfig,
        kv: KvBackendRef,
        peers: PeerProviderRef,
        policy: PlacementPolicyRef,
    ) -> Result<Self> {
        config.validate()?;
        let manager = RouteTableManager::new(kv, peers, policy, &config);
        Ok(Self {
            config,
            manager,
            file: None,
            membership: None,
        })
    }

    pub fn manager(&self) -> &RouteTableManager {
        &self.manager
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Static membership created by [`MetaRouter::open`], if any.
    pub fn membership(&self) -> Option<&StaticPeerProvider> {
        self.membership.as_deref()
    }

    pub fn is_durable(&self) -> bool {
        self.file.is_some()
    }

    /// Snapshot the store and truncate its WAL. No-op for in-memory stores.
    pub async fn checkpoint(&self) -> Result<()> {
        if let Some(file) = &self.file {
            file.checkpoint().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Router for MetaRouter {
    async fn create(&self, req: CreateRequest) -> RouteResponse {
        Router::create(&self.manager, req).await
    }

    async fn route(&self, req: RouteRequest) -> RouteResponse {
        Router::route(&self.manager, req).await
    }

    async fn delete(&self, req: DeleteRequest) -> RouteResponse {
        Router::delete(&self.manager, req).await
    }
}
