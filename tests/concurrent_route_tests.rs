/// Concurrency tests
///
/// Many callers hitting the same or different tables at once.
/// Run with: cargo test --test concurrent_route_tests

use futures::future::join_all;
use routemeta::route::{TableIdKey, TableRouteKey};
use routemeta::rpc::codec::decode;
use routemeta::{
    CreateRequest, DeleteRequest, KvBackend, MemoryKvBackend, MetaError, MetaRouter, Partition,
    Peer, RouteRequest, RoundRobinPolicy, RouterConfig, StaticPeerProvider, TableId, TableName,
    TableRouteValue,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Barrier;

fn peers() -> Vec<Peer> {
    (1..=4).map(|i| Peer::new(i, format!("10.1.0.{}:4001", i))).collect()
}

fn table(name: &str) -> TableName {
    TableName::new("greptime", "public", name)
}

fn router_over(kv: Arc<MemoryKvBackend>) -> Arc<MetaRouter> {
    let config = RouterConfig::new().replicas(2).max_cas_attempts(64);
    Arc::new(
        MetaRouter::with_backend(
            config,
            kv,
            Arc::new(StaticPeerProvider::new(peers()).unwrap()),
            Arc::new(RoundRobinPolicy::new(2)),
        )
        .unwrap(),
    )
}

/// Every route record has its id index and every id index its record.
async fn assert_indexes_consistent(kv: &MemoryKvBackend) {
    let routes = kv.range(&TableRouteKey::range_prefix()).await.unwrap();
    let ids = kv.range(b"__table_id/").await.unwrap();
    assert_eq!(routes.len(), ids.len(), "route and id index counts differ");

    for kv_pair in &routes {
        let key = TableRouteKey::from_raw_key(&kv_pair.key).unwrap();
        let value: TableRouteValue = decode(&kv_pair.value).unwrap();
        value.validate().unwrap();
        let id = value.table_route().unwrap().table_id().unwrap();
        let indexed = kv
            .get(&TableIdKey::new(id).as_raw_key())
            .await
            .unwrap()
            .expect("route without id index");
        let name: TableName = decode(&indexed.value).unwrap();
        assert_eq!(name, key.table_name);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_create_same_name() {
    let kv = Arc::new(MemoryKvBackend::new());
    let router = router_over(kv.clone());
    let num_tasks = 12;
    let barrier = Arc::new(Barrier::new(num_tasks));

    let mut handles = vec![];
    for _ in 0..num_tasks {
        let router = Arc::clone(&router);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            router
                .manager()
                .create(CreateRequest::new(
                    table("contended"),
                    vec![Partition::single("k", "m")],
                ))
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(MetaError::AlreadyExists(_)) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(created, 1);
    assert_indexes_consistent(&kv).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_create_distinct_tables() {
    let kv = Arc::new(MemoryKvBackend::new());
    let router = router_over(kv.clone());

    let futures = (0..20).map(|i| {
        let router = Arc::clone(&router);
        async move {
            router
                .manager()
                .create(CreateRequest::new(
                    table(&format!("t{}", i)),
                    vec![Partition::single("k", "f"), Partition::single("k", "p")],
                ))
                .await
        }
    });
    let results = join_all(futures).await;

    let mut ids = HashSet::new();
    for result in results {
        let resp = result.unwrap();
        assert!(ids.insert(resp.table_routes[0].table_id().unwrap()));
    }
    assert_eq!(router.manager().list_tables().await.unwrap().len(), 20);
    assert_indexes_consistent(&kv).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_create_delete_race_keeps_indexes_consistent() {
    let kv = Arc::new(MemoryKvBackend::new());
    let router = router_over(kv.clone());

    let mut handles = vec![];
    for task in 0..8 {
        let router = Arc::clone(&router);
        handles.push(tokio::spawn(async move {
            for round in 0..25 {
                let name = table(&format!("flap{}", round % 3));
                let result = if (task + round) % 2 == 0 {
                    router
                        .manager()
                        .create(CreateRequest::new(name, vec![Partition::single("k", "m")]))
                        .await
                        .map(|_| ())
                } else {
                    router
                        .manager()
                        .delete(DeleteRequest::by_name(name))
                        .await
                        .map(|_| ())
                };
                match result {
                    Ok(())
                    | Err(MetaError::AlreadyExists(_))
                    | Err(MetaError::NotFound(_))
                    | Err(MetaError::Unavailable(_)) => {}
                    Err(other) => panic!("unexpected error: {}", other),
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_indexes_consistent(&kv).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_route_never_sees_partial_record() {
    let kv = Arc::new(MemoryKvBackend::new());
    let router = router_over(kv.clone());

    let writer = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            for i in 0..50 {
                let name = table(&format!("w{}", i));
                router
                    .manager()
                    .create(CreateRequest::new(
                        name.clone(),
                        vec![Partition::single("k", "f"), Partition::single("k", "p")],
                    ))
                    .await
                    .unwrap();
                router
                    .manager()
                    .delete(DeleteRequest::by_name(name))
                    .await
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let router = Arc::clone(&router);
            tokio::spawn(async move {
                for i in 0..50 {
                    let name = table(&format!("w{}", i));
                    let resp = router
                        .manager()
                        .route(RouteRequest {
                            header: None,
                            table_names: vec![name],
                            table_ids: (1024..1080).map(TableId::new).collect(),
                        })
                        .await
                        .unwrap();
                    for route in &resp.table_routes {
                        assert_eq!(route.region_routes.len(), 2);
                        for rr in &route.region_routes {
                            assert!(resp.peer(rr.leader_peer_index).is_some());
                        }
                    }
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert!(router.manager().list_tables().await.unwrap().is_empty());
}
