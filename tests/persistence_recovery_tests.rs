//! Integration tests for the file-backed route store and crash recovery

use routemeta::route::{TableIdKey, TableRouteKey};
use routemeta::storage::persistence::WAL_FILE;
use routemeta::{
    CreateRequest, DeleteRequest, DurabilityMode, FileKvBackend, KvBackend, MetaRouter, Partition,
    Peer, RoundRobinPolicy, RouteRequest, RouterConfig, StaticPeerProvider, StatusCode, TableId,
    TableName,
};
use std::fs::OpenOptions;
use std::sync::Arc;
use std::io::Write;
use tempfile::TempDir;

fn peers() -> Vec<Peer> {
    vec![
        Peer::new(1, "10.2.0.1:4001"),
        Peer::new(2, "10.2.0.2:4001"),
        Peer::new(3, "10.2.0.3:4001"),
    ]
}

fn table(name: &str) -> TableName {
    TableName::new("greptime", "public", name)
}

fn config(dir: &TempDir) -> RouterConfig {
    RouterConfig::new()
        .data_dir(dir.path())
        .durability(DurabilityMode::Sync)
        .replicas(2)
}

async fn create(router: &MetaRouter, name: &str) -> TableId {
    let resp = router
        .manager()
        .create(CreateRequest::new(
            table(name),
            vec![Partition::single("ts", "2024"), Partition::single("ts", "2025")],
        ))
        .await
        .unwrap();
    resp.table_routes[0].table_id().unwrap()
}

#[tokio::test]
async fn test_create_writes_wal() {
    let temp_dir = TempDir::new().unwrap();
    let router = MetaRouter::open(config(&temp_dir), peers()).unwrap();
    create(&router, "cpu").await;

    let wal_path = temp_dir.path().join(WAL_FILE);
    assert!(wal_path.exists());
    assert!(std::fs::metadata(wal_path).unwrap().len() > 0);
}

#[tokio::test]
async fn test_reopen_restores_routes_and_deletes() {
    let temp_dir = TempDir::new().unwrap();
    let (cpu_id, before) = {
        let router = MetaRouter::open(config(&temp_dir), peers()).unwrap();
        let cpu_id = create(&router, "cpu").await;
        create(&router, "mem").await;
        create(&router, "disk").await;
        router
            .manager()
            .delete(DeleteRequest::by_name(table("mem")))
            .await
            .unwrap();
        let before = router
            .manager()
            .route(RouteRequest::by_names(vec![table("cpu"), table("disk")]))
            .await
            .unwrap();
        (cpu_id, before)
    };

    let router = MetaRouter::open(config(&temp_dir), peers()).unwrap();
    assert_eq!(
        router.manager().list_tables().await.unwrap(),
        vec![table("cpu"), table("disk")]
    );
    let after = router
        .manager()
        .route(RouteRequest::by_names(vec![table("cpu"), table("disk")]))
        .await
        .unwrap();
    assert_eq!(after, before);
    assert!(router.manager().get_by_id(cpu_id).await.unwrap().is_some());

    // The id sequence survives too: no id is handed out twice.
    let next = create(&router, "net").await;
    assert!(next.id > cpu_id.id + 2);
}

#[tokio::test]
async fn test_checkpoint_then_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let router = MetaRouter::open(config(&temp_dir), peers()).unwrap();
        create(&router, "cpu").await;
        router.checkpoint().await.unwrap();
        create(&router, "mem").await;
    }

    let router = MetaRouter::open(config(&temp_dir), peers()).unwrap();
    assert_eq!(router.manager().list_tables().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_auto_checkpoint_threshold() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(&temp_dir).checkpoint_threshold(3);
    {
        let router = MetaRouter::open(config.clone(), peers()).unwrap();
        for i in 0..10 {
            create(&router, &format!("t{}", i)).await;
        }
    }
    assert!(temp_dir.path().join("routemeta.snapshot").exists());

    let router = MetaRouter::open(config, peers()).unwrap();
    assert_eq!(router.manager().list_tables().await.unwrap().len(), 10);
}

#[tokio::test]
async fn test_torn_wal_tail_is_ignored() {
    let temp_dir = TempDir::new().unwrap();
    {
        let router = MetaRouter::open(config(&temp_dir), peers()).unwrap();
        create(&router, "cpu").await;
    }

    // Simulate a crash halfway through appending a record.
    {
        let mut wal = OpenOptions::new()
            .append(true)
            .open(temp_dir.path().join(WAL_FILE))
            .unwrap();
        wal.write_all(&200u32.to_le_bytes()).unwrap();
        wal.write_all(&[0x92, 0x01]).unwrap();
    }

    {
        let router = MetaRouter::open(config(&temp_dir), peers()).unwrap();
        assert_eq!(router.manager().list_tables().await.unwrap(), vec![table("cpu")]);
        create(&router, "mem").await;
    }

    // Writes made after recovering from a torn tail survive the next reopen.
    let router = MetaRouter::open(config(&temp_dir), peers()).unwrap();
    assert_eq!(
        router.manager().list_tables().await.unwrap(),
        vec![table("cpu"), table("mem")]
    );
}

#[tokio::test]
async fn test_failed_route_commit_leaves_no_record_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let kv = Arc::new(FileKvBackend::open(temp_dir.path(), DurabilityMode::Sync, 1000).unwrap());
    let router = MetaRouter::with_backend(
        config(&temp_dir),
        kv.clone(),
        Arc::new(StaticPeerProvider::new(peers()).unwrap()),
        Arc::new(RoundRobinPolicy::new(2)),
    )
    .unwrap();
    let warmup = create(&router, "warmup").await;
    assert_eq!(warmup, TableId::new(1024));

    kv.fail_writes_under(TableRouteKey::range_prefix(), 1);
    let err = router
        .manager()
        .create(CreateRequest::new(table("cpu"), vec![Partition::single("ts", "m")]))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::Unavailable);
    drop(router);
    drop(kv);

    let kv = Arc::new(FileKvBackend::open(temp_dir.path(), DurabilityMode::Sync, 1000).unwrap());
    assert_eq!(kv.range(&TableRouteKey::range_prefix()).await.unwrap().len(), 1);
    assert_eq!(kv.range(b"__table_id/").await.unwrap().len(), 1);
    assert!(kv
        .get(&TableIdKey::new(TableId::new(1025)).as_raw_key())
        .await
        .unwrap()
        .is_none());
    drop(kv);

    // The id spent on the failed commit is not handed out again.
    let router = MetaRouter::open(config(&temp_dir), peers()).unwrap();
    assert_eq!(router.manager().list_tables().await.unwrap(), vec![table("warmup")]);
    assert_eq!(create(&router, "cpu").await, TableId::new(1026));
}
