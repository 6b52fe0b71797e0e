//! Remote layers against a real Redis.
//!
//! Tests use testcontainers to spin up a Redis instance and are ignored by
//! default: run with `--ignored` where Docker is available.

use std::sync::Arc;
use std::time::Duration;

use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;
use vitis_cache::config::{FileCacheConfig, RedisConfig};
use vitis_cache::model::{BodyItem, TtlPolicy, TtlRemaining};
use vitis_cache::store::KeyTtl;
use vitis_cache::{
    CacheOrchestrator, ClearScope, FileCache, Layer, RedisStore, RemoteStore, RequestParams,
    SystemClock, TableData, connect_store,
};

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{}", host_port);

            (container, url)
        })
        .await;

    url.clone()
}

fn redis_config(url: String) -> RedisConfig {
    RedisConfig {
        url,
        pool_size: 4,
        timeout_ms: 2000,
        ..Default::default()
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_set_get_ttl_and_delete() {
    let store = RedisStore::from_config(&redis_config(get_redis_url().await)).unwrap();
    assert!(store.is_available().await);

    store
        .set_ex("test:roundtrip", b"value".to_vec(), Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(
        store.get("test:roundtrip").await.unwrap(),
        Some(b"value".to_vec())
    );

    match store.ttl("test:roundtrip").await.unwrap() {
        KeyTtl::Expires(left) => assert!(left <= Duration::from_secs(60)),
        other => panic!("unexpected ttl {other:?}"),
    }
    assert_eq!(store.ttl("test:absent").await.unwrap(), KeyTtl::Missing);

    let keys = store.keys("test:round*").await.unwrap();
    assert_eq!(keys, vec!["test:roundtrip".to_string()]);
    assert_eq!(store.delete(&keys).await.unwrap(), 1);
    assert_eq!(store.get("test:roundtrip").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_orchestrator_layers_over_redis() {
    let store = connect_store(&redis_config(get_redis_url().await)).await;
    assert_eq!(store.backend(), "redis");

    let dir = tempfile::tempdir().unwrap();
    let files = FileCache::new(
        &FileCacheConfig {
            directory: dir.path().to_path_buf(),
            ..Default::default()
        },
        Arc::new(SystemClock),
    )
    .unwrap();
    let orch = CacheOrchestrator::new(store, Arc::new(files), TtlPolicy::default());

    let params = RequestParams::new().with("year", "2018");
    let table = TableData {
        header: vec![vec!["Produto".into()]],
        body: vec![BodyItem::new(vec!["SUCO DE UVA".into()])],
        footer: Vec::new(),
    };
    orch.set(Layer::ShortTerm, "redis-it", &params, &table).await.unwrap();
    orch.set(Layer::Fallback, "redis-it", &params, &table).await.unwrap();

    let hit = orch.get(Layer::ShortTerm, "redis-it", &params).await.unwrap();
    assert_eq!(hit.map(|e| e.payload), Some(table));

    let ttl = orch
        .ttl_remaining(Layer::Fallback, "redis-it", &params)
        .await
        .unwrap();
    assert!(matches!(ttl, TtlRemaining::Seconds(s) if s > 300));

    let cleared = orch
        .clear_cache(Some("redis-it"), ClearScope::All)
        .await
        .unwrap();
    assert_eq!(cleared, 2);
}

#[tokio::test]
async fn test_unreachable_redis_reports_unavailable() {
    let store = connect_store(&RedisConfig {
        url: "redis://127.0.0.1:1".into(),
        timeout_ms: 200,
        ..Default::default()
    })
    .await;

    assert!(!store.is_available().await);
    assert!(store.get("anything").await.is_err());
}

#[tokio::test]
async fn test_disabled_redis_uses_unavailable_store() {
    let store = connect_store(&RedisConfig {
        enabled: false,
        ..Default::default()
    })
    .await;

    assert_eq!(store.backend(), "memory");
    assert!(!store.is_available().await);
}
