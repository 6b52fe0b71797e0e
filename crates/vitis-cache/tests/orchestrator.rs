//! Orchestrator statistics, clearing and layer access.

use std::fs;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use vitis_cache::config::FileCacheConfig;
use vitis_cache::model::{BodyItem, TtlPolicy, TtlRemaining};
use vitis_cache::orchestrator::stats::Health;
use vitis_cache::{
    CacheOrchestrator, ClearScope, Error, FileCache, Layer, MappingStatus, MemoryStore,
    RequestParams, SystemClock, TableData,
};

fn orchestrator(store: Arc<MemoryStore>) -> (CacheOrchestrator, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = FileCacheConfig {
        directory: dir.path().to_path_buf(),
        ..Default::default()
    };
    let files = FileCache::new(&config, Arc::new(SystemClock)).unwrap();
    (
        CacheOrchestrator::new(store, Arc::new(files), TtlPolicy::default()),
        dir,
    )
}

fn table(label: &str) -> TableData {
    TableData {
        header: vec![vec!["Produto".into(), "Quantidade".into()]],
        body: vec![BodyItem::new(vec![label.into(), "1".into()])],
        footer: Vec::new(),
    }
}

fn year(y: &str) -> RequestParams {
    RequestParams::new().with("year", y)
}

#[tokio::test]
async fn set_then_get_round_trips_through_remote_layers() {
    let store = Arc::new(MemoryStore::new());
    let (orch, _dir) = orchestrator(store);

    orch.set(Layer::Fallback, "producao", &year("2020"), &table("A"))
        .await
        .unwrap();

    let hit = orch
        .get(Layer::Fallback, "PRODUCAO", &year("2020"))
        .await
        .unwrap()
        .expect("entry stored under normalized endpoint");
    assert_eq!(hit.payload, table("A"));
    assert_eq!(hit.origin_layer, Layer::Fresh);

    assert!(orch.get(Layer::ShortTerm, "producao", &year("2020")).await.unwrap().is_none());
    assert!(orch.get(Layer::Fallback, "producao", &year("2021")).await.unwrap().is_none());

    let ttl = orch
        .ttl_remaining(Layer::Fallback, "producao", &year("2020"))
        .await
        .unwrap();
    assert!(matches!(ttl, TtlRemaining::Seconds(s) if s > 2_591_000));
}

#[tokio::test]
async fn fresh_layer_is_never_stored() {
    let store = Arc::new(MemoryStore::new());
    let (orch, _dir) = orchestrator(store.clone());

    orch.set(Layer::Fresh, "producao", &year("2020"), &table("A"))
        .await
        .unwrap();
    orch.set(Layer::FileFallback, "producao", &year("2020"), &table("A"))
        .await
        .unwrap();

    assert!(store.is_empty());
    assert!(orch.get(Layer::Fresh, "producao", &year("2020")).await.unwrap().is_none());
}

#[tokio::test]
async fn corrupt_remote_entry_is_an_error() {
    let store = Arc::new(MemoryStore::new());
    let (orch, _dir) = orchestrator(store.clone());
    orch.set(Layer::ShortTerm, "producao", &year("2020"), &table("A"))
        .await
        .unwrap();
    let key = vitis_cache::orchestrator::key::CacheKey::derive(
        Layer::ShortTerm,
        "producao",
        &year("2020"),
    )
    .unwrap();
    store.insert_persistent(key.as_str(), b"not json".to_vec());

    let err = orch
        .get(Layer::ShortTerm, "producao", &year("2020"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Serialization(_)));

    let ttl = orch
        .ttl_remaining(Layer::ShortTerm, "producao", &year("2020"))
        .await
        .unwrap();
    assert_eq!(ttl, TtlRemaining::NoExpiry);
}

#[tokio::test]
async fn clear_cache_respects_endpoint_and_scope() {
    let store = Arc::new(MemoryStore::new());
    let (orch, _dir) = orchestrator(store.clone());
    for endpoint in ["producao", "comercializacao"] {
        for layer in [Layer::ShortTerm, Layer::Fallback] {
            orch.set(layer, endpoint, &year("2020"), &table(endpoint))
                .await
                .unwrap();
        }
    }

    let cleared = orch
        .clear_cache(Some("producao"), ClearScope::Short)
        .await
        .unwrap();
    assert_eq!(cleared, 1);
    assert_eq!(store.len(), 3);

    let cleared = orch.clear_cache(None, ClearScope::All).await.unwrap();
    assert_eq!(cleared, 3);
    assert!(store.is_empty());

    assert_eq!(orch.clear_cache(None, ClearScope::All).await.unwrap(), 0);
}

#[tokio::test]
async fn clear_cache_fails_when_store_is_down() {
    let store = Arc::new(MemoryStore::unavailable());
    let (orch, _dir) = orchestrator(store);

    let err = orch.clear_cache(None, ClearScope::All).await.unwrap_err();
    assert!(matches!(err, Error::CacheUnavailable(_)));
}

#[tokio::test]
async fn statistics_track_layers_and_health() {
    let store = Arc::new(MemoryStore::new());
    let (orch, dir) = orchestrator(store.clone());

    orch.set(Layer::ShortTerm, "producao", &year("2020"), &table("A"))
        .await
        .unwrap();
    orch.get(Layer::ShortTerm, "producao", &year("2020")).await.unwrap();
    orch.get(Layer::ShortTerm, "producao", &year("2019")).await.unwrap();

    let stats = orch.statistics().await;
    assert_eq!(stats.backend, "memory");
    assert!(stats.store_available);
    assert_eq!(stats.layers.short_term.entries, Some(1));
    assert_eq!(stats.layers.short_term.hits, 1);
    assert_eq!(stats.layers.short_term.misses, 1);
    assert_eq!(stats.layers.fallback.entries, Some(0));
    assert_eq!(stats.layers.fallback.ttl_seconds, 2_592_000);
    assert_eq!(stats.layers.file_fallback.mapping_status, MappingStatus::Invalid);
    assert!(!stats.layers.file_fallback.active);
    assert_eq!(stats.overall.active_layers, 2);
    assert_eq!(stats.overall.health, Health::Good);
    assert_eq!(stats.total_remote_entries(), Some(1));

    fs::write(dir.path().join("Producao.csv"), "produto;2020\nA;1\n").unwrap();
    store.set_available(false);

    let stats = orch.statistics().await;
    assert!(!stats.store_available);
    assert_eq!(stats.layers.short_term.entries, None);
    assert_eq!(stats.layers.file_fallback.mapping_status, MappingStatus::Partial);
    assert_eq!(stats.overall.active_layers, 1);
    assert_eq!(stats.overall.health, Health::Fair);

    let value = serde_json::to_value(&stats).unwrap();
    assert_eq!(value["overall"]["health"], json!("fair"));
    assert_eq!(value["layers"]["file_fallback"]["mapping_status"], json!("partial"));
}

#[tokio::test]
async fn file_layer_with_only_a_header_is_a_miss() {
    let store = Arc::new(MemoryStore::new());
    let (orch, dir) = orchestrator(store);
    fs::write(dir.path().join("Producao.csv"), "produto;2020\n").unwrap();

    let entry = orch
        .get(Layer::FileFallback, "producao", &RequestParams::new())
        .await
        .unwrap();
    assert!(entry.is_none());
    assert_eq!(orch.counters(Layer::FileFallback).unwrap().misses(), 1);
}

#[tokio::test]
async fn clear_cache_rejects_glob_characters_in_endpoint() {
    let store = Arc::new(MemoryStore::new());
    let (orch, _dir) = orchestrator(store.clone());
    for endpoint in ["producao", "comercializacao"] {
        orch.set(Layer::Fallback, endpoint, &year("2020"), &table(endpoint))
            .await
            .unwrap();
    }

    for endpoint in ["*", "prod*", "produca?", "[pc]*", "producao\\"] {
        let err = orch
            .clear_cache(Some(endpoint), ClearScope::All)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint(_)), "{endpoint}: {err}");
        assert_eq!(err.class(), "invalid_endpoint");
    }
    assert_eq!(store.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_file_layer_reads_share_the_parsed_file() {
    let store = Arc::new(MemoryStore::new());
    let (orch, dir) = orchestrator(store);
    fs::write(
        dir.path().join("Producao.csv"),
        "produto;2020\nVINHO DE MESA;10\nSUCO DE UVA;20\n",
    )
    .unwrap();
    let orch = Arc::new(orch);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move {
                orch.get(Layer::FileFallback, "producao", &RequestParams::new())
                    .await
            })
        })
        .collect();

    for task in tasks {
        let entry = task.await.unwrap().unwrap().expect("file hit");
        assert_eq!(entry.origin_layer, Layer::FileFallback);
        assert_eq!(entry.payload.body.len(), 2);
    }
    assert_eq!(orch.counters(Layer::FileFallback).unwrap().hits(), 8);
    assert_eq!(orch.files().memo_stats().size, 1);
}
