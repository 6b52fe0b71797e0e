//! File fallback layer against real files in a temporary directory.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use filetime::FileTime;
use vitis_cache::config::FileCacheConfig;
use vitis_cache::{Error, FileCache, ManualClock, MappingStatus};

fn cache_with_clock(dir: &Path, clock: Arc<ManualClock>) -> FileCache {
    let config = FileCacheConfig {
        directory: dir.to_path_buf(),
        max_entries: 2,
        ttl_secs: 600,
        ..Default::default()
    };
    FileCache::new(&config, clock).expect("file cache")
}

fn write_rows(path: &Path, rows: usize) {
    let mut content = String::from("produto;2022;2023\n");
    for i in 0..rows {
        content.push_str(&format!("PRODUTO {i};{i}00;{i}50\n"));
    }
    fs::write(path, content).unwrap();
}

#[test]
fn modified_file_is_reparsed() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new());
    let cache = cache_with_clock(dir.path(), clock);
    let path = dir.path().join("Producao.csv");

    write_rows(&path, 2);
    let first = cache.data_for_endpoint("producao", None).unwrap();
    assert_eq!(first.body.len(), 2);

    let again = cache.data_for_endpoint("producao", None).unwrap();
    assert!(Arc::ptr_eq(&first, &again), "unchanged file must come from the memo");

    write_rows(&path, 5);
    // Bump mtime explicitly; coarse filesystem timestamps may not move otherwise.
    let later = SystemTime::now() + Duration::from_secs(10);
    filetime::set_file_mtime(&path, FileTime::from_system_time(later)).unwrap();

    let refreshed = cache.data_for_endpoint("producao", None).unwrap();
    assert_eq!(refreshed.body.len(), 5);

    let stats = cache.memo_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.invalidations, 1);
    assert_eq!(stats.size, 1);
}

#[test]
fn expired_memo_entry_is_reparsed() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new());
    let cache = cache_with_clock(dir.path(), clock.clone());
    write_rows(&dir.path().join("Producao.csv"), 1);

    let first = cache.data_for_endpoint("producao", None).unwrap();
    clock.advance(Duration::from_secs(601));
    let second = cache.data_for_endpoint("producao", None).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first, second);
    assert_eq!(cache.memo_stats().expired_entries, 1);
}

#[test]
fn least_recently_used_file_is_evicted_at_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new());
    let cache = cache_with_clock(dir.path(), clock);
    for file in ["Producao.csv", "Comercio.csv", "ImpVinhos.csv"] {
        write_rows(&dir.path().join(file), 1);
    }

    cache.data_for_endpoint("producao", None).unwrap();
    cache.data_for_endpoint("comercializacao", None).unwrap();
    // Touch producao so comercializacao becomes the eviction candidate.
    cache.data_for_endpoint("producao", None).unwrap();
    cache.data_for_endpoint("importacao", None).unwrap();

    let stats = cache.memo_stats();
    assert_eq!(stats.size, 2);
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.utilization_percent, 100.0);
    assert_eq!(stats.memory_usage, "high");

    let before = cache.memo_stats().hits;
    cache.data_for_endpoint("producao", None).unwrap();
    assert_eq!(cache.memo_stats().hits, before + 1);
}

#[test]
fn latin1_file_with_comma_delimiter_parses() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new());
    let cache = cache_with_clock(dir.path(), clock);

    // "Ação" and "Média" in Windows-1252.
    let mut bytes = b"Pa\xEDs,Quantidade\n".to_vec();
    bytes.extend_from_slice(b"A\xE7\xE3o,10\n");
    bytes.extend_from_slice(b"Chile,20\n");
    bytes.extend_from_slice(b"M\xE9dia,15\n");
    fs::write(dir.path().join("ImpVinhos.csv"), bytes).unwrap();

    let table = cache.data_for_endpoint("importacao", Some("vinhos")).unwrap();
    assert_eq!(table.header, vec![vec!["País".to_string(), "Quantidade".to_string()]]);
    assert_eq!(table.body.len(), 2);
    assert_eq!(table.body[0].item_data[0], "Ação");
    assert_eq!(table.footer, vec![vec!["Média".to_string(), "15".to_string()]]);
}

#[test]
fn unknown_sub_option_uses_default_file() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new());
    let cache = cache_with_clock(dir.path(), clock);
    write_rows(&dir.path().join("ProcessaViniferas.csv"), 3);

    let path = cache.resolve("Processamento", Some("unknown")).unwrap();
    assert!(path.ends_with("ProcessaViniferas.csv"));

    let err = cache.resolve("processamento", Some("americanas")).unwrap_err();
    assert!(matches!(err, Error::FileResolution(_)));
}

#[test]
fn validation_reports_partial_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new());
    let cache = cache_with_clock(dir.path(), clock);
    write_rows(&dir.path().join("Producao.csv"), 1);
    write_rows(&dir.path().join("Comercio.csv"), 1);

    let report = cache.validate_mappings();
    assert_eq!(report.overall_status, MappingStatus::Partial);
    assert_eq!(report.valid_endpoints, 2);
    assert_eq!(report.existing_files, 2);
    assert!(report.missing_files.contains(&"ImpVinhos.csv".to_string()));
    assert!(report.endpoints["producao"].valid);
    assert!(!report.endpoints["importacao"].valid);
    assert_eq!(report.endpoints["importacao"].errors.len(), 6);
}

#[test]
fn clearing_memo_forces_reparse() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new());
    let cache = cache_with_clock(dir.path(), clock);
    write_rows(&dir.path().join("Producao.csv"), 1);

    let first = cache.data_for_endpoint("producao", None).unwrap();
    assert_eq!(cache.clear_memo(), 1);
    let second = cache.data_for_endpoint("producao", None).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(cache.memo_stats().size, 1);
}

#[test]
fn deleted_file_drops_its_memo_entry() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_with_clock(dir.path(), Arc::new(ManualClock::new()));
    let path = dir.path().join("Producao.csv");

    write_rows(&path, 2);
    cache.parse_file(&path).unwrap();
    assert_eq!(cache.memo_stats().size, 1);

    fs::remove_file(&path).unwrap();
    assert!(cache.parse_file(&path).is_err());
    let stats = cache.memo_stats();
    assert_eq!(stats.size, 0);
    assert_eq!(stats.invalidations, 1);
}
