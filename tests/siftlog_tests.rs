//! Facade crate: re-exports, config loading and log output

use chrono::Utc;
use siftlog::records::events::{Event, EventParams};
use siftlog::{
    logging, BackendConfig, ClusterInfo, LogStore, MemoryEngine, QueryParams, StorageConfig,
    TimeRange, CONFIG_FILE_NAME,
};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_logging_init_is_idempotent() {
    logging::init(tracing::Level::DEBUG);
    assert!(!logging::init(tracing::Level::INFO));
}

#[test]
fn test_open_from_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, BackendConfig::default_toml()).unwrap();
    assert!(LogStore::open_file(&path).is_ok());
}

#[test]
fn test_open_rejects_bad_storage() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    let content = BackendConfig::default_toml()
        .replace("default_page_size = 1000", "default_page_size = 0");
    std::fs::write(&path, content).unwrap();
    let err = LogStore::open_file(&path).unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_store_over_memory_engine() {
    logging::init(tracing::Level::DEBUG);
    let store = LogStore::with_engine(Arc::new(MemoryEngine::new()), &StorageConfig::default());
    let ci = ClusterInfo::new("cluster-a").with_tenant("acme");
    let event = Event {
        id: Some("e1".into()),
        time: Utc::now().timestamp(),
        kind: "gtf_suspicious_flow".into(),
        severity: 60,
        ..Default::default()
    };
    let resp = store.events.create(&ci, vec![event]).await.unwrap();
    assert!(resp.is_complete());

    let now = Utc::now();
    let params = EventParams {
        query_params: QueryParams::default().with_time_range(TimeRange::between(
            now - chrono::Duration::hours(1),
            now + chrono::Duration::hours(1),
        )),
        ..Default::default()
    };
    let page = store.events.list(&ci, &params).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].kind, "gtf_suspicious_flow");
}
