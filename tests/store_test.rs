use httpmock::prelude::*;
use kontrol_scaffold::config::{HttpProjectStore, LocalProjectStore};
use kontrol_scaffold::domain::ports::ProjectStore;
use kontrol_scaffold::ScaffoldError;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_http_store_loads_project() {
    let server = MockServer::start_async().await;
    let project = serde_json::json!({
        "name": "Remote",
        "description": "saved from the editor",
        "services": [
            {"id": "n1", "type": "node", "label": "API"},
            {"id": "n2", "type": "redis", "label": "Cache"}
        ],
        "connections": [{"id": "c1", "source": "n1", "target": "n2"}]
    });

    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/projects/p1");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(project);
        })
        .await;

    let store = HttpProjectStore::new(&server.base_url(), Duration::from_secs(5)).unwrap();
    let graph = store.load_project("p1").await.unwrap();

    mock.assert_async().await;
    assert_eq!(graph.name, "Remote");
    assert_eq!(graph.services.len(), 2);
    assert_eq!(graph.connections[0].target, "n2");
}

#[tokio::test]
async fn test_http_store_maps_missing_project() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/projects/missing");
            then.status(404).json_body(serde_json::json!({"error": "Project not found"}));
        })
        .await;

    let store = HttpProjectStore::new(&server.base_url(), Duration::from_secs(5)).unwrap();
    let err = store.load_project("missing").await.unwrap_err();
    assert!(matches!(err, ScaffoldError::ProjectNotFound { ref id } if id == "missing"));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_http_store_upstream_failure_is_opaque() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/projects/p1");
            then.status(500).body("database exploded");
        })
        .await;

    let store = HttpProjectStore::new(&server.base_url(), Duration::from_secs(5)).unwrap();
    let err = store.load_project("p1").await.unwrap_err();
    assert!(matches!(err, ScaffoldError::StoreError(_)));
    assert_eq!(err.status_code(), 502);
    assert_eq!(err.user_friendly_message(), "Internal server error");
}

#[tokio::test]
async fn test_local_store_reads_json_files() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("shop.json"),
        r#"{"name": "Shop", "services": [{"id": "a", "type": "vue", "label": "Web"}]}"#,
    )
    .unwrap();

    let store = LocalProjectStore::new(dir.path());
    let graph = store.load_project("shop").await.unwrap();
    assert_eq!(graph.name, "Shop");
    assert_eq!(graph.services[0].service_type, "vue");

    let err = store.load_project("other").await.unwrap_err();
    assert!(matches!(err, ScaffoldError::ProjectNotFound { .. }));
}

#[tokio::test]
async fn test_local_store_reports_corrupt_files() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("bad.json"), "{ nope").unwrap();

    let store = LocalProjectStore::new(dir.path());
    let err = store.load_project("bad").await.unwrap_err();
    assert!(matches!(err, ScaffoldError::SerializationError(_)));
}
