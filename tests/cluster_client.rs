//! End-to-end request tests against a mock cluster.

use futures_util::future::join_all;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use search_cluster_client::config::ConnectionOptions;
use search_cluster_client::{Cluster, Error, Method, RawClusterConfig, RequestOptions};

mod common;

fn start_cluster(name: &str, raw: RawClusterConfig) -> Arc<Cluster> {
    Cluster::builder(name).config(raw).start().unwrap()
}

#[tokio::test]
async fn test_concurrent_requests_share_a_bounded_pool() {
    let mock = common::start_mock_cluster().await;
    let cluster = start_cluster("bounded", RawClusterConfig::new(mock.url()).with_pool_size(2));

    let requests = (0..3).map(|_| cluster.get("/slow", &[]));
    let results = join_all(requests).await;

    for result in results {
        assert_eq!(result.unwrap().body, json!({"slow": true}));
    }
    // No credentials configured: nothing was signed
    assert_eq!(mock.state.auth_headers(), vec![None, None, None]);
    assert!(mock.state.peak_in_flight.load(Ordering::SeqCst) <= 2);

    let stats = cluster.pool_stats().unwrap();
    assert!(stats.created <= 2);
    assert_eq!(stats.checked_out, 0);
}

#[tokio::test]
async fn test_basic_credentials_are_sent() {
    let mock = common::start_mock_cluster().await;
    let raw = RawClusterConfig::new(mock.url()).with_credentials("u", "p");
    let cluster = start_cluster("basic", raw);

    let response = cluster.post("/articles/_doc", &json!({"title": "x"})).await.unwrap();
    assert_eq!(response.status, 201);
    assert_eq!(response.body["authorization"], "Basic dTpw");
    assert_eq!(mock.state.auth_headers(), vec![Some("Basic dTpw".to_string())]);
}

#[tokio::test]
async fn test_document_round_trip() {
    let mock = common::start_mock_cluster().await;
    let cluster = start_cluster("docs", RawClusterConfig::new(mock.url()));

    let err = cluster.get("/articles/_doc/1", &[]).await.unwrap_err();
    match err {
        Error::Http(e) => {
            assert_eq!(e.status, 404);
            assert_eq!(e.error_type(), Some("document_missing_exception"));
            assert_eq!(e.reason(), Some("[1]: document missing"));
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }

    let created = cluster.put("/articles/_doc/1", &json!({"title": "first"})).await.unwrap();
    assert_eq!(created.status, 201);
    assert_eq!(created.body["result"], "created");

    let fetched = cluster.get("/articles/_doc/1", &[]).await.unwrap();
    assert_eq!(fetched.body["_source"], json!({"title": "first"}));

    let updated = cluster.put("/articles/_doc/1", &json!({"title": "second"})).await.unwrap();
    assert_eq!(updated.body["result"], "updated");

    let deleted = cluster.delete("/articles/_doc/1").await.unwrap();
    assert_eq!(deleted.body["result"], "deleted");

    // Error statuses never cost a connection
    let stats = cluster.pool_stats().unwrap();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.closed, 0);
}

#[tokio::test]
async fn test_fetched_source_writes_back_unchanged() {
    let mock = common::start_mock_cluster().await;
    let cluster = start_cluster("write-back", RawClusterConfig::new(mock.url()));
    let doc = json!({
        "title": "Ünïcode \"quoted\" & <tagged>",
        "tags": ["a", "b"],
        "stats": {"views": 12, "score": 0.5, "draft": false, "editor": null},
        "empty": {}
    });

    cluster.put("/articles/_doc/9", &doc).await.unwrap();
    let first = cluster.get("/articles/_doc/9", &[]).await.unwrap();
    assert_eq!(first.body["_source"], doc);

    let updated = cluster.put("/articles/_doc/9", &first.body["_source"]).await.unwrap();
    assert_eq!(updated.body["result"], "updated");
    let second = cluster.get("/articles/_doc/9", &[]).await.unwrap();
    assert_eq!(second.body, first.body);
}

#[tokio::test]
async fn test_params_and_headers_reach_the_cluster() {
    let mock = common::start_mock_cluster().await;
    let cluster = start_cluster("echo", RawClusterConfig::new(mock.url()));

    let response = cluster
        .request(
            Method::Get,
            "echo",
            None,
            &[("q", "title:rust"), ("size", "5")],
            &[("Authorization", "Bearer abc")],
            RequestOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(response.body["query"], "q=title%3Arust&size=5");
    assert_eq!(response.body["authorization"], "Bearer abc");
}

#[tokio::test]
async fn test_empty_body_decodes_to_null() {
    let mock = common::start_mock_cluster().await;
    let cluster = start_cluster("empty", RawClusterConfig::new(mock.url()));

    let response = cluster.get("/empty", &[]).await.unwrap();
    assert_eq!(response.status, 200);
    assert!(response.body.is_null());
}

#[tokio::test]
async fn test_malformed_body_is_decode_error_and_connection_survives() {
    let mock = common::start_mock_cluster().await;
    let cluster = start_cluster("malformed", RawClusterConfig::new(mock.url()));

    let err = cluster.get("/malformed", &[]).await.unwrap_err();
    assert!(matches!(err, Error::Decode { ref body, .. } if body == "<html>not json</html>"));

    let stats = cluster.pool_stats().unwrap();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.closed, 0);

    // The same connection serves the next request
    cluster.get("/_cluster/health", &[]).await.unwrap();
    assert_eq!(cluster.pool_stats().unwrap().created, 1);
}

#[tokio::test]
async fn test_error_status_with_text_body() {
    let mock = common::start_mock_cluster().await;
    let cluster = start_cluster("broken", RawClusterConfig::new(mock.url()));

    match cluster.get("/broken", &[]).await.unwrap_err() {
        Error::Http(e) => {
            assert_eq!(e.status, 500);
            assert!(e.body.is_none());
            assert_eq!(e.raw, "upstream exploded");
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_transport_fault_invalidates_connection() {
    let url = common::start_dropping_endpoint().await;
    let cluster = start_cluster("faulty", RawClusterConfig::new(url).with_pool_size(1));

    for _ in 0..2 {
        let err = cluster.get("/", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)), "got {err:?}");
    }

    let stats = cluster.pool_stats().unwrap();
    assert_eq!(stats.created, 2);
    assert_eq!(stats.closed, 2);
    assert_eq!(stats.idle, 0);
    assert_eq!(stats.checked_out, 0);
}

#[tokio::test]
async fn test_receive_timeout_is_transport_error() {
    let url = common::start_silent_endpoint().await;
    let raw = RawClusterConfig {
        conn_opts: ConnectionOptions {
            receive_timeout_ms: 50,
            ..Default::default()
        },
        ..RawClusterConfig::new(url)
    };
    let cluster = start_cluster("silent", raw);

    let err = cluster.get("/", &[]).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(cluster.pool_stats().unwrap().closed, 1);
}

#[tokio::test]
async fn test_connect_failure_frees_the_slot() {
    // Grab a free port, then close it so nothing listens there
    let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let cluster = start_cluster("refused", RawClusterConfig::new(format!("http://{}", addr)).with_pool_size(1));

    for _ in 0..2 {
        let err = cluster.get("/", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
    let stats = cluster.pool_stats().unwrap();
    assert_eq!(stats.checked_out, 0);
    assert_eq!(stats.open, 0);
}

#[tokio::test]
async fn test_pool_timeout_when_exhausted() {
    let mock = common::start_mock_cluster().await;
    let cluster = start_cluster("exhausted", RawClusterConfig::new(mock.url()).with_pool_size(1));

    let slow = {
        let cluster = cluster.clone();
        tokio::spawn(async move { cluster.get("/slow", &[]).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let opts = RequestOptions::default().with_pool_timeout(Duration::from_millis(20));
    let err = cluster
        .request(Method::Get, "/_cluster/health", None, &[], &[], opts)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PoolTimeout(_)));

    // The holder is unaffected
    assert!(slow.await.unwrap().is_ok());
    cluster.get("/_cluster/health", &[]).await.unwrap();
}

#[tokio::test]
async fn test_stop_rejects_then_restart_serves() {
    let mock = common::start_mock_cluster().await;
    let cluster = start_cluster("restartable", RawClusterConfig::new(mock.url()));
    cluster.get("/_cluster/health", &[]).await.unwrap();

    assert!(cluster.stop(Duration::from_secs(1)).await);
    let err = cluster.get("/_cluster/health", &[]).await.unwrap_err();
    assert!(matches!(err, Error::NotStarted(_)));

    assert!(cluster.start());
    let response = cluster.get("/_cluster/health", &[]).await.unwrap();
    assert_eq!(response.body["status"], "green");
    // Fresh pool after restart
    assert_eq!(cluster.pool_stats().unwrap().created, 1);
}

#[tokio::test]
async fn test_stop_aborts_requests_past_grace() {
    let mock = common::start_mock_cluster().await;
    let cluster = start_cluster("impatient", RawClusterConfig::new(mock.url()));

    let in_flight = {
        let cluster = cluster.clone();
        tokio::spawn(async move { cluster.get("/slow", &[]).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(!cluster.stop(Duration::from_millis(10)).await);
    assert!(in_flight.await.unwrap().is_err());
}

#[tokio::test]
async fn test_idle_connections_are_reaped() {
    let mock = common::start_mock_cluster().await;
    let raw = RawClusterConfig {
        conn_opts: ConnectionOptions {
            idle_timeout_ms: Some(40),
            ..Default::default()
        },
        ..RawClusterConfig::new(mock.url())
    };
    let cluster = start_cluster("reaped", raw);

    cluster.get("/_cluster/health", &[]).await.unwrap();
    assert_eq!(cluster.pool_stats().unwrap().idle, 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let stats = cluster.pool_stats().unwrap();
    assert_eq!(stats.idle, 0);
    assert_eq!(stats.closed, 1);
}
