//! Shared utilities for integration tests: a mock search cluster and fault injectors.

#![allow(dead_code)]

use axum::extract::{Path, RawQuery, Request, State};
use axum::http::{header::AUTHORIZATION, StatusCode};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use search_cluster_client::{Measurements, TelemetryEvent, TelemetryHandler};

/// What the mock cluster observed.
#[derive(Default)]
pub struct MockState {
    docs: Mutex<HashMap<String, Value>>,
    pub requests: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    /// `Authorization` header of every request, in arrival order.
    pub auth_headers: Mutex<Vec<Option<String>>>,
}

impl MockState {
    pub fn auth_headers(&self) -> Vec<Option<String>> {
        self.auth_headers.lock().unwrap().clone()
    }
}

/// A running mock cluster.
pub struct MockCluster {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockCluster {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Start a mock cluster on an ephemeral port.
///
/// Routes:
/// - `GET /_cluster/health`
/// - `GET|PUT|DELETE /{index}/_doc/{id}`, `POST /{index}/_doc` (in-memory store)
/// - `GET /slow` answers after 150ms
/// - `GET /echo` reflects the query string and authorization header
/// - `GET /malformed` answers 200 with a non-JSON body
/// - `GET /empty` answers 200 with an empty body
/// - `GET /broken` answers 500 with a non-JSON body
pub async fn start_mock_cluster() -> MockCluster {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/_cluster/health", get(health))
        .route("/slow", get(slow))
        .route("/echo", get(echo))
        .route("/malformed", get(|| async { "<html>not json</html>" }))
        .route("/empty", get(|| async { StatusCode::OK }))
        .route("/broken", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }))
        .route("/{index}/_doc", post(index_doc))
        .route("/{index}/_doc/{id}", get(get_doc).put(put_doc).delete(delete_doc))
        .layer(middleware::from_fn_with_state(state.clone(), track))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockCluster { addr, state }
}

async fn track(State(state): State<Arc<MockState>>, req: Request, next: Next) -> impl IntoResponse {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let auth = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.auth_headers.lock().unwrap().push(auth);

    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    let response = next.run(req).await;
    state.in_flight.fetch_sub(1, Ordering::SeqCst);
    response
}

async fn health() -> Json<Value> {
    Json(json!({"cluster_name": "mock", "status": "green", "number_of_nodes": 1}))
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(150)).await;
    Json(json!({"slow": true}))
}

async fn echo(RawQuery(query): RawQuery, req: Request) -> Json<Value> {
    let auth = req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    Json(json!({"query": query, "authorization": auth}))
}

fn doc_key(index: &str, id: &str) -> String {
    format!("{}/{}", index, id)
}

async fn get_doc(State(state): State<Arc<MockState>>, Path((index, id)): Path<(String, String)>) -> impl IntoResponse {
    match state.docs.lock().unwrap().get(&doc_key(&index, &id)) {
        Some(source) => (
            StatusCode::OK,
            Json(json!({"_index": index, "_id": id, "found": true, "_source": source})),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": {"type": "document_missing_exception", "reason": format!("[{}]: document missing", id)},
                "status": 404
            })),
        ),
    }
}

async fn put_doc(
    State(state): State<Arc<MockState>>,
    Path((index, id)): Path<(String, String)>,
    Json(source): Json<Value>,
) -> impl IntoResponse {
    let previous = state.docs.lock().unwrap().insert(doc_key(&index, &id), source);
    let (status, result) = match previous {
        Some(_) => (StatusCode::OK, "updated"),
        None => (StatusCode::CREATED, "created"),
    };
    (status, Json(json!({"_index": index, "_id": id, "result": result})))
}

async fn delete_doc(State(state): State<Arc<MockState>>, Path((index, id)): Path<(String, String)>) -> impl IntoResponse {
    match state.docs.lock().unwrap().remove(&doc_key(&index, &id)) {
        Some(_) => (StatusCode::OK, Json(json!({"_index": index, "_id": id, "result": "deleted"}))),
        None => (StatusCode::NOT_FOUND, Json(json!({"_index": index, "_id": id, "result": "not_found"}))),
    }
}

async fn index_doc(
    State(state): State<Arc<MockState>>,
    Path(index): Path<String>,
    req: Request,
) -> impl IntoResponse {
    let auth = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let bytes = axum::body::to_bytes(req.into_body(), usize::MAX).await.unwrap_or_default();
    let source: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    let id = uuid::Uuid::new_v4().simple().to_string();
    state.docs.lock().unwrap().insert(doc_key(&index, &id), source);
    (
        StatusCode::CREATED,
        Json(json!({"_index": index, "_id": id, "result": "created", "authorization": auth})),
    )
}

/// Endpoint that reads a request and closes the socket without answering.
pub async fn start_dropping_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
            });
        }
    });
    format!("http://{}", addr)
}

/// Endpoint that accepts connections and never answers.
pub async fn start_silent_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut sockets = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            sockets.push(socket);
        }
    });
    format!("http://{}", addr)
}

/// Owned copy of one telemetry event.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub name: String,
    pub outcome: &'static str,
    pub status: Option<u16>,
    pub method: &'static str,
    pub path: String,
    pub host: String,
    pub port: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub measurements: Measurements,
}

/// Handler that keeps every event it sees.
pub fn recorder() -> (Arc<dyn TelemetryHandler>, Arc<Mutex<Vec<Recorded>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let handler: Arc<dyn TelemetryHandler> = Arc::new(move |event: &TelemetryEvent<'_>| {
        sink.lock().unwrap().push(Recorded {
            name: event.name.to_string(),
            outcome: event.outcome(),
            status: event.status(),
            method: event.metadata.method.as_str(),
            path: event.metadata.path.to_string(),
            host: event.metadata.host.to_string(),
            port: event.metadata.port,
            headers: event.metadata.headers.to_vec(),
            body: event
                .metadata
                .body
                .map(|b| String::from_utf8_lossy(b).into_owned()),
            measurements: event.measurements,
        });
    });
    (handler, events)
}
