//! Local HTTP stand-in for the CAVE services
//!
//! Binds an ephemeral port and records every request it receives. Answers
//! follow fixed rules so tests can predict them:
//!
//! - info: graphene source with a `middleauth+` prefix, resolution 4 x 4 x 40
//! - `node/{n}/leaves`: `[n * 10, n * 10 + 1]`, or HTTP 500 for `FAILING_NODE`
//! - `roots_binary`: each leaf maps to `leaf + 1`
//! - l2cache `attributes`: `rep_coord_nm = [id, 2 * id, 10 * id]`, absent when `id % 3 == 0`

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cgtools_common::config::Settings;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const DATASTACK: &str = "fake_stack";
pub const TABLE: &str = "fake_table";
pub const TOKEN: &str = "test-token-123";
pub const FAILING_NODE: u64 = 13;
pub const FAILING_NODE_BODY: &str = "node 13 exploded";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Clone)]
struct FakeState {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeState {
    fn record(&self, method: &str, uri: &Uri, headers: &HeaderMap, body: &[u8]) {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push(RecordedRequest {
            method: method.to_string(),
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            authorization,
            body: body.to_vec(),
        });
    }
}

/// Running fake server; shut down on drop
pub struct FakeCave {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    server: JoinHandle<()>,
}

impl FakeCave {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            base_url: base_url.clone(),
            requests: Arc::clone(&requests),
        };

        let app = Router::new()
            .route("/info/api/v2/datastack/full/:datastack", get(datastack_info))
            .route("/segmentation/api/v1/table/:table/node/:node/leaves", get(leaves))
            .route("/segmentation/api/v1/table/:table/roots_binary", post(roots_binary))
            .route("/l2cache/api/v1/table/:table/attributes", post(l2_attributes))
            .with_state(state);

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url,
            requests,
            server,
        }
    }

    /// Settings pointing at this server
    pub fn settings(&self, token: Option<&str>) -> Settings {
        Settings {
            global_server: self.base_url.clone(),
            datastack: DATASTACK.to_string(),
            token: token.map(str::to_string),
            workers: 4,
            task_timeout: Some(Duration::from_secs(10)),
            max_requests_per_second: None,
            log_level: "info".to_string(),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Most recent request whose path ends with `suffix`
    pub fn last_request(&self, suffix: &str) -> Option<RecordedRequest> {
        self.requests()
            .into_iter()
            .rev()
            .find(|r| r.path.ends_with(suffix))
    }
}

impl Drop for FakeCave {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn datastack_info(
    State(state): State<FakeState>,
    Path(datastack): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    state.record("GET", &uri, &headers, &[]);
    if datastack != DATASTACK {
        return (
            StatusCode::NOT_FOUND,
            format!("datastack {} not found", datastack),
        )
            .into_response();
    }

    Json(json!({
        "segmentation_source": format!(
            "graphene://middleauth+{}/segmentation/table/{}",
            state.base_url, TABLE
        ),
        "local_server": state.base_url,
        "viewer_resolution_x": 4.0,
        "viewer_resolution_y": 4.0,
        "viewer_resolution_z": 40.0,
        "aligned_volume": {"name": "fake_volume"},
    }))
    .into_response()
}

async fn leaves(
    State(state): State<FakeState>,
    Path((_table, node)): Path<(String, u64)>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    state.record("GET", &uri, &headers, &[]);
    if node == FAILING_NODE {
        return (StatusCode::INTERNAL_SERVER_ERROR, FAILING_NODE_BODY).into_response();
    }
    Json(json!({ "leaf_ids": [node * 10, node * 10 + 1] })).into_response()
}

async fn roots_binary(
    State(state): State<FakeState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.record("POST", &uri, &headers, &body);
    if body.len() % 8 != 0 {
        return (StatusCode::BAD_REQUEST, "ragged payload").into_response();
    }
    let roots: Vec<u8> = body
        .chunks_exact(8)
        .flat_map(|chunk| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            (u64::from_le_bytes(buf) + 1).to_le_bytes()
        })
        .collect();
    roots.into_response()
}

async fn l2_attributes(
    State(state): State<FakeState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.record("POST", &uri, &headers, &body);
    let request: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let mut answer = serde_json::Map::new();
    let ids = request["l2_ids"].as_array().cloned().unwrap_or_default();
    for id in ids.iter().filter_map(Value::as_u64) {
        let attributes = if id % 3 == 0 {
            json!({})
        } else {
            let nm = id as f64;
            json!({ "rep_coord_nm": [nm, nm * 2.0, nm * 10.0] })
        };
        answer.insert(id.to_string(), attributes);
    }
    Json(Value::Object(answer)).into_response()
}
