//! In-process stand-ins for the remote services.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use drsprobe::deployment::DeploymentConfig;
use drsprobe::probes::ProbeClient;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DRS_URI: &str = "drs://dg.712C:dg.712C/fa640b0e-9779-452f-99a6-16d833d15bd0";
pub const OBJECT_ID: &str = "dg.712C/fa640b0e-9779-452f-99a6-16d833d15bd0";
pub const USER_TOKEN: &str = "user-token";
pub const FENCE_TOKEN: &str = "fence-token";

/// Knobs and a request log shared with the handlers.
pub struct MockState {
    pub access_token_status: StatusCode,
    pub metadata: Value,
    /// Raw 200 body for the service-account key, replacing the JSON document.
    pub sa_key_body: Option<&'static str>,
    pub martha_delay: Duration,
    pub statuses: Mutex<VecDeque<String>>,
    pub requests: Mutex<Vec<String>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            access_token_status: StatusCode::OK,
            metadata: json!({
                "id": OBJECT_ID,
                "access_methods": [
                    {"type": "s3", "access_id": "aws-east"},
                    {"type": "gs", "access_id": "gs"}
                ]
            }),
            sa_key_body: None,
            martha_delay: Duration::ZERO,
            statuses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl MockState {
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn log(&self, entry: String) {
        self.requests.lock().unwrap().push(entry);
    }
}

type Shared = Arc<MockState>;

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

async fn bond_access_token(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    state.log("bond accesstoken".to_string());
    if bearer(&headers).as_deref() != Some(USER_TOKEN) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "no token"})));
    }
    if state.access_token_status != StatusCode::OK {
        return (state.access_token_status, Json(json!({"error": "unlinked"})));
    }
    (StatusCode::OK, Json(json!({"token": FENCE_TOKEN, "expires_at": "2030-01-01T00:00:00Z"})))
}

async fn bond_sa_key(State(state): State<Shared>) -> Response {
    state.log("bond serviceaccount/key".to_string());
    match state.sa_key_body {
        Some(body) => (StatusCode::OK, body).into_response(),
        None => Json(json!({"data": {"type": "service_account", "client_email": "sa@example.iam"}})).into_response(),
    }
}

async fn drs_objects(
    State(state): State<Shared>,
    Path(rest): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    match rest.split_once("/access/") {
        Some((object_id, access_id)) => {
            state.log(format!("drs access {} {}", object_id, access_id));
            if bearer(&headers).as_deref() != Some(FENCE_TOKEN) {
                return (StatusCode::UNAUTHORIZED, Json(json!({})));
            }
            (
                StatusCode::OK,
                Json(json!({"url": format!("https://storage.example.org/{}?sig=abc", object_id)})),
            )
        }
        None => {
            state.log(format!("drs metadata {}", rest));
            if rest != OBJECT_ID {
                return (StatusCode::NOT_FOUND, Json(json!({})));
            }
            (StatusCode::OK, Json(state.metadata.clone()))
        }
    }
}

async fn fence_user(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    state.log("fence user".to_string());
    if bearer(&headers).as_deref() != Some(FENCE_TOKEN) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    (StatusCode::OK, Json(json!({"username": "someone@example.org"})))
}

async fn martha(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    state.log(format!("martha {}", body["url"].as_str().unwrap_or_default()));
    tokio::time::sleep(state.martha_delay).await;
    Json(json!({"gsUri": "gs://bucket/object", "size": 42}))
}

async fn submission(
    State(state): State<Shared>,
    Path((namespace, name, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.log(format!("submission {}/{}/{}", namespace, name, id));
    if bearer(&headers).as_deref() != Some(USER_TOKEN) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    let status = {
        let mut statuses = state.statuses.lock().unwrap();
        if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        }
    };
    match status {
        Some(status) => (StatusCode::OK, Json(submission_json(&status, &id))),
        None => (StatusCode::NOT_FOUND, Json(json!({"message": "no such submission"}))),
    }
}

pub fn submission_json(status: &str, id: &str) -> Value {
    json!({
        "status": status,
        "submissionDate": "2021-02-03T14:15:16.789Z",
        "submitter": "someone@example.org",
        "methodConfigurationNamespace": "drs-billing-project",
        "methodConfigurationName": "md5sum",
        "submissionId": id,
        "submissionEntity": {"entityType": "sample_set", "entityName": "scale_test"},
        "useCallCache": true,
        "userComment": "scale test"
    })
}

/// Serve the mock on an ephemeral loopback port and return its base URL.
pub async fn spawn_mock(state: Shared) -> String {
    let app = Router::new()
        .route("/api/link/v1/fence/accesstoken", get(bond_access_token))
        .route("/api/link/v1/fence/serviceaccount/key", get(bond_sa_key))
        .route("/ga4gh/drs/v1/objects/{*rest}", get(drs_objects))
        .route("/user/user/", get(fence_user))
        .route("/martha_v3/", post(martha))
        .route(
            "/api/workspaces/{namespace}/{name}/submissions/{id}",
            get(submission),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Deployment whose every service points at `base`.
pub fn deployment(base: &str) -> Arc<DeploymentConfig> {
    Arc::new(DeploymentConfig {
        tier: "test".to_string(),
        bond_host: base.to_string(),
        bond_provider: "fence".to_string(),
        martha_host: base.to_string(),
        gen3_host: base.to_string(),
        public_drs_uri: DRS_URI.to_string(),
        cloud_uri_scheme: "gs".to_string(),
        orchestration_url: base.to_string(),
    })
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .unwrap()
}

pub fn probe_client() -> ProbeClient {
    ProbeClient::from_client(http_client())
}
