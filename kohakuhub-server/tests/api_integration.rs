// Copyright 2025 KohakuHub Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Drives `build_router` end to end with `tower::ServiceExt::oneshot`,
//! against an all-in-memory `AppState` (sqlite `:memory:`, `MemBlobStore`,
//! `MemoryVcsBackend`). Auth runs as `NoAuth` so every request is the
//! platform admin, matching local desktop/dev use.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::BodyExt;
use kohakuhub_server::auth::{Authenticator, NoAuth};
use kohakuhub_server::config::ServerConfig;
use kohakuhub_server::fallback::FallbackRouter;
use kohakuhub_server::state::AppState;
use kohakuhub_server::build_router;
use kohakuhub_storage::git::GitBridge;
use kohakuhub_storage::{MemBlobStore, MemoryVcsBackend, MetadataStore, QuotaEngine};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_state() -> AppState {
    let store = Arc::new(MetadataStore::open_in_memory().unwrap());
    let quota = Arc::new(QuotaEngine::new(store.clone()));
    let blobs: Arc<dyn kohakuhub_storage::BlobStore> = Arc::new(MemBlobStore::new());
    let vcs: Arc<dyn kohakuhub_storage::VcsBackend> = Arc::new(MemoryVcsBackend::new());
    let fallback = Arc::new(FallbackRouter::new(false, vec![], Duration::from_secs(60), Duration::from_secs(5), 4));
    let git_bridge = Arc::new(GitBridge::new(vcs.clone(), blobs.clone(), "kohakuhub".to_string()));

    AppState {
        config: Arc::new(ServerConfig::default()),
        store,
        vcs,
        blobs,
        quota,
        fallback,
        git_bridge,
    }
}

fn router() -> axum::Router {
    let state = test_state();
    let authenticator: Arc<dyn Authenticator> = Arc::new(NoAuth);
    build_router(state, authenticator)
}

async fn send(app: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body: Value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_check_reports_healthy() {
    let (status, body) = send(router(), Request::builder().uri("/api/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage_reachable"], true);
}

#[tokio::test]
async fn create_and_fetch_repo_round_trips() {
    let app = router();
    let (status, body) = send(
        app.clone(),
        json_req(
            "POST",
            "/api/repos/create",
            json!({ "type": "model", "namespace": "alice", "name": "widgets" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "/models/alice/widgets");

    let (status, body) = send(app.clone(), Request::builder().uri("/api/model/alice/widgets").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "model/alice/widgets");

    // duplicate creation is a conflict
    let (status, _) = send(
        app,
        json_req(
            "POST",
            "/api/repos/create",
            json!({ "type": "model", "namespace": "alice", "name": "widgets" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn delete_repo_uses_delete_verb_with_body() {
    let app = router();
    send(
        app.clone(),
        json_req("POST", "/api/repos/create", json!({ "type": "dataset", "namespace": "alice", "name": "temp" })),
    )
    .await;

    let (status, body) = send(
        app.clone(),
        json_req("DELETE", "/api/repos/delete", json!({ "type": "dataset", "namespace": "alice", "name": "temp" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _) = send(app, Request::builder().uri("/api/dataset/alice/temp").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn quota_get_defaults_to_unlimited_then_set_persists() {
    let app = router();
    let (status, body) = send(app.clone(), Request::builder().uri("/api/quota/alice").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["private_quota_bytes"], "unlimited");

    let (status, body) = send(
        app.clone(),
        Request::builder()
            .method("PUT")
            .uri("/api/quota/alice")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "private_quota_bytes": { "bytes": 1024 },
                    "public_quota_bytes": "unlimited",
                })
                .to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["private_quota_bytes"]["bytes"], 1024);

    let (_, body) = send(app, Request::builder().uri("/api/quota/alice").body(Body::empty()).unwrap()).await;
    assert_eq!(body["private_quota_bytes"]["bytes"], 1024);
}

fn fake_ed25519_key_line() -> String {
    let mut body = Vec::new();
    body.extend_from_slice(&11u32.to_be_bytes());
    body.extend_from_slice(b"ssh-ed25519");
    body.extend_from_slice(&32u32.to_be_bytes());
    body.extend_from_slice(&[7u8; 32]);
    format!("ssh-ed25519 {} admin@test-host", STANDARD.encode(&body))
}

#[tokio::test]
async fn ssh_key_add_then_list() {
    let app = router();
    let (status, body) = send(app.clone(), json_req("POST", "/api/user/keys", json!({ "key": fake_ed25519_key_line() }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["algorithm"], "ssh-ed25519");

    let (status, body) = send(app, Request::builder().uri("/api/user/keys").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_repo_type_is_rejected() {
    let (status, body) = send(
        router(),
        json_req("POST", "/api/repos/create", json!({ "type": "widget", "namespace": "alice", "name": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("unknown repo type"));
}
