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

//! `GET /api/health` — liveness/readiness probe.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage_reachable: bool,
    pub fallback_enabled: bool,
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let storage_reachable = state.store.get_namespace(&kohakuhub_core::namespace::NamespaceKey::user("health-check-probe")).is_ok();

    let status_code = if storage_reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if storage_reachable { "healthy".to_string() } else { "degraded".to_string() },
            version: env!("CARGO_PKG_VERSION").to_string(),
            storage_reachable,
            fallback_enabled: state.fallback.enabled(),
        }),
    )
}
