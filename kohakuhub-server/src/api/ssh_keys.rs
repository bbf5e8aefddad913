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

//! SSH public key registry (C10, spec §4.10) HTTP surface:
//! `POST /api/user/keys`, `GET /api/user/keys`, `DELETE /api/user/keys/{id}`.

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::Json;
use kohakuhub_core::error::KohakuError;
use kohakuhub_core::ssh_key::parse_public_key;
use serde::{Deserialize, Serialize};

fn current_user(ctx: &AuthContext) -> ApiResult<&str> {
    ctx.user.as_deref().ok_or_else(|| ApiError(KohakuError::AuthRequired))
}

#[derive(Debug, Deserialize)]
pub struct AddSshKeyRequest {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct SshKeyResponse {
    pub fingerprint_sha256: String,
    pub algorithm: String,
    pub comment: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<kohakuhub_core::ssh_key::SshKey> for SshKeyResponse {
    fn from(key: kohakuhub_core::ssh_key::SshKey) -> Self {
        Self {
            fingerprint_sha256: key.fingerprint_sha256,
            algorithm: key.algorithm.wire_name().to_string(),
            comment: key.comment,
            created_at: key.created_at,
        }
    }
}

pub async fn add_ssh_key(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<AddSshKeyRequest>,
) -> ApiResult<Json<SshKeyResponse>> {
    let user = current_user(&ctx)?;
    let key = parse_public_key(user, &req.key)
        .map_err(|e| ApiError(KohakuError::validation(e.to_string())))?;
    state.store.insert_ssh_key(&key)?;
    Ok(Json(key.into()))
}

pub async fn list_ssh_keys(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<SshKeyResponse>>> {
    let user = current_user(&ctx)?;
    let keys = state.store.list_ssh_keys(user)?;
    Ok(Json(keys.into_iter().map(Into::into).collect()))
}

pub async fn delete_ssh_key(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(fingerprint): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = current_user(&ctx)?;
    let deleted = state.store.delete_ssh_key(user, &fingerprint)?;
    if !deleted {
        return Err(ApiError(KohakuError::not_found(format!("ssh key {fingerprint}"))));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
