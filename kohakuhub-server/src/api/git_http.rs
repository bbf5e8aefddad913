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

//! Git Bridge (C6, spec §4.6) HTTP wiring. The pack synthesis and
//! service-advertisement logic itself lives in
//! `kohakuhub_storage::git::GitBridge`; this module only resolves the
//! `{ns}/{name}.git` path into a canonical repo name, enforces
//! read/write, and frames the response.

use super::strip_dot_git;
use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use kohakuhub_core::error::KohakuError;
use kohakuhub_core::permissions::{can_read, can_write};
use kohakuhub_core::repo::{canonical_repo_name, RepoId, RepoType};
use serde::Deserialize;

/// `{ns}/{name}.git` is ambiguous about repo type; Git HTTP addresses are
/// model repos unless the caller used the `datasets/` or `spaces/`
/// prefix, which axum routes separately (see `lib.rs`'s route table).
fn resolve_repo(state: &AppState, repo_type: RepoType, namespace: &str, name: &str) -> ApiResult<kohakuhub_core::repo::Repository> {
    let id = RepoId::new(repo_type, namespace, name);
    state
        .store
        .get_repository(&id)?
        .ok_or_else(|| ApiError(KohakuError::not_found(format!("repository {id}"))))
}

#[derive(Debug, Deserialize)]
pub struct ServiceQuery {
    pub service: Option<String>,
}

pub async fn info_refs(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path((namespace, name)): Path<(String, String)>,
    Query(query): Query<ServiceQuery>,
) -> ApiResult<impl IntoResponse> {
    let name = strip_dot_git(&name);
    let repo = resolve_repo(&state, RepoType::Model, &namespace, &name)?;
    let principal = state.principal_for(&ctx, &namespace)?;
    if !can_read(&principal, &repo) {
        return Err(ApiError(KohakuError::permission_denied("cannot read this repository")));
    }
    let service = query.service.unwrap_or_else(|| "git-upload-pack".to_string());
    let canonical = canonical_repo_name(RepoType::Model, &namespace, &name);
    let advertisement = state.git_bridge.service_advertisement(&canonical, &service).await?;

    Ok((
        [
            (header::CONTENT_TYPE, advertisement.content_type),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        advertisement.body,
    ))
}

pub async fn git_head(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let name = strip_dot_git(&name);
    let repo = resolve_repo(&state, RepoType::Model, &namespace, &name)?;
    let principal = state.principal_for(&ctx, &namespace)?;
    if !can_read(&principal, &repo) {
        return Err(ApiError(KohakuError::permission_denied("cannot read this repository")));
    }
    Ok(state.git_bridge.head_ref())
}

pub async fn upload_pack(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path((namespace, name)): Path<(String, String)>,
    body: axum::body::Bytes,
) -> ApiResult<impl IntoResponse> {
    let name = strip_dot_git(&name);
    let repo = resolve_repo(&state, RepoType::Model, &namespace, &name)?;
    let principal = state.principal_for(&ctx, &namespace)?;
    if !can_read(&principal, &repo) {
        return Err(ApiError(KohakuError::permission_denied("cannot fetch this repository")));
    }
    let canonical = canonical_repo_name(RepoType::Model, &namespace, &name);
    let response = state
        .git_bridge
        .upload_pack(&canonical, &state.config.storage.default_branch, &body)
        .await?;
    Ok((
        [(header::CONTENT_TYPE, "application/x-git-upload-pack-result")],
        response,
    ))
}

/// `POST {repo}.git/git-receive-pack` — an accept-stub (spec §4.6, §9):
/// acknowledges ref updates without ingesting the pushed pack into C2.
pub async fn receive_pack(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path((namespace, name)): Path<(String, String)>,
    body: axum::body::Bytes,
) -> ApiResult<impl IntoResponse> {
    let name = strip_dot_git(&name);
    let repo = resolve_repo(&state, RepoType::Model, &namespace, &name)?;
    let principal = state.principal_for(&ctx, &namespace)?;
    if !can_write(&principal, &repo) {
        return Err(ApiError(KohakuError::permission_denied("cannot push to this repository")));
    }
    let response = state.git_bridge.receive_pack_stub(&body)?;
    Ok((
        [(header::CONTENT_TYPE, "application/x-git-receive-pack-result")],
        response,
    ))
}

pub async fn unsupported_service() -> impl IntoResponse {
    (StatusCode::BAD_REQUEST, "unsupported git service")
}
