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

//! Resolve/Download Router (C9, spec §4.9). Falls through to the
//! external fallback proxy (C8) on a local 404 when fallback is enabled.

use super::parse_repo_type;
use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use kohakuhub_core::error::KohakuError;
use kohakuhub_core::lfs::lfs_key;
use kohakuhub_core::permissions::can_read;
use kohakuhub_core::repo::{canonical_repo_name, RepoId};
use kohakuhub_storage::blobstore::DEFAULT_PRESIGN_TTL;

pub async fn resolve_file(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path((repo_type, namespace, name, rev, path)): Path<(String, String, String, String, String)>,
) -> ApiResult<Response> {
    let repo_type_parsed = parse_repo_type(&repo_type)?;
    let id = RepoId::new(repo_type_parsed, &namespace, &name);

    let repo = match state.store.get_repository(&id)? {
        Some(repo) => repo,
        None => return fall_back_or_404(&state, repo_type_parsed, &namespace, &name, &rev, &path).await,
    };

    let principal = state.principal_for(&ctx, &namespace)?;
    if !can_read(&principal, &repo) {
        return Err(ApiError(KohakuError::permission_denied("cannot read this repository")));
    }

    let canonical = canonical_repo_name(repo_type_parsed, &namespace, &name);
    let entry = state.vcs.stat_object(&canonical, &rev, &path).await?;
    let entry = match entry {
        Some(e) => e,
        None => return fall_back_or_404(&state, repo_type_parsed, &namespace, &name, &rev, &path).await,
    };

    let bucket = &state.config.s3.bucket;
    let key = if entry.is_lfs {
        lfs_key(&entry.checksum)
    } else {
        entry.physical_address.clone()
    };
    let filename = path.rsplit('/').next();
    let url = state.blobs.presign_download(bucket, &key, DEFAULT_PRESIGN_TTL, filename).await?;
    Ok(Redirect::temporary(&url).into_response())
}

pub async fn head_file(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path((repo_type, namespace, name, rev, path)): Path<(String, String, String, String, String)>,
) -> ApiResult<Response> {
    let repo_type_parsed = parse_repo_type(&repo_type)?;
    let id = RepoId::new(repo_type_parsed, &namespace, &name);
    let repo = state
        .store
        .get_repository(&id)?
        .ok_or_else(|| ApiError(KohakuError::not_found(format!("repository {id}"))))?;
    let principal = state.principal_for(&ctx, &namespace)?;
    if !can_read(&principal, &repo) {
        return Err(ApiError(KohakuError::permission_denied("cannot read this repository")));
    }

    let canonical = canonical_repo_name(repo_type_parsed, &namespace, &name);
    let entry = state
        .vcs
        .stat_object(&canonical, &rev, &path)
        .await?
        .ok_or_else(|| ApiError(KohakuError::not_found(format!("file {path}"))))?;

    Ok((
        [
            (header::CONTENT_LENGTH, entry.size.to_string()),
            (header::ETAG, entry.checksum.clone()),
        ],
        StatusCode::OK,
    )
        .into_response())
}

async fn fall_back_or_404(
    state: &AppState,
    repo_type: kohakuhub_core::repo::RepoType,
    namespace: &str,
    name: &str,
    rev: &str,
    path: &str,
) -> ApiResult<Response> {
    if state.fallback.enabled() {
        if let Some(resolved) = state.fallback.resolve_repo(repo_type, namespace, name).await {
            if let Some(url) = state.fallback.resolve_file_url(&resolved.source_name, repo_type, namespace, name, rev, path) {
                return Ok(Redirect::temporary(&url).into_response());
            }
        }
    }
    Err(ApiError(KohakuError::not_found(format!("{namespace}/{name}/{path}"))))
}
