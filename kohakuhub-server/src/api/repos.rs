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

//! Repository Model & Permissions (C3, spec §4.3) HTTP handlers:
//! `POST /api/repos/create`, `DELETE /api/repos/delete`,
//! `POST /api/repos/move`, repo/revision/tree info, and branch ops.

use super::parse_repo_type;
use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::Json;
use kohakuhub_core::error::KohakuError;
use kohakuhub_core::permissions::{can_create_in_namespace, can_read, can_write};
use kohakuhub_core::repo::{canonical_repo_name, RepoId};
use kohakuhub_core::Repository;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateRepoRequest {
    #[serde(rename = "type")]
    pub repo_type: String,
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub private: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateRepoResponse {
    pub url: String,
}

pub async fn create_repo(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateRepoRequest>,
) -> ApiResult<Json<CreateRepoResponse>> {
    let repo_type = parse_repo_type(&format!("{}s", req.repo_type))?;
    let principal = state.principal_for(&ctx, &req.namespace)?;

    let namespace_key = if let Some(ns) = state.store.get_namespace(&kohakuhub_core::namespace::NamespaceKey::org(&req.namespace))? {
        ns.key
    } else {
        kohakuhub_core::namespace::NamespaceKey::user(&req.namespace)
    };

    if !can_create_in_namespace(&principal, &req.namespace, namespace_key.is_org) {
        return Err(ApiError(KohakuError::permission_denied("cannot create repos in this namespace")));
    }

    let id = RepoId::new(repo_type, &req.namespace, &req.name);
    if state.store.get_repository(&id)?.is_some() {
        return Err(ApiError(KohakuError::conflict(format!("repository {id} already exists"))));
    }

    let canonical = canonical_repo_name(repo_type, &req.namespace, &req.name);
    state.vcs.create_repo(&canonical, &state.config.storage.default_branch).await?;

    let repo = Repository::new(id.clone(), req.private);
    state.store.insert_repository(&repo)?;

    Ok(Json(CreateRepoResponse {
        url: format!("/{}/{}", repo_type.plural(), id.full_name()),
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeleteRepoRequest {
    #[serde(rename = "type")]
    pub repo_type: String,
    pub namespace: String,
    pub name: String,
}

pub async fn delete_repo(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<DeleteRepoRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let repo_type = parse_repo_type(&format!("{}s", req.repo_type))?;
    let id = RepoId::new(repo_type, &req.namespace, &req.name);
    let repo = state
        .store
        .get_repository(&id)?
        .ok_or_else(|| ApiError(KohakuError::not_found(format!("repository {id}"))))?;

    let principal = state.principal_for(&ctx, &req.namespace)?;
    if !can_write(&principal, &repo) {
        return Err(ApiError(KohakuError::permission_denied("cannot delete this repository")));
    }

    let canonical = canonical_repo_name(repo_type, &req.namespace, &req.name);
    state.vcs.delete_repo(&canonical).await?;
    state.blobs.delete_prefix(&state.config.s3.bucket, &format!("{canonical}/")).await?;
    state.store.delete_repository(&id)?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct MoveRepoRequest {
    #[serde(rename = "type")]
    pub repo_type: String,
    pub from_namespace: String,
    pub from_name: String,
    pub to_namespace: String,
    pub to_name: String,
}

/// `POST /api/repos/move`: renames a repository's identity. The backend
/// repo itself is recreated under the new canonical name because
/// `canonical_repo_name` derives deterministically from namespace/name;
/// blob content is copied under the new prefix (spec §4.1 `copyPrefix`,
/// scenario S6).
pub async fn move_repo(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<MoveRepoRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let repo_type = parse_repo_type(&format!("{}s", req.repo_type))?;
    let from_id = RepoId::new(repo_type, &req.from_namespace, &req.from_name);
    let repo = state
        .store
        .get_repository(&from_id)?
        .ok_or_else(|| ApiError(KohakuError::not_found(format!("repository {from_id}"))))?;

    let principal = state.principal_for(&ctx, &req.from_namespace)?;
    if !can_write(&principal, &repo) {
        return Err(ApiError(KohakuError::permission_denied("cannot move this repository")));
    }

    let to_id = RepoId::new(repo_type, &req.to_namespace, &req.to_name);
    if state.store.get_repository(&to_id)?.is_some() {
        return Err(ApiError(KohakuError::conflict(format!("repository {to_id} already exists"))));
    }

    let from_canonical = canonical_repo_name(repo_type, &req.from_namespace, &req.from_name);
    let to_canonical = canonical_repo_name(repo_type, &req.to_namespace, &req.to_name);

    state.vcs.create_repo(&to_canonical, &state.config.storage.default_branch).await?;
    state
        .blobs
        .copy_prefix(&state.config.s3.bucket, &format!("{from_canonical}/"), &format!("{to_canonical}/"), None)
        .await?;
    state.vcs.delete_repo(&from_canonical).await?;
    state.blobs.delete_prefix(&state.config.s3.bucket, &format!("{from_canonical}/")).await?;

    state.store.delete_repository(&from_id)?;
    let mut moved = Repository::new(to_id, repo.private);
    moved.created_at = repo.created_at;
    state.store.insert_repository(&moved)?;

    Ok(Json(serde_json::json!({ "moved": true })))
}

#[derive(Debug, Serialize)]
pub struct RepoInfoResponse {
    pub id: String,
    pub private: bool,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub async fn repo_info(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path((repo_type, namespace, name)): Path<(String, String, String)>,
) -> ApiResult<Json<RepoInfoResponse>> {
    let repo_type = parse_repo_type(&repo_type)?;
    let id = RepoId::new(repo_type, &namespace, &name);
    let repo = state
        .store
        .get_repository(&id)?
        .ok_or_else(|| ApiError(KohakuError::not_found(format!("repository {id}"))))?;

    let principal = state.principal_for(&ctx, &namespace)?;
    if !can_read(&principal, &repo) {
        return Err(ApiError(KohakuError::permission_denied("cannot read this repository")));
    }

    Ok(Json(RepoInfoResponse {
        id: repo.id.to_string(),
        private: repo.private,
        created_at: repo.created_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default = "default_tree_page")]
    pub amount: u32,
}

fn default_tree_page() -> u32 {
    1000
}

#[derive(Debug, Serialize)]
pub struct TreeEntryResponse {
    pub path: String,
    pub size: u64,
    pub checksum: String,
    #[serde(rename = "isLfs")]
    pub is_lfs: bool,
}

#[derive(Debug, Serialize)]
pub struct TreeResponse {
    pub entries: Vec<TreeEntryResponse>,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<String>,
}

pub async fn tree_listing(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path((repo_type, namespace, name, rev)): Path<(String, String, String, String)>,
    axum::extract::Query(query): axum::extract::Query<TreeQuery>,
) -> ApiResult<Json<TreeResponse>> {
    let repo_type = parse_repo_type(&repo_type)?;
    let id = RepoId::new(repo_type, &namespace, &name);
    let repo = state
        .store
        .get_repository(&id)?
        .ok_or_else(|| ApiError(KohakuError::not_found(format!("repository {id}"))))?;

    let principal = state.principal_for(&ctx, &namespace)?;
    if !can_read(&principal, &repo) {
        return Err(ApiError(KohakuError::permission_denied("cannot read this repository")));
    }

    let canonical = canonical_repo_name(repo_type, &namespace, &name);
    let page = state
        .vcs
        .list_objects(&canonical, &rev, query.prefix.as_deref(), query.after.as_deref(), query.amount)
        .await?;

    Ok(Json(TreeResponse {
        entries: page
            .entries
            .into_iter()
            .map(|e| TreeEntryResponse {
                path: e.path,
                size: e.size,
                checksum: e.checksum,
                is_lfs: e.is_lfs,
            })
            .collect(),
        has_more: page.has_more,
        next_cursor: page.next_cursor,
    }))
}

#[derive(Debug, Serialize)]
pub struct RevisionResponse {
    pub revision: String,
    pub message: String,
    pub author: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub parent: Option<String>,
}

pub async fn revision_info(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path((repo_type, namespace, name, rev)): Path<(String, String, String, String)>,
) -> ApiResult<Json<RevisionResponse>> {
    let repo_type = parse_repo_type(&repo_type)?;
    let id = RepoId::new(repo_type, &namespace, &name);
    let repo = state
        .store
        .get_repository(&id)?
        .ok_or_else(|| ApiError(KohakuError::not_found(format!("repository {id}"))))?;

    let principal = state.principal_for(&ctx, &namespace)?;
    if !can_read(&principal, &repo) {
        return Err(ApiError(KohakuError::permission_denied("cannot read this repository")));
    }

    let canonical = canonical_repo_name(repo_type, &namespace, &name);
    let resolved = state
        .vcs
        .resolve_branch(&canonical, &rev)
        .await?
        .unwrap_or_else(|| rev.clone());
    let commits = state.vcs.list_commits(&canonical, &rev, None, 1).await?;
    let latest = commits
        .into_iter()
        .find(|c| c.revision == resolved)
        .ok_or_else(|| ApiError(KohakuError::not_found(format!("revision {rev}"))))?;

    Ok(Json(RevisionResponse {
        revision: latest.revision,
        message: latest.message,
        author: latest.author.name,
        timestamp: latest.timestamp,
        parent: latest.parent,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateBranchRequest {
    #[serde(rename = "type")]
    pub repo_type: String,
    pub namespace: String,
    pub name: String,
    pub branch: String,
    pub from_revision: String,
}

pub async fn create_branch(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateBranchRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let repo_type = parse_repo_type(&format!("{}s", req.repo_type))?;
    let id = RepoId::new(repo_type, &req.namespace, &req.name);
    let repo = state
        .store
        .get_repository(&id)?
        .ok_or_else(|| ApiError(KohakuError::not_found(format!("repository {id}"))))?;
    let principal = state.principal_for(&ctx, &req.namespace)?;
    if !can_write(&principal, &repo) {
        return Err(ApiError(KohakuError::permission_denied("cannot branch this repository")));
    }
    let canonical = canonical_repo_name(repo_type, &req.namespace, &req.name);
    state.vcs.create_branch(&canonical, &req.branch, &req.from_revision).await?;
    Ok(Json(serde_json::json!({ "created": true })))
}

#[derive(Debug, Deserialize)]
pub struct ResetBranchRequest {
    #[serde(rename = "type")]
    pub repo_type: String,
    pub namespace: String,
    pub name: String,
    pub branch: String,
    pub target_revision: String,
}

pub async fn reset_branch(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<ResetBranchRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let repo_type = parse_repo_type(&format!("{}s", req.repo_type))?;
    let id = RepoId::new(repo_type, &req.namespace, &req.name);
    let repo = state
        .store
        .get_repository(&id)?
        .ok_or_else(|| ApiError(KohakuError::not_found(format!("repository {id}"))))?;
    let principal = state.principal_for(&ctx, &req.namespace)?;
    if !can_write(&principal, &repo) {
        return Err(ApiError(KohakuError::permission_denied("cannot reset this repository")));
    }
    let canonical = canonical_repo_name(repo_type, &req.namespace, &req.name);
    state.vcs.reset(&canonical, &req.branch, &req.target_revision).await?;
    Ok(Json(serde_json::json!({ "reset": true })))
}

#[derive(Debug, Deserialize)]
pub struct SetVisibilityRequest {
    #[serde(rename = "type")]
    pub repo_type: String,
    pub namespace: String,
    pub name: String,
    pub private: bool,
}

/// Flips a repo's visibility and moves its used bytes between the
/// namespace's private/public counters atomically (spec §4.3, §4.7).
pub async fn set_visibility(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<SetVisibilityRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let repo_type = parse_repo_type(&format!("{}s", req.repo_type))?;
    let id = RepoId::new(repo_type, &req.namespace, &req.name);
    let repo = state
        .store
        .get_repository(&id)?
        .ok_or_else(|| ApiError(KohakuError::not_found(format!("repository {id}"))))?;
    let principal = state.principal_for(&ctx, &req.namespace)?;
    if !can_write(&principal, &repo) {
        return Err(ApiError(KohakuError::permission_denied("cannot change visibility")));
    }

    if repo.private != req.private {
        let canonical = canonical_repo_name(repo_type, &req.namespace, &req.name);
        let mut total_bytes: i64 = 0;
        let mut after = None;
        loop {
            let page = state.vcs.list_objects(&canonical, &state.config.storage.default_branch, None, after.as_deref(), 1000).await?;
            total_bytes += page.entries.iter().map(|e| e.size as i64).sum::<i64>();
            if !page.has_more {
                break;
            }
            after = page.next_cursor;
        }
        let is_org = state
            .store
            .get_namespace(&kohakuhub_core::namespace::NamespaceKey::org(&req.namespace))?
            .is_some();
        let namespace_key = kohakuhub_core::namespace::NamespaceKey { name: req.namespace.clone(), is_org };
        state.quota.move_visibility(&namespace_key, total_bytes, req.private)?;
    }

    state.store.set_repository_visibility(&id, req.private)?;
    Ok(Json(serde_json::json!({ "private": req.private })))
}
