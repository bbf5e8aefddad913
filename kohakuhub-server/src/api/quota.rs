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

//! Quota Engine (C7, spec §4.7) HTTP surface: `GET /api/quota/{ns}`,
//! `PUT /api/quota/{ns}`, `POST /api/quota/{ns}/recalculate`.

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::Json;
use kohakuhub_core::error::KohakuError;
use kohakuhub_core::namespace::NamespaceKey;
use kohakuhub_core::quota::QuotaLimit;
use kohakuhub_core::repo::{canonical_repo_name, RepoType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct QuotaResponse {
    pub namespace: String,
    pub private_quota_bytes: QuotaLimit,
    pub public_quota_bytes: QuotaLimit,
    pub private_used_bytes: i64,
    pub public_used_bytes: i64,
}

fn require_namespace_admin(state: &AppState, ctx: &AuthContext, namespace: &str) -> ApiResult<()> {
    let principal = state.principal_for(ctx, namespace)?;
    if principal.platform_admin {
        return Ok(());
    }
    if principal.is_self(namespace) {
        return Ok(());
    }
    let has_admin_role = principal
        .role_in(namespace)
        .map(|r| r.at_least(kohakuhub_core::namespace::Role::Admin))
        .unwrap_or(false);
    if has_admin_role {
        return Ok(());
    }
    Err(ApiError(KohakuError::permission_denied("quota management requires namespace admin")))
}

fn resolve_namespace_key(state: &AppState, namespace: &str) -> ApiResult<NamespaceKey> {
    Ok(super::repo_namespace_key(state, namespace)?)
}

pub async fn get_quota(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(namespace): Path<String>,
) -> ApiResult<Json<QuotaResponse>> {
    require_namespace_admin(&state, &ctx, &namespace)?;
    let key = resolve_namespace_key(&state, &namespace)?;
    let ns = state.quota.get(&key)?;
    Ok(Json(QuotaResponse {
        namespace,
        private_quota_bytes: ns.private_quota_bytes,
        public_quota_bytes: ns.public_quota_bytes,
        private_used_bytes: ns.private_used_bytes,
        public_used_bytes: ns.public_used_bytes,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SetQuotaRequest {
    pub private_quota_bytes: QuotaLimit,
    pub public_quota_bytes: QuotaLimit,
}

pub async fn set_quota(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(namespace): Path<String>,
    Json(req): Json<SetQuotaRequest>,
) -> ApiResult<Json<QuotaResponse>> {
    require_namespace_admin(&state, &ctx, &namespace)?;
    let key = resolve_namespace_key(&state, &namespace)?;
    state.quota.set_limits(&key, req.private_quota_bytes, req.public_quota_bytes)?;
    let ns = state.quota.get(&key)?;
    Ok(Json(QuotaResponse {
        namespace,
        private_quota_bytes: ns.private_quota_bytes,
        public_quota_bytes: ns.public_quota_bytes,
        private_used_bytes: ns.private_used_bytes,
        public_used_bytes: ns.public_used_bytes,
    }))
}

/// Recomputes a namespace's counters from the true sum of file sizes
/// across every repository it owns (spec §4.7 `recompute`), correcting
/// any drift accumulated from partial failures.
pub async fn recalculate_quota(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(namespace): Path<String>,
) -> ApiResult<Json<QuotaResponse>> {
    require_namespace_admin(&state, &ctx, &namespace)?;
    let key = resolve_namespace_key(&state, &namespace)?;

    let mut private_total: i64 = 0;
    let mut public_total: i64 = 0;
    for repo_type in [RepoType::Model, RepoType::Dataset, RepoType::Space] {
        for repo in state.store.list_repositories_in_namespace(&namespace, repo_type)? {
            let canonical = canonical_repo_name(repo_type, &namespace, &repo.id.name);
            let mut after = None;
            let mut repo_total: i64 = 0;
            loop {
                let page = state
                    .vcs
                    .list_objects(&canonical, &state.config.storage.default_branch, None, after.as_deref(), 1000)
                    .await?;
                repo_total += page.entries.iter().map(|e| e.size as i64).sum::<i64>();
                if !page.has_more {
                    break;
                }
                after = page.next_cursor;
            }
            if repo.private {
                private_total += repo_total;
            } else {
                public_total += repo_total;
            }
        }
    }

    state.quota.recompute(&key, private_total, public_total)?;
    let ns = state.quota.get(&key)?;
    Ok(Json(QuotaResponse {
        namespace,
        private_quota_bytes: ns.private_quota_bytes,
        public_quota_bytes: ns.public_quota_bytes,
        private_used_bytes: ns.private_used_bytes,
        public_used_bytes: ns.public_used_bytes,
    }))
}
