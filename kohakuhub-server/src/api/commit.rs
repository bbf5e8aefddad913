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

//! Commit Engine (C4, spec §4.4): parses the NDJSON commit body, checks
//! write permission and quota admission on the full batch, stages every
//! record, and calls through to one atomic `commit` in C2.

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::Json;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use kohakuhub_core::error::KohakuError;
use kohakuhub_core::ndjson::{parse_commit_body, CommitRecord};
use kohakuhub_core::permissions::can_write;
use kohakuhub_core::repo::{canonical_repo_name, RepoId};
use kohakuhub_core::revision::validate_path;
use kohakuhub_storage::vcs::{CommitAuthor, StagedObject, StagingArea};
use serde::Serialize;

use super::{parse_repo_type, repo_namespace_key};

#[derive(Debug, Serialize)]
pub struct CommitResponse {
    pub revision: String,
}

pub async fn commit(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path((repo_type, namespace, name, branch)): Path<(String, String, String, String)>,
    body: String,
) -> ApiResult<Json<CommitResponse>> {
    let repo_type = parse_repo_type(&repo_type)?;
    let id = RepoId::new(repo_type, &namespace, &name);
    let repo = state
        .store
        .get_repository(&id)?
        .ok_or_else(|| ApiError(KohakuError::not_found(format!("repository {id}"))))?;

    let principal = state.principal_for(&ctx, &namespace)?;
    if !can_write(&principal, &repo) {
        return Err(ApiError(KohakuError::permission_denied("cannot commit to this repository")));
    }
    let user = ctx.user.clone().unwrap_or_else(|| "anonymous".to_string());

    let parsed = parse_commit_body(&body)?;

    let canonical = canonical_repo_name(repo_type, &namespace, &name);
    let mut staging = StagingArea::default();
    let mut net_delta: i64 = 0;

    for record in &parsed.records {
        match record {
            CommitRecord::File(f) => {
                validate_path(&f.path).map_err(KohakuError::validation)?;
                let decoded = STANDARD
                    .decode(&f.content)
                    .map_err(|e| KohakuError::validation(format!("invalid base64 for {}: {e}", f.path)))?;
                let size = decoded.len() as u64;

                if repo_requires_lfs(size, &f.path) {
                    return Err(ApiError(KohakuError::validation(format!(
                        "{} exceeds the inline threshold; upload via /info/lfs/objects/batch instead",
                        f.path
                    ))));
                }

                let key = format!("{canonical}/{}", f.path);
                let previous_size = state
                    .vcs
                    .stat_object(&canonical, &branch, &f.path)
                    .await?
                    .map(|e| e.size as i64)
                    .unwrap_or(0);
                net_delta += size as i64 - previous_size;

                state.blobs.put(&state.config.s3.bucket, &key, decoded, None).await?;
                staging.puts.push(StagedObject {
                    path: f.path.clone(),
                    physical_address: key,
                    size,
                    checksum: None,
                });
            }
            CommitRecord::LfsFile(lf) => {
                validate_path(&lf.path).map_err(KohakuError::validation)?;
                let lfs_key = kohakuhub_core::lfs::lfs_key(&lf.oid);
                if !state.blobs.exists(&state.config.s3.bucket, &lfs_key).await? {
                    return Err(ApiError(KohakuError::LfsObjectMissing(lf.oid.clone())));
                }
                let previous_size = state
                    .vcs
                    .stat_object(&canonical, &branch, &lf.path)
                    .await?
                    .map(|e| e.size as i64)
                    .unwrap_or(0);
                net_delta += lf.size as i64 - previous_size;

                staging.puts.push(StagedObject {
                    path: lf.path.clone(),
                    physical_address: lfs_key,
                    size: lf.size,
                    checksum: Some(lf.oid.clone()),
                });
                state.store.record_lfs_usage(&lf.oid, &id, lf.size)?;
            }
            CommitRecord::DeletedFile(d) => {
                let previous_size = state
                    .vcs
                    .stat_object(&canonical, &branch, &d.path)
                    .await?
                    .map(|e| e.size as i64)
                    .unwrap_or(0);
                net_delta -= previous_size;
                staging.deletes.push(d.path.clone());
            }
            CommitRecord::DeletedFolder(d) => {
                let page = state.vcs.list_objects(&canonical, &branch, Some(&d.path), None, 10_000).await?;
                for entry in page.entries {
                    net_delta -= entry.size as i64;
                    staging.deletes.push(entry.path);
                }
            }
            CommitRecord::Unknown(_) => {}
        }
    }

    let namespace_key = repo_namespace_key(&state, &namespace)?;
    state.quota.admit_and_apply(&namespace_key, net_delta, repo.private)?;

    let author = CommitAuthor {
        name: user.clone(),
        email: format!("{user}@kohakuhub.local"),
    };
    let revision = state
        .vcs
        .commit(&canonical, &branch, staging, &parsed.header.summary, author)
        .await?;

    state.store.insert_commit_log(&kohakuhub_core::commit_log::CommitLogEntry {
        repo: id.to_string(),
        revision: revision.clone(),
        author: user,
        timestamp: chrono::Utc::now(),
        message: parsed.header.summary,
        parent: parsed.header.parent_commit,
    })?;

    Ok(Json(CommitResponse { revision }))
}

fn repo_requires_lfs(size: u64, path: &str) -> bool {
    let settings = kohakuhub_core::lfs::LfsSettings::default();
    settings.requires_lfs(size, path)
}
