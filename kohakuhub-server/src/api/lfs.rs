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

//! LFS Subsystem (C5, spec §4.5): the Git-LFS Batch API, plus the
//! `verify` endpoint that finalizes an upload reservation.

use super::{parse_repo_type, repo_namespace_key, strip_dot_git};
use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::Json;
use kohakuhub_core::error::KohakuError;
use kohakuhub_core::lfs::{lfs_key, MULTIPART_THRESHOLD_BYTES};
use kohakuhub_core::permissions::{can_read, can_write};
use kohakuhub_core::repo::RepoId;
use kohakuhub_storage::blobstore::DEFAULT_PRESIGN_TTL;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub operation: String,
    pub objects: Vec<BatchObject>,
    #[serde(rename = "ref")]
    #[serde(default)]
    pub git_ref: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct BatchObject {
    pub oid: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct BatchAction {
    pub href: String,
    #[serde(default)]
    pub header: std::collections::HashMap<String, String>,
    #[serde(rename = "expires_at")]
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Default)]
pub struct BatchActions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<BatchAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<BatchAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify: Option<BatchAction>,
}

#[derive(Debug, Serialize)]
pub struct BatchObjectResponse {
    pub oid: String,
    pub size: u64,
    pub actions: BatchActions,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub objects: Vec<BatchObjectResponse>,
}

pub async fn lfs_batch(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path((repo_type, namespace, name)): Path<(String, String, String)>,
    Json(req): Json<BatchRequest>,
) -> ApiResult<Json<BatchResponse>> {
    let name = strip_dot_git(&name);
    let repo_type = parse_repo_type(&repo_type)?;
    let id = RepoId::new(repo_type, &namespace, &name);
    let repo = state
        .store
        .get_repository(&id)?
        .ok_or_else(|| ApiError(KohakuError::not_found(format!("repository {id}"))))?;
    let principal = state.principal_for(&ctx, &namespace)?;

    let bucket = &state.config.s3.bucket;
    let mut objects = Vec::with_capacity(req.objects.len());

    match req.operation.as_str() {
        "download" => {
            if !can_read(&principal, &repo) {
                return Err(ApiError(KohakuError::permission_denied("cannot download from this repository")));
            }
            for object in req.objects {
                let key = lfs_key(&object.oid);
                let actions = if state.blobs.exists(bucket, &key).await? {
                    let url = state.blobs.presign_download(bucket, &key, DEFAULT_PRESIGN_TTL, None).await?;
                    BatchActions {
                        download: Some(BatchAction {
                            href: url,
                            header: Default::default(),
                            expires_at: chrono::Utc::now() + chrono::Duration::from_std(DEFAULT_PRESIGN_TTL).unwrap(),
                        }),
                        ..Default::default()
                    }
                } else {
                    BatchActions::default()
                };
                objects.push(BatchObjectResponse {
                    oid: object.oid,
                    size: object.size,
                    actions,
                });
            }
        }
        "upload" => {
            if !can_write(&principal, &repo) {
                return Err(ApiError(KohakuError::permission_denied("cannot upload to this repository")));
            }
            let namespace_key = repo_namespace_key(&state, &namespace)?;
            for object in req.objects {
                let key = lfs_key(&object.oid);
                if state.blobs.exists(bucket, &key).await? {
                    objects.push(BatchObjectResponse {
                        oid: object.oid,
                        size: object.size,
                        actions: BatchActions::default(),
                    });
                    continue;
                }

                if !state.quota.admit(&namespace_key, object.size as i64, repo.private)? {
                    return Err(ApiError(KohakuError::QuotaExceeded {
                        namespace: namespace.clone(),
                        requested: object.size as i64,
                        available: state.quota.get(&namespace_key)?.private_quota_bytes.available(
                            state.quota.get(&namespace_key)?.private_used_bytes,
                        ),
                    }));
                }

                let verify_url = format!("/api/{}s/{namespace}/{name}.git/info/lfs/verify", repo_type.as_str());
                let expires_at = chrono::Utc::now() + chrono::Duration::from_std(DEFAULT_PRESIGN_TTL).unwrap();

                let actions = if object.size <= MULTIPART_THRESHOLD_BYTES {
                    let upload = state
                        .blobs
                        .presign_upload(bucket, &key, DEFAULT_PRESIGN_TTL, None, Some(&object.oid))
                        .await?;
                    BatchActions {
                        upload: Some(BatchAction {
                            href: upload.url,
                            header: upload.headers.into_iter().collect(),
                            expires_at,
                        }),
                        verify: Some(BatchAction {
                            href: verify_url,
                            header: Default::default(),
                            expires_at,
                        }),
                        ..Default::default()
                    }
                } else {
                    let part_count = ((object.size + MULTIPART_THRESHOLD_BYTES - 1) / MULTIPART_THRESHOLD_BYTES) as u32;
                    let multipart = state.blobs.multipart_upload(bucket, &key, part_count, DEFAULT_PRESIGN_TTL, None).await?;
                    let mut header = std::collections::HashMap::new();
                    header.insert("x-kohakuhub-upload-id".to_string(), multipart.upload_id);
                    BatchActions {
                        upload: Some(BatchAction {
                            href: multipart.part_urls.first().cloned().unwrap_or_default(),
                            header,
                            expires_at,
                        }),
                        verify: Some(BatchAction {
                            href: verify_url,
                            header: Default::default(),
                            expires_at,
                        }),
                        ..Default::default()
                    }
                };

                objects.push(BatchObjectResponse {
                    oid: object.oid,
                    size: object.size,
                    actions,
                });
            }
        }
        other => return Err(ApiError(KohakuError::validation(format!("unknown LFS operation: {other}")))),
    }

    Ok(Json(BatchResponse { objects }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub oid: String,
    pub size: u64,
}

/// Confirms a previously batched upload actually landed at `lfsKey(oid)`
/// with the claimed size, then applies the quota reservation admitted at
/// batch time (spec §4.5: "on success records `LFSObjectHistory`... on
/// failure cancels the reservation added during batch").
pub async fn lfs_verify(
    State(state): State<AppState>,
    Path((repo_type, namespace, name)): Path<(String, String, String)>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let name = strip_dot_git(&name);
    let repo_type = parse_repo_type(&repo_type)?;
    let id = RepoId::new(repo_type, &namespace, &name);
    let repo = state
        .store
        .get_repository(&id)?
        .ok_or_else(|| ApiError(KohakuError::not_found(format!("repository {id}"))))?;
    let key = lfs_key(&req.oid);
    let bucket = &state.config.s3.bucket;

    let stat = state.blobs.head(bucket, &key).await?;
    let verified = stat.map(|s| s.size == req.size).unwrap_or(false);
    if !verified {
        return Err(ApiError(KohakuError::LfsObjectMissing(req.oid)));
    }

    let already_referenced = state.store.lfs_object_has_other_referrers(&req.oid, &id)?;
    if !already_referenced {
        let namespace_key = repo_namespace_key(&state, &namespace)?;
        state.quota.apply(&namespace_key, req.size as i64, repo.private)?;
    }

    state.store.record_lfs_usage(&req.oid, &id, req.size)?;
    Ok(Json(serde_json::json!({ "verified": true })))
}
