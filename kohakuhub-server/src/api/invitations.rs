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

//! Invitation Tokens (C11, spec §4.11) HTTP surface:
//! `POST /api/invitations/create`, `POST /api/invitations/{token}/accept`,
//! `DELETE /api/invitations/{token}`.

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::Json;
use kohakuhub_core::error::KohakuError;
use kohakuhub_core::invitation::{Invitation, InvitationAction};
use kohakuhub_core::namespace::{NamespaceKey, Role};
use serde::{Deserialize, Serialize};

fn current_user(ctx: &AuthContext) -> ApiResult<&str> {
    ctx.user.as_deref().ok_or_else(|| ApiError(KohakuError::AuthRequired))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "camelCase")]
pub enum CreateInvitationAction {
    JoinOrg { org_id: String, role: Role },
    RegisterAccount { org_id: Option<String>, role: Option<Role> },
}

#[derive(Debug, Deserialize)]
pub struct CreateInvitationRequest {
    #[serde(flatten)]
    pub action: CreateInvitationAction,
    /// `-1` means unlimited (spec §4.11).
    #[serde(default = "default_max_usage")]
    pub max_usage: i64,
    pub expires_in_seconds: i64,
    pub email: Option<String>,
}

fn default_max_usage() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Only platform admins mint invitations: every action an invitation can
/// redeem (granting org roles, pre-enrolling a new account) is itself a
/// platform-admin-gated capability, so the token must come from one.
pub async fn create_invitation(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateInvitationRequest>,
) -> ApiResult<Json<InvitationResponse>> {
    if !ctx.platform_admin {
        return Err(ApiError(KohakuError::permission_denied("invitations require platform admin")));
    }
    let created_by = current_user(&ctx)?.to_string();

    let action = match req.action {
        CreateInvitationAction::JoinOrg { org_id, role } => InvitationAction::JoinOrg { org_id, role },
        CreateInvitationAction::RegisterAccount { org_id, role } => {
            InvitationAction::RegisterAccount { org_id, role }
        }
    };

    if req.expires_in_seconds <= 0 {
        return Err(ApiError(KohakuError::validation("expiresInSeconds must be positive")));
    }
    if req.max_usage != -1 && req.max_usage < 1 {
        return Err(ApiError(KohakuError::validation("maxUsage must be -1 (unlimited) or >= 1")));
    }

    let invitation = Invitation {
        token: uuid::Uuid::new_v4().to_string(),
        action,
        created_by,
        max_usage: req.max_usage,
        usage_count: 0,
        expires_at: chrono::Utc::now() + chrono::Duration::seconds(req.expires_in_seconds),
        email: req.email,
    };
    state.store.insert_invitation(&invitation)?;

    Ok(Json(InvitationResponse {
        token: invitation.token,
        expires_at: invitation.expires_at,
    }))
}

/// Redeems a token: verify-and-increment is atomic inside
/// `try_redeem_invitation` (a single `UPDATE ... WHERE` guarded by the
/// availability predicate), so two concurrent accepts on a one-shot token
/// can only ever have one winner (spec §4.11, scenario S7).
pub async fn accept_invitation(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(token): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = current_user(&ctx)?.to_string();
    let invitation = state
        .store
        .get_invitation(&token)?
        .ok_or_else(|| ApiError(KohakuError::not_found(format!("invitation {token}"))))?;

    let redeemed = state.store.try_redeem_invitation(&token, chrono::Utc::now())?;
    if !redeemed {
        return Err(ApiError(KohakuError::conflict("invitation has no uses remaining or has expired")));
    }

    match invitation.action {
        InvitationAction::JoinOrg { org_id, role } => {
            state.store.upsert_membership(&org_id, &user, role)?;
        }
        InvitationAction::RegisterAccount { org_id, role } => {
            if state.store.get_namespace(&NamespaceKey::user(&user))?.is_none() {
                state
                    .store
                    .upsert_namespace(&kohakuhub_core::namespace::Namespace::new(NamespaceKey::user(&user)))?;
            }
            if let Some(org_id) = org_id {
                state.store.upsert_membership(&org_id, &user, role.unwrap_or(Role::Member))?;
            }
        }
    }

    Ok(Json(serde_json::json!({ "redeemed": true })))
}

pub async fn revoke_invitation(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(token): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if !ctx.platform_admin {
        return Err(ApiError(KohakuError::permission_denied("invitations require platform admin")));
    }
    let deleted = state.store.delete_invitation(&token)?;
    if !deleted {
        return Err(ApiError(KohakuError::not_found(format!("invitation {token}"))));
    }
    Ok(Json(serde_json::json!({ "revoked": true })))
}
