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

use anyhow::{bail, Result};
use serde_json::{json, Value};

use crate::args::InvitationAction;
use crate::client::HubClient;

/// Matches `kohakuhub_core::namespace::Role`'s plain (non-renamed) variant
/// names, case-insensitively, so `--role admin` and `--role Admin` both work.
fn parse_role(raw: &str) -> Result<&'static str> {
    Ok(match raw.to_ascii_lowercase().as_str() {
        "visitor" => "Visitor",
        "member" => "Member",
        "admin" => "Admin",
        "super_admin" | "superadmin" | "super-admin" => "SuperAdmin",
        other => bail!("unknown role: {other} (expected visitor, member, admin, or super_admin)"),
    })
}

pub async fn run(client: &HubClient, json_out: bool, action: InvitationAction) -> Result<()> {
    let response: Value = match action {
        InvitationAction::CreateJoinOrg {
            org_id,
            role,
            max_usage,
            expires_in_seconds,
            email,
        } => {
            let body = json!({
                "action": "joinOrg",
                "params": { "orgId": org_id, "role": parse_role(&role)? },
                "max_usage": max_usage,
                "expires_in_seconds": expires_in_seconds,
                "email": email,
            });
            client.post("/api/invitations/create", &body).await?
        }
        InvitationAction::CreateRegisterAccount {
            org_id,
            role,
            max_usage,
            expires_in_seconds,
            email,
        } => {
            let role = role.as_deref().map(parse_role).transpose()?;
            let body = json!({
                "action": "registerAccount",
                "params": { "orgId": org_id, "role": role },
                "max_usage": max_usage,
                "expires_in_seconds": expires_in_seconds,
                "email": email,
            });
            client.post("/api/invitations/create", &body).await?
        }
        InvitationAction::Revoke { token } => client.delete(&format!("/api/invitations/{token}")).await?,
    };

    super::print(&response, json_out);
    Ok(())
}
