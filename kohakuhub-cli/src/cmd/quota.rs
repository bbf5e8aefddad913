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

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::args::QuotaAction;
use crate::client::HubClient;

/// Parses a CLI-friendly quota string into the wire shape of
/// `kohakuhub_core::quota::QuotaLimit`: `"unlimited"` or a byte count.
fn parse_limit(raw: &str) -> Result<Value> {
    if raw.eq_ignore_ascii_case("unlimited") {
        return Ok(json!("unlimited"));
    }
    let bytes: i64 = raw.parse().context("quota must be \"unlimited\" or a byte count")?;
    Ok(json!({ "bytes": bytes }))
}

pub async fn run(client: &HubClient, json_out: bool, action: QuotaAction) -> Result<()> {
    let response: Value = match action {
        QuotaAction::Get { namespace } => client.get(&format!("/api/quota/{namespace}")).await?,
        QuotaAction::Set {
            namespace,
            private_bytes,
            public_bytes,
        } => {
            let body = json!({
                "private_quota_bytes": parse_limit(&private_bytes)?,
                "public_quota_bytes": parse_limit(&public_bytes)?,
            });
            client.put(&format!("/api/quota/{namespace}"), &body).await?
        }
        QuotaAction::Recalculate { namespace } => {
            client.post(&format!("/api/quota/{namespace}/recalculate"), &json!({})).await?
        }
    };

    super::print(&response, json_out);
    Ok(())
}
