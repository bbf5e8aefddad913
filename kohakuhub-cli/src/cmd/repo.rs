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

use anyhow::Result;
use serde_json::{json, Value};

use crate::args::RepoAction;
use crate::client::HubClient;

pub async fn run(client: &HubClient, json_out: bool, action: RepoAction) -> Result<()> {
    let response: Value = match action {
        RepoAction::Create {
            repo_type,
            namespace,
            name,
            private,
        } => {
            client
                .post(
                    "/api/repos/create",
                    &json!({ "type": repo_type, "namespace": namespace, "name": name, "private": private }),
                )
                .await?
        }
        RepoAction::Delete {
            repo_type,
            namespace,
            name,
        } => {
            client
                .delete_with_body(
                    "/api/repos/delete",
                    &json!({ "type": repo_type, "namespace": namespace, "name": name }),
                )
                .await?
        }
        RepoAction::Move {
            repo_type,
            from_namespace,
            from_name,
            to_namespace,
            to_name,
        } => {
            client
                .post(
                    "/api/repos/move",
                    &json!({
                        "type": repo_type,
                        "from_namespace": from_namespace,
                        "from_name": from_name,
                        "to_namespace": to_namespace,
                        "to_name": to_name,
                    }),
                )
                .await?
        }
    };

    super::print(&response, json_out);
    Ok(())
}
