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

use std::io::Read as _;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::args::SshKeyAction;
use crate::client::HubClient;

fn read_key_file(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("reading public key from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading public key file {path}"))
    }
}

pub async fn run(client: &HubClient, json_out: bool, action: SshKeyAction) -> Result<()> {
    let response: Value = match action {
        SshKeyAction::Add { key_file } => {
            let key = read_key_file(&key_file)?;
            client.post("/api/user/keys", &json!({ "key": key.trim() })).await?
        }
        SshKeyAction::List => client.get("/api/user/keys").await?,
        SshKeyAction::Remove { fingerprint } => {
            client.delete(&format!("/api/user/keys/{fingerprint}")).await?
        }
    };

    super::print(&response, json_out);
    Ok(())
}
