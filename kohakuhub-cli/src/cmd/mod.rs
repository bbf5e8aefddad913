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

use crate::args::{Cli, Command};
use crate::client::HubClient;

mod invitation;
mod quota;
mod repo;
mod ssh_key;

pub async fn dispatch(cli: Cli) -> Result<()> {
    let client = HubClient::new(cli.url.clone(), cli.token.clone());
    match cli.command {
        Command::Repo { action } => repo::run(&client, cli.json, action).await,
        Command::Quota { action } => quota::run(&client, cli.json, action).await,
        Command::Invitation { action } => invitation::run(&client, cli.json, action).await,
        Command::SshKey { action } => ssh_key::run(&client, cli.json, action).await,
    }
}

/// Prints a response either as raw JSON (`--json`) or pretty-printed.
pub(crate) fn print(value: &serde_json::Value, json: bool) {
    if json {
        println!("{value}");
    } else {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
}
