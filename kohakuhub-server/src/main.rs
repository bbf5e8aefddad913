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
use clap::Parser;
use kohakuhub_server::{config::ServerConfig, run_server};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides config file)
    #[arg(long, env = "KOHAKUHUB_HTTP_ADDR")]
    http_addr: Option<String>,

    /// sqlite metadata database path (overrides config file)
    #[arg(long, env = "KOHAKUHUB_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Run every request as the platform admin, no credentials required
    #[arg(long, env = "KOHAKUHUB_AUTH_DISABLED")]
    auth_disabled: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::load(args.config)?;

    if let Some(addr) = args.http_addr {
        config.server.listen_addr = addr;
    }
    if let Some(db_path) = args.db_path {
        config.storage.db_path = db_path;
    }
    if args.auth_disabled {
        config.auth.disabled = true;
    }

    run_server(config).await
}
