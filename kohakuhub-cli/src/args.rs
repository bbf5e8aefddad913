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

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "kohakuhub", version, about = "KohakuHub admin CLI")]
pub struct Cli {
    /// Base URL of the KohakuHub server.
    #[arg(long, global = true, env = "KOHAKUHUB_URL", default_value = "http://127.0.0.1:28080")]
    pub url: String,

    /// API token used as a bearer credential.
    #[arg(long, global = true, env = "KOHAKUHUB_TOKEN")]
    pub token: Option<String>,

    /// Emit JSON responses verbatim instead of a human-readable summary.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Repository lifecycle operations.
    Repo {
        #[command(subcommand)]
        action: RepoAction,
    },
    /// Namespace storage quota operations.
    Quota {
        #[command(subcommand)]
        action: QuotaAction,
    },
    /// Invitation token operations.
    Invitation {
        #[command(subcommand)]
        action: InvitationAction,
    },
    /// SSH public key registry operations.
    SshKey {
        #[command(subcommand)]
        action: SshKeyAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum RepoAction {
    /// Create a repository.
    Create {
        /// model | dataset | space
        #[arg(long)]
        repo_type: String,
        #[arg(long)]
        namespace: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        private: bool,
    },
    /// Delete a repository and all of its content.
    Delete {
        #[arg(long)]
        repo_type: String,
        #[arg(long)]
        namespace: String,
        #[arg(long)]
        name: String,
    },
    /// Rename/move a repository to a new namespace or name.
    Move {
        #[arg(long)]
        repo_type: String,
        #[arg(long)]
        from_namespace: String,
        #[arg(long)]
        from_name: String,
        #[arg(long)]
        to_namespace: String,
        #[arg(long)]
        to_name: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum QuotaAction {
    /// Show a namespace's quota limits and usage.
    Get {
        #[arg(long)]
        namespace: String,
    },
    /// Set a namespace's quota limits, in bytes (use "unlimited" for no cap).
    Set {
        #[arg(long)]
        namespace: String,
        #[arg(long)]
        private_bytes: String,
        #[arg(long)]
        public_bytes: String,
    },
    /// Recompute a namespace's used-bytes counters from actual content.
    Recalculate {
        #[arg(long)]
        namespace: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum InvitationAction {
    /// Mint an invitation token that joins an org.
    CreateJoinOrg {
        #[arg(long)]
        org_id: String,
        /// owner | admin | write | read
        #[arg(long)]
        role: String,
        #[arg(long, default_value_t = 1)]
        max_usage: i64,
        #[arg(long, default_value_t = 604_800)]
        expires_in_seconds: i64,
        #[arg(long)]
        email: Option<String>,
    },
    /// Mint an invitation token that pre-enrolls a new account.
    CreateRegisterAccount {
        #[arg(long)]
        org_id: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long, default_value_t = 1)]
        max_usage: i64,
        #[arg(long, default_value_t = 604_800)]
        expires_in_seconds: i64,
        #[arg(long)]
        email: Option<String>,
    },
    /// Revoke an invitation token immediately.
    Revoke {
        token: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SshKeyAction {
    /// Register a public key for the authenticated user.
    Add {
        /// Path to a public key file, or "-" to read from stdin.
        #[arg(long)]
        key_file: String,
    },
    /// List the authenticated user's registered keys.
    List,
    /// Remove a registered key by fingerprint.
    Remove {
        fingerprint: String,
    },
}
