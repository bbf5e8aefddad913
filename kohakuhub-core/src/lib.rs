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

//! KohakuHub Core
//!
//! Domain types shared by the storage and server crates: namespaces,
//! repositories, LFS objects, commit log rows, fallback sources,
//! invitations, SSH keys, and the permission/quota rules that govern them.

pub mod commit_log;
pub mod error;
pub mod fallback;
pub mod invitation;
pub mod lfs;
pub mod ndjson;
pub mod namespace;
pub mod permissions;
pub mod quota;
pub mod repo;
pub mod revision;
pub mod ssh_key;

pub use commit_log::CommitLogEntry;
pub use error::{KohakuError, Result};
pub use fallback::{FallbackCacheEntry, FallbackSource, SourceType};
pub use invitation::{Invitation, InvitationAction};
pub use lfs::{LfsObject, LfsPointer, LfsSettings};
pub use namespace::{Membership, Namespace, NamespaceKey, Role};
pub use permissions::{can_read, can_write, Principal};
pub use quota::{NamespaceQuota, QuotaLimit};
pub use repo::{canonical_repo_name, RepoId, RepoType, Repository};
pub use revision::{validate_path, FileEntry};
pub use ssh_key::{SshAlgorithm, SshKey};
pub use ndjson::{parse_commit_body, CommitHeader, CommitRecord, ParsedCommit};
