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

//! Branch/Commit Adapter (C2, spec §4.2).
//!
//! `VcsBackend` is the one interface higher layers (the commit engine, the
//! Git bridge) use to reach the backing version-control service. This
//! crate ships exactly one implementation, `MemoryVcsBackend`, built on the
//! Git object model in [`crate::git`] — the boundary exists so the commit
//! engine and HTTP handlers never depend on how trees and history are
//! actually realized.

pub mod memory;

pub use memory::MemoryVcsBackend;

use async_trait::async_trait;
use kohakuhub_core::error::Result;
use kohakuhub_core::repo::canonical_repo_name;

#[derive(Debug, Clone)]
pub struct StagedObject {
    pub path: String,
    pub physical_address: String,
    pub size: u64,
    pub checksum: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub path: String,
    pub size: u64,
    pub checksum: String,
    pub physical_address: String,
    pub is_lfs: bool,
}

#[derive(Debug, Clone)]
pub struct ObjectPage {
    pub entries: Vec<ObjectEntry>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct CommitRecord {
    pub revision: String,
    pub message: String,
    pub author: CommitAuthor,
    pub parent: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// A pending set of staged writes/deletes for one branch, committed
/// atomically (spec §4.2: "all-or-nothing").
#[derive(Debug, Clone, Default)]
pub struct StagingArea {
    pub puts: Vec<StagedObject>,
    pub deletes: Vec<String>,
}

#[async_trait]
pub trait VcsBackend: Send + Sync {
    async fn create_repo(&self, canonical_name: &str, default_branch: &str) -> Result<()>;

    async fn repo_exists(&self, canonical_name: &str) -> Result<bool>;

    async fn delete_repo(&self, canonical_name: &str) -> Result<()>;

    async fn list_objects(
        &self,
        canonical_name: &str,
        branch: &str,
        prefix: Option<&str>,
        after: Option<&str>,
        amount: u32,
    ) -> Result<ObjectPage>;

    async fn stat_object(&self, canonical_name: &str, branch: &str, path: &str) -> Result<Option<ObjectEntry>>;

    /// Applies `staging` atomically against `branch` and returns the new
    /// revision id. Any staged write that fails validation aborts the whole
    /// commit (spec §4.2).
    async fn commit(
        &self,
        canonical_name: &str,
        branch: &str,
        staging: StagingArea,
        message: &str,
        author: CommitAuthor,
    ) -> Result<String>;

    async fn list_commits(
        &self,
        canonical_name: &str,
        branch: &str,
        after: Option<&str>,
        amount: u32,
    ) -> Result<Vec<CommitRecord>>;

    async fn resolve_branch(&self, canonical_name: &str, branch: &str) -> Result<Option<String>>;

    async fn list_branches(&self, canonical_name: &str) -> Result<Vec<String>>;

    async fn create_branch(&self, canonical_name: &str, branch: &str, from_revision: &str) -> Result<()>;

    /// Moves `branch` to a new commit whose tree equals `target_revision`'s
    /// tree, recorded as a revert rather than a destructive rewrite.
    async fn revert(&self, canonical_name: &str, branch: &str, target_revision: &str, author: CommitAuthor) -> Result<String>;

    /// Force-moves `branch`'s pointer to `target_revision` without creating
    /// a new commit (spec §4.2 `reset`).
    async fn reset(&self, canonical_name: &str, branch: &str, target_revision: &str) -> Result<()>;

    async fn cherry_pick(&self, canonical_name: &str, branch: &str, source_revision: &str, author: CommitAuthor) -> Result<String>;
}

/// Convenience wrapper matching the spec's `createRepo(canonicalName, ...)`
/// call sites that start from the structured repo id rather than the
/// pre-derived name.
pub async fn create_repo_for(
    backend: &dyn VcsBackend,
    repo_type: kohakuhub_core::repo::RepoType,
    namespace: &str,
    name: &str,
) -> Result<String> {
    let canonical = canonical_repo_name(repo_type, namespace, name);
    backend.create_repo(&canonical, "main").await?;
    Ok(canonical)
}
