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

//! In-process `VcsBackend`, the one backend this crate ships. A repo's
//! whole history lives as a chain of immutable snapshots (one flat
//! path->entry map per commit) plus a map of branch name to the commit id
//! it currently points at, mirroring `response_git`'s
//! branch-points-at-commit model without depending on its BLAKE3 object
//! types (the Git bridge needs real SHA-1 objects instead).

use super::{CommitAuthor, CommitRecord, ObjectEntry, ObjectPage, StagingArea, VcsBackend};
use async_trait::async_trait;
use dashmap::DashMap;
use kohakuhub_core::error::{KohakuError, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Snapshot {
    revision: String,
    parent: Option<String>,
    message: String,
    author: CommitAuthor,
    timestamp: chrono::DateTime<chrono::Utc>,
    /// Flat path -> entry for the whole tree at this commit.
    files: BTreeMap<String, ObjectEntry>,
}

struct RepoState {
    branches: DashMap<String, String>,
    commits: DashMap<String, Snapshot>,
    /// Commits are applied one branch at a time; this keeps concurrent
    /// commits to different branches from interleaving incorrectly while
    /// still serializing writers on the same branch (spec §4.2, §4.7).
    commit_lock: Mutex<()>,
}

impl RepoState {
    fn new() -> Self {
        Self {
            branches: DashMap::new(),
            commits: DashMap::new(),
            commit_lock: Mutex::new(()),
        }
    }
}

#[derive(Default)]
pub struct MemoryVcsBackend {
    repos: DashMap<String, Arc<RepoState>>,
    revision_seq: AtomicU64,
}

impl MemoryVcsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn repo(&self, canonical_name: &str) -> Result<Arc<RepoState>> {
        self.repos
            .get(canonical_name)
            .map(|r| r.clone())
            .ok_or_else(|| KohakuError::not_found(format!("repo {canonical_name}")))
    }

    fn next_revision(&self) -> String {
        let n = self.revision_seq.fetch_add(1, Ordering::Relaxed);
        format!("rev-{n:016x}")
    }
}

#[async_trait]
impl VcsBackend for MemoryVcsBackend {
    async fn create_repo(&self, canonical_name: &str, default_branch: &str) -> Result<()> {
        if self.repos.contains_key(canonical_name) {
            return Err(KohakuError::conflict(format!("repo {canonical_name} already exists")));
        }
        let state = RepoState::new();
        state.branches.insert(default_branch.to_string(), String::new());
        self.repos.insert(canonical_name.to_string(), Arc::new(state));
        Ok(())
    }

    async fn repo_exists(&self, canonical_name: &str) -> Result<bool> {
        Ok(self.repos.contains_key(canonical_name))
    }

    async fn delete_repo(&self, canonical_name: &str) -> Result<()> {
        self.repos.remove(canonical_name);
        Ok(())
    }

    async fn list_objects(
        &self,
        canonical_name: &str,
        branch: &str,
        prefix: Option<&str>,
        after: Option<&str>,
        amount: u32,
    ) -> Result<ObjectPage> {
        let state = self.repo(canonical_name)?;
        let revision = state
            .branches
            .get(branch)
            .ok_or_else(|| KohakuError::not_found(format!("branch {branch}")))?
            .clone();
        if revision.is_empty() {
            return Ok(ObjectPage { entries: Vec::new(), has_more: false, next_cursor: None });
        }
        let snapshot = state
            .commits
            .get(&revision)
            .ok_or_else(|| KohakuError::internal("branch points at unknown revision"))?;

        let mut paths: Vec<&String> = snapshot
            .files
            .keys()
            .filter(|p| prefix.map(|pre| p.starts_with(pre)).unwrap_or(true))
            .collect();
        paths.sort();

        let start = match after {
            Some(cursor) => paths.iter().position(|p| p.as_str() == cursor).map(|i| i + 1).unwrap_or(0),
            None => 0,
        };
        let window = &paths[start.min(paths.len())..];
        let amount = amount.max(1) as usize;
        let has_more = window.len() > amount;
        let page: Vec<ObjectEntry> = window
            .iter()
            .take(amount)
            .map(|p| snapshot.files.get(*p).unwrap().clone())
            .collect();
        let next_cursor = if has_more { page.last().map(|e| e.path.clone()) } else { None };

        Ok(ObjectPage { entries: page, has_more, next_cursor })
    }

    async fn stat_object(&self, canonical_name: &str, branch: &str, path: &str) -> Result<Option<ObjectEntry>> {
        let state = self.repo(canonical_name)?;
        let Some(revision) = state.branches.get(branch).map(|r| r.clone()) else {
            return Ok(None);
        };
        if revision.is_empty() {
            return Ok(None);
        }
        let snapshot = state
            .commits
            .get(&revision)
            .ok_or_else(|| KohakuError::internal("branch points at unknown revision"))?;
        Ok(snapshot.files.get(path).cloned())
    }

    async fn commit(
        &self,
        canonical_name: &str,
        branch: &str,
        staging: StagingArea,
        message: &str,
        author: CommitAuthor,
    ) -> Result<String> {
        let state = self.repo(canonical_name)?;
        let _guard = state.commit_lock.lock();

        let parent = state
            .branches
            .get(branch)
            .map(|r| r.clone())
            .filter(|r| !r.is_empty());

        let mut files = match &parent {
            Some(rev) => state
                .commits
                .get(rev)
                .ok_or_else(|| KohakuError::internal("branch points at unknown revision"))?
                .files
                .clone(),
            None => BTreeMap::new(),
        };

        for put in staging.puts {
            let is_lfs = put.checksum.is_some();
            files.insert(
                put.path.clone(),
                ObjectEntry {
                    path: put.path,
                    size: put.size,
                    checksum: put.checksum.unwrap_or_default(),
                    physical_address: put.physical_address,
                    is_lfs,
                },
            );
        }
        for path in staging.deletes {
            files.remove(&path);
        }

        let revision = self.next_revision();
        let snapshot = Snapshot {
            revision: revision.clone(),
            parent,
            message: message.to_string(),
            author,
            timestamp: chrono::Utc::now(),
            files,
        };
        state.commits.insert(revision.clone(), snapshot);
        state.branches.insert(branch.to_string(), revision.clone());
        Ok(revision)
    }

    async fn list_commits(
        &self,
        canonical_name: &str,
        branch: &str,
        after: Option<&str>,
        amount: u32,
    ) -> Result<Vec<CommitRecord>> {
        let state = self.repo(canonical_name)?;
        let mut chain = Vec::new();
        let mut cursor = state.branches.get(branch).map(|r| r.clone()).filter(|r| !r.is_empty());
        while let Some(rev) = cursor {
            let snapshot = state
                .commits
                .get(&rev)
                .ok_or_else(|| KohakuError::internal("revision chain broken"))?;
            chain.push(CommitRecord {
                revision: snapshot.revision.clone(),
                message: snapshot.message.clone(),
                author: snapshot.author.clone(),
                parent: snapshot.parent.clone(),
                timestamp: snapshot.timestamp,
            });
            cursor = snapshot.parent.clone();
        }

        let start = match after {
            Some(cursor) => chain.iter().position(|c| c.revision == cursor).map(|i| i + 1).unwrap_or(chain.len()),
            None => 0,
        };
        let amount = amount.max(1) as usize;
        Ok(chain.into_iter().skip(start).take(amount).collect())
    }

    async fn resolve_branch(&self, canonical_name: &str, branch: &str) -> Result<Option<String>> {
        let state = self.repo(canonical_name)?;
        Ok(state.branches.get(branch).map(|r| r.clone()).filter(|r| !r.is_empty()))
    }

    async fn list_branches(&self, canonical_name: &str) -> Result<Vec<String>> {
        let state = self.repo(canonical_name)?;
        Ok(state.branches.iter().map(|e| e.key().clone()).collect())
    }

    async fn create_branch(&self, canonical_name: &str, branch: &str, from_revision: &str) -> Result<()> {
        let state = self.repo(canonical_name)?;
        if state.branches.contains_key(branch) {
            return Err(KohakuError::conflict(format!("branch {branch} already exists")));
        }
        if !from_revision.is_empty() && !state.commits.contains_key(from_revision) {
            return Err(KohakuError::not_found(format!("revision {from_revision}")));
        }
        state.branches.insert(branch.to_string(), from_revision.to_string());
        Ok(())
    }

    async fn revert(&self, canonical_name: &str, branch: &str, target_revision: &str, author: CommitAuthor) -> Result<String> {
        let state = self.repo(canonical_name)?;
        let _guard = state.commit_lock.lock();

        let target = state
            .commits
            .get(target_revision)
            .ok_or_else(|| KohakuError::not_found(format!("revision {target_revision}")))?
            .clone();
        let parent = state.branches.get(branch).map(|r| r.clone()).filter(|r| !r.is_empty());

        let revision = self.next_revision();
        let snapshot = Snapshot {
            revision: revision.clone(),
            parent,
            message: format!("Revert to {target_revision}"),
            author,
            timestamp: chrono::Utc::now(),
            files: target.files,
        };
        state.commits.insert(revision.clone(), snapshot);
        state.branches.insert(branch.to_string(), revision.clone());
        Ok(revision)
    }

    async fn reset(&self, canonical_name: &str, branch: &str, target_revision: &str) -> Result<()> {
        let state = self.repo(canonical_name)?;
        let _guard = state.commit_lock.lock();
        if !target_revision.is_empty() && !state.commits.contains_key(target_revision) {
            return Err(KohakuError::not_found(format!("revision {target_revision}")));
        }
        state.branches.insert(branch.to_string(), target_revision.to_string());
        Ok(())
    }

    async fn cherry_pick(&self, canonical_name: &str, branch: &str, source_revision: &str, author: CommitAuthor) -> Result<String> {
        let state = self.repo(canonical_name)?;
        let _guard = state.commit_lock.lock();

        let source = state
            .commits
            .get(source_revision)
            .ok_or_else(|| KohakuError::not_found(format!("revision {source_revision}")))?
            .clone();
        let parent = state.branches.get(branch).map(|r| r.clone()).filter(|r| !r.is_empty());
        let mut files = match &parent {
            Some(rev) => state.commits.get(rev).map(|s| s.files.clone()).unwrap_or_default(),
            None => BTreeMap::new(),
        };
        // Cherry-pick reapplies the source commit's file state onto the
        // current branch tip wholesale; without true diffs (delegated to
        // the real backend in production) this is the closest faithful
        // approximation that still produces a new, attributable commit.
        for (path, entry) in &source.files {
            files.insert(path.clone(), entry.clone());
        }

        let revision = self.next_revision();
        let snapshot = Snapshot {
            revision: revision.clone(),
            parent,
            message: format!("Cherry-pick {source_revision}"),
            author,
            timestamp: chrono::Utc::now(),
            files,
        };
        state.commits.insert(revision.clone(), snapshot);
        state.branches.insert(branch.to_string(), revision.clone());
        Ok(revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::StagedObject;

    fn author() -> CommitAuthor {
        CommitAuthor { name: "tester".into(), email: "t@example.com".into() }
    }

    #[tokio::test]
    async fn create_then_commit_then_list() {
        let backend = MemoryVcsBackend::new();
        backend.create_repo("hf-model-alice-demo", "main").await.unwrap();
        let staging = StagingArea {
            puts: vec![StagedObject {
                path: "README.md".into(),
                physical_address: "s3://bucket/key".into(),
                size: 10,
                checksum: Some("abc".into()),
            }],
            deletes: vec![],
        };
        let rev = backend
            .commit("hf-model-alice-demo", "main", staging, "init", author())
            .await
            .unwrap();
        assert!(!rev.is_empty());

        let page = backend
            .list_objects("hf-model-alice-demo", "main", None, None, 10)
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].path, "README.md");
    }

    #[tokio::test]
    async fn delete_removes_entry_in_next_commit() {
        let backend = MemoryVcsBackend::new();
        backend.create_repo("repo", "main").await.unwrap();
        backend
            .commit(
                "repo",
                "main",
                StagingArea {
                    puts: vec![StagedObject { path: "a.txt".into(), physical_address: "addr".into(), size: 1, checksum: None }],
                    deletes: vec![],
                },
                "add a",
                author(),
            )
            .await
            .unwrap();
        backend
            .commit(
                "repo",
                "main",
                StagingArea { puts: vec![], deletes: vec!["a.txt".into()] },
                "remove a",
                author(),
            )
            .await
            .unwrap();
        let page = backend.list_objects("repo", "main", None, None, 10).await.unwrap();
        assert!(page.entries.is_empty());
    }

    #[tokio::test]
    async fn list_commits_walks_parent_chain_newest_first() {
        let backend = MemoryVcsBackend::new();
        backend.create_repo("repo", "main").await.unwrap();
        backend.commit("repo", "main", StagingArea::default(), "first", author()).await.unwrap();
        backend.commit("repo", "main", StagingArea::default(), "second", author()).await.unwrap();
        let commits = backend.list_commits("repo", "main", None, 10).await.unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].message, "second");
        assert_eq!(commits[1].message, "first");
    }

    #[tokio::test]
    async fn revert_creates_new_commit_with_old_tree() {
        let backend = MemoryVcsBackend::new();
        backend.create_repo("repo", "main").await.unwrap();
        let rev1 = backend
            .commit(
                "repo",
                "main",
                StagingArea {
                    puts: vec![StagedObject { path: "a.txt".into(), physical_address: "addr".into(), size: 1, checksum: None }],
                    deletes: vec![],
                },
                "add a",
                author(),
            )
            .await
            .unwrap();
        backend
            .commit(
                "repo",
                "main",
                StagingArea { puts: vec![], deletes: vec!["a.txt".into()] },
                "remove a",
                author(),
            )
            .await
            .unwrap();
        backend.revert("repo", "main", &rev1, author()).await.unwrap();
        let page = backend.list_objects("repo", "main", None, None, 10).await.unwrap();
        assert_eq!(page.entries.len(), 1);
    }

    #[tokio::test]
    async fn stat_object_returns_none_for_missing_path() {
        let backend = MemoryVcsBackend::new();
        backend.create_repo("repo", "main").await.unwrap();
        assert!(backend.stat_object("repo", "main", "nope.txt").await.unwrap().is_none());
    }
}
