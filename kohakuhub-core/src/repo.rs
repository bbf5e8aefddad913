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

//! Repositories and the canonical-name derivation consumed by C2 (spec §3, §4.2).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
    Model,
    Dataset,
    Space,
}

impl RepoType {
    pub fn as_str(self) -> &'static str {
        match self {
            RepoType::Model => "model",
            RepoType::Dataset => "dataset",
            RepoType::Space => "space",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            RepoType::Model => "models",
            RepoType::Dataset => "datasets",
            RepoType::Space => "spaces",
        }
    }

    pub fn from_plural(s: &str) -> Option<Self> {
        match s {
            "models" => Some(RepoType::Model),
            "datasets" => Some(RepoType::Dataset),
            "spaces" => Some(RepoType::Space),
            _ => None,
        }
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `type/namespace/name`, the external identifier (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub repo_type: RepoType,
    pub namespace: String,
    pub name: String,
}

impl RepoId {
    pub fn new(repo_type: RepoType, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            repo_type,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// `namespace/name`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repo_type, self.full_name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepoId,
    pub private: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Repository {
    pub fn new(id: RepoId, private: bool) -> Self {
        Self {
            id,
            private,
            created_at: chrono::Utc::now(),
        }
    }
}

/// Derives the backend-safe repo name `hf-{type}-{namespace}-{name}`
/// (spec §4.2): slashes and underscores in namespace/name are collapsed to
/// `-` so the mapping never produces characters the branch/commit backend
/// rejects. One-way but stable and injective given validated inputs.
pub fn canonical_repo_name(repo_type: RepoType, namespace: &str, name: &str) -> String {
    let sanitize = |s: &str| s.replace(['/', '_'], "-");
    format!(
        "hf-{}-{}-{}",
        repo_type.as_str(),
        sanitize(namespace),
        sanitize(name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_name_collapses_separators() {
        assert_eq!(
            canonical_repo_name(RepoType::Model, "alice", "m1"),
            "hf-model-alice-m1"
        );
        assert_eq!(
            canonical_repo_name(RepoType::Dataset, "my_org", "a/b"),
            "hf-dataset-my-org-a-b"
        );
    }

    #[test]
    fn repo_type_plural_round_trips() {
        for t in [RepoType::Model, RepoType::Dataset, RepoType::Space] {
            assert_eq!(RepoType::from_plural(t.plural()), Some(t));
        }
    }

    #[test]
    fn repo_id_full_name() {
        let id = RepoId::new(RepoType::Model, "alice", "m1");
        assert_eq!(id.full_name(), "alice/m1");
    }
}
