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

//! External fallback source configuration (C8, spec §3, §4.8).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Huggingface,
    Kohakuhub,
}

/// `(name, url, sourceType, priority, token?, namespace?, enabled)`. Lower
/// priority is probed first. A `namespace`-scoped source only applies to
/// requests for that namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackSource {
    pub name: String,
    pub url: String,
    pub source_type: SourceType,
    pub priority: i32,
    pub token: Option<String>,
    pub namespace: Option<String>,
    pub enabled: bool,
}

impl FallbackSource {
    pub fn applies_to(&self, namespace: &str) -> bool {
        self.enabled
            && self
                .namespace
                .as_deref()
                .map(|ns| ns == namespace)
                .unwrap_or(true)
    }
}

/// `repo-key -> source-id` with a wall-clock TTL (spec §3). Capacity and
/// eviction are the cache implementation's concern (kohakuhub-server); this
/// is the logical row shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackCacheEntry {
    pub repo_key: String,
    pub source_name: String,
    pub cached_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(namespace: Option<&str>) -> FallbackSource {
        FallbackSource {
            name: "hf".into(),
            url: "https://huggingface.co".into(),
            source_type: SourceType::Huggingface,
            priority: 1,
            token: None,
            namespace: namespace.map(String::from),
            enabled: true,
        }
    }

    #[test]
    fn unscoped_source_applies_everywhere() {
        assert!(source(None).applies_to("alice"));
        assert!(source(None).applies_to("bob"));
    }

    #[test]
    fn scoped_source_applies_only_to_its_namespace() {
        let s = source(Some("alice"));
        assert!(s.applies_to("alice"));
        assert!(!s.applies_to("bob"));
    }
}
