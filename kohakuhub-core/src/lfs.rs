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

//! LFS object metadata, per-repo settings, and pointer text (spec §3, §4.5).

use serde::{Deserialize, Serialize};

pub const DEFAULT_THRESHOLD_BYTES: u64 = 5_000_000;
pub const DEFAULT_KEEP_VERSIONS: u32 = 5;
pub const MULTIPART_THRESHOLD_BYTES: u64 = 5 * 1024 * 1024 * 1024; // 5 GiB

/// Content-addressed by `sha256`; mirrored in `LFSObjectHistory` for GC and
/// quota attribution (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LfsObject {
    pub oid: String,
    pub size: u64,
    pub first_seen: chrono::DateTime<chrono::Utc>,
}

/// `lfs/{oid[:2]}/{oid[2:4]}/{oid}` (spec §3, §4.5, §6).
pub fn lfs_key(oid: &str) -> String {
    format!("lfs/{}/{}/{}", &oid[0..2], &oid[2..4], oid)
}

/// Per-repo LFS settings, falling back to server defaults when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LfsSettings {
    pub threshold_bytes: u64,
    pub keep_versions: u32,
    /// Extensions (case-insensitive, leading dot) that are always routed to LFS.
    pub suffix_rules: Vec<String>,
}

impl Default for LfsSettings {
    fn default() -> Self {
        Self {
            threshold_bytes: DEFAULT_THRESHOLD_BYTES,
            keep_versions: DEFAULT_KEEP_VERSIONS,
            suffix_rules: Vec::new(),
        }
    }
}

impl LfsSettings {
    /// `keepVersions < 2` forbids revert; surfaced as a warning rather than
    /// rejected (spec §3, §9 Open Question #3).
    pub fn validate(&self) -> Option<String> {
        if self.keep_versions < 1 {
            return Some("keep_versions must be >= 1".into());
        }
        if self.keep_versions < 2 {
            return Some(
                "keep_versions < 2 disables revert for this repository".into(),
            );
        }
        None
    }

    pub fn matches_suffix(&self, path: &str) -> bool {
        let lower = path.to_ascii_lowercase();
        self.suffix_rules
            .iter()
            .any(|suffix| lower.ends_with(&suffix.to_ascii_lowercase()))
    }

    /// Whether a `file` record of this size, at this path, should instead
    /// be routed through the LFS batch API (spec §4.4).
    pub fn requires_lfs(&self, size: u64, path: &str) -> bool {
        size >= self.threshold_bytes || self.matches_suffix(path)
    }
}

/// The canonical Git-LFS v1 text pointer (spec §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LfsPointer {
    pub oid: String,
    pub size: u64,
}

impl LfsPointer {
    pub fn to_text(&self) -> String {
        format!(
            "version https://git-lfs.github.com/spec/v1\noid sha256:{}\nsize {}\n",
            self.oid, self.size
        )
    }

    pub fn parse(text: &str) -> Option<Self> {
        let mut oid = None;
        let mut size = None;
        for line in text.lines() {
            if let Some(rest) = line.strip_prefix("oid sha256:") {
                oid = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("size ") {
                size = rest.trim().parse::<u64>().ok();
            }
        }
        Some(Self {
            oid: oid?,
            size: size?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lfs_key_layout_matches_spec() {
        let oid = "abcd1234ef00000000000000000000000000000000000000000000000000000000";
        let key = lfs_key(&oid[..64.min(oid.len())]);
        assert!(key.starts_with("lfs/ab/cd/"));
    }

    #[test]
    fn pointer_round_trips() {
        let p = LfsPointer {
            oid: "deadbeef".repeat(8),
            size: 12345,
        };
        let text = p.to_text();
        let parsed = LfsPointer::parse(&text).unwrap();
        assert_eq!(parsed, p);
    }

    #[test]
    fn threshold_and_suffix_routing() {
        let settings = LfsSettings {
            threshold_bytes: 1000,
            keep_versions: 5,
            suffix_rules: vec![".bin".into()],
        };
        assert!(settings.requires_lfs(2000, "small.txt"));
        assert!(settings.requires_lfs(10, "weights.BIN"));
        assert!(!settings.requires_lfs(10, "readme.md"));
    }

    #[test]
    fn keep_versions_below_two_warns_but_does_not_reject() {
        let settings = LfsSettings {
            keep_versions: 1,
            ..Default::default()
        };
        assert!(settings.validate().is_some());
    }
}
