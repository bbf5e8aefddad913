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

//! File entries as they appear within one revision (spec §3).

use serde::{Deserialize, Serialize};

/// `(path, size, sha256-or-etag, isLFS)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    /// SHA-256 for LFS files, backend ETag for inline files.
    pub checksum: String,
    pub is_lfs: bool,
}

/// Validates a POSIX-style repo path: case-sensitive, no leading slash, no
/// `..` segments, UTF-8 (guaranteed by `&str`).
pub fn validate_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("path must not be empty".into());
    }
    if path.starts_with('/') {
        return Err(format!("path must not have a leading slash: {path}"));
    }
    if path.split('/').any(|seg| seg == ".." || seg.is_empty()) {
        return Err(format!("path must not contain '..' or empty segments: {path}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_leading_slash_and_dotdot() {
        assert!(validate_path("/a").is_err());
        assert!(validate_path("a/../b").is_err());
        assert!(validate_path("a//b").is_err());
        assert!(validate_path("").is_err());
    }

    #[test]
    fn accepts_normal_paths() {
        assert!(validate_path("README.md").is_ok());
        assert!(validate_path("models/config.json").is_ok());
    }
}
