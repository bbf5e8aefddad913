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

//! Parser for the NDJSON commit body (C4, spec §4.4, §6).
//!
//! One `header` record, then any number of `file` / `lfsFile` /
//! `deletedFile` / `deletedFolder` records. Unknown `key`s are ignored for
//! forward compatibility; a known key with a missing required field is a
//! `ValidationError` (spec §6, §9).

use crate::error::KohakuError;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CommitHeader {
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_commit: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileRecord {
    pub path: String,
    /// Currently only `"base64"` is accepted, matching the HF contract.
    #[serde(default = "default_encoding")]
    pub encoding: String,
    pub content: String,
}

fn default_encoding() -> String {
    "base64".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LfsFileRecord {
    pub path: String,
    pub oid: String,
    pub size: u64,
    #[serde(default = "default_algo")]
    pub algo: String,
}

fn default_algo() -> String {
    "sha256".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeletedFileRecord {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeletedFolderRecord {
    pub path: String,
}

#[derive(Debug, Clone)]
pub enum CommitRecord {
    File(FileRecord),
    LfsFile(LfsFileRecord),
    DeletedFile(DeletedFileRecord),
    DeletedFolder(DeletedFolderRecord),
    /// A recognized-but-not-acted-on key, tolerated for forward compatibility.
    Unknown(String),
}

#[derive(Debug, Clone)]
pub struct ParsedCommit {
    pub header: CommitHeader,
    pub records: Vec<CommitRecord>,
}

#[derive(Deserialize)]
struct RawLine {
    key: String,
    value: serde_json::Value,
}

/// Parses the whole NDJSON body up front and rejects on malformed payload
/// before any mutation happens (spec §4.4 step 1).
pub fn parse_commit_body(body: &str) -> Result<ParsedCommit, KohakuError> {
    let mut lines = body.lines().filter(|l| !l.trim().is_empty());

    let first = lines
        .next()
        .ok_or_else(|| KohakuError::validation("empty commit body"))?;
    let first: RawLine = serde_json::from_str(first)
        .map_err(|e| KohakuError::validation(format!("malformed header line: {e}")))?;
    if first.key != "header" {
        return Err(KohakuError::validation(
            "first NDJSON line must have key \"header\"",
        ));
    }
    let header: CommitHeader = serde_json::from_value(first.value)
        .map_err(|e| KohakuError::validation(format!("invalid header: {e}")))?;

    let mut records = Vec::new();
    for (i, line) in lines.enumerate() {
        let raw: RawLine = serde_json::from_str(line)
            .map_err(|e| KohakuError::validation(format!("malformed record at line {}: {e}", i + 2)))?;
        let record = match raw.key.as_str() {
            "file" => CommitRecord::File(
                serde_json::from_value(raw.value)
                    .map_err(|e| KohakuError::validation(format!("invalid file record: {e}")))?,
            ),
            "lfsFile" => CommitRecord::LfsFile(
                serde_json::from_value(raw.value)
                    .map_err(|e| KohakuError::validation(format!("invalid lfsFile record: {e}")))?,
            ),
            "deletedFile" => CommitRecord::DeletedFile(
                serde_json::from_value(raw.value)
                    .map_err(|e| KohakuError::validation(format!("invalid deletedFile record: {e}")))?,
            ),
            "deletedFolder" => CommitRecord::DeletedFolder(
                serde_json::from_value(raw.value)
                    .map_err(|e| KohakuError::validation(format!("invalid deletedFolder record: {e}")))?,
            ),
            other => CommitRecord::Unknown(other.to_string()),
        };
        records.push(record);
    }

    Ok(ParsedCommit { header, records })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_file_record() {
        let body = r#"{"key":"header","value":{"summary":"init"}}
{"key":"file","value":{"path":"README.md","encoding":"base64","content":"IyBoaQ=="}}"#;
        let parsed = parse_commit_body(body).unwrap();
        assert_eq!(parsed.header.summary, "init");
        assert_eq!(parsed.records.len(), 1);
        assert!(matches!(&parsed.records[0], CommitRecord::File(f) if f.path == "README.md"));
    }

    #[test]
    fn rejects_missing_header() {
        let body = r#"{"key":"file","value":{"path":"a","content":"YQ=="}}"#;
        assert!(parse_commit_body(body).is_err());
    }

    #[test]
    fn tolerates_unknown_keys() {
        let body = r#"{"key":"header","value":{"summary":"init"}}
{"key":"futureThing","value":{"whatever":true}}"#;
        let parsed = parse_commit_body(body).unwrap();
        assert!(matches!(&parsed.records[0], CommitRecord::Unknown(k) if k == "futureThing"));
    }

    #[test]
    fn rejects_malformed_json() {
        let body = "{not json}";
        assert!(parse_commit_body(body).is_err());
    }

    #[test]
    fn parses_delete_records() {
        let body = r#"{"key":"header","value":{"summary":"rm"}}
{"key":"deletedFile","value":{"path":"old.txt"}}
{"key":"deletedFolder","value":{"path":"old_dir"}}"#;
        let parsed = parse_commit_body(body).unwrap();
        assert_eq!(parsed.records.len(), 2);
    }
}
