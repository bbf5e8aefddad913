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

//! Real Git object types (C6, spec §4.6).
//!
//! Unlike the content-addressed store elsewhere in this crate, these types
//! follow Git's actual on-disk format byte for byte: SHA-1 object ids,
//! `"<type> <len>\0<payload>"` framing, and binary tree entries. A client
//! that clones a repository served by the Git bridge must see exactly what
//! `git cat-file` would show against a real Git server.

use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 20]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, ParseError> {
        let bytes = hex::decode(s).map_err(|_| ParseError::InvalidHex)?;
        if bytes.len() != 20 {
            return Err(ParseError::InvalidLength);
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Hashes a loose object's framed representation: `"<kind> <len>\0<body>"`.
    pub fn hash_framed(kind: &str, body: &[u8]) -> Self {
        let header = format!("{kind} {}\0", body.len());
        let mut hasher = Sha1::new();
        hasher.update(header.as_bytes());
        hasher.update(body);
        let digest = hasher.finalize();
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&digest);
        Self(arr)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    InvalidHex,
    InvalidLength,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHex => write!(f, "invalid hex object id"),
            Self::InvalidLength => write!(f, "object id must decode to 20 bytes"),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
        }
    }
}

/// A regular file blob. LFS pointer files are stored as ordinary blobs
/// containing the pointer text (spec §4.5); the bridge never embeds large
/// LFS payloads in a pack.
#[derive(Debug, Clone)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn id(&self) -> ObjectId {
        ObjectId::hash_framed(ObjectKind::Blob.as_str(), &self.data)
    }

    pub fn encode(&self) -> Vec<u8> {
        self.data.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Regular,
    Executable,
    Symlink,
    Directory,
}

impl FileMode {
    pub fn as_octal(self) -> &'static str {
        match self {
            Self::Regular => "100644",
            Self::Executable => "100755",
            Self::Symlink => "120000",
            Self::Directory => "40000",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TreeEntry {
    pub mode: FileMode,
    pub name: String,
    pub id: ObjectId,
}

/// A Git tree: a sorted map of path-component name to entry. Sorted by name
/// on encode so the same entry set always hashes to the same tree id,
/// matching how `git mktree` is stable across runs.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: TreeEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn entries(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.values()
    }

    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.get(name)
    }

    pub fn id(&self) -> ObjectId {
        ObjectId::hash_framed(ObjectKind::Tree.as_str(), &self.encode())
    }

    /// Binary tree format: `"<mode> <name>\0<20-byte-id>"` repeated, entries
    /// ordered by git's tree-sort rule: compare names as if a directory's
    /// name carried a trailing `/` (spec §4.6 step 4), so `lib.rs` (`.` =
    /// 0x2e) sorts before a `lib/` directory (`/` = 0x2f) even though
    /// `lib` alone would sort after `lib.rs` lexicographically.
    pub fn encode(&self) -> Vec<u8> {
        let mut sorted: Vec<&TreeEntry> = self.entries.values().collect();
        sorted.sort_by(|a, b| git_sort_key(a).cmp(&git_sort_key(b)));

        let mut buf = Vec::new();
        for entry in sorted {
            buf.extend_from_slice(entry.mode.as_octal().as_bytes());
            buf.push(b' ');
            buf.extend_from_slice(entry.name.as_bytes());
            buf.push(0);
            buf.extend_from_slice(entry.id.as_bytes());
        }
        buf
    }

    pub fn decode(body: &[u8]) -> Result<Self, ParseError> {
        let mut tree = Tree::new();
        let mut rest = body;
        while !rest.is_empty() {
            let space = rest.iter().position(|&b| b == b' ').ok_or(ParseError::InvalidLength)?;
            let mode_str = std::str::from_utf8(&rest[..space]).map_err(|_| ParseError::InvalidLength)?;
            let mode = match mode_str {
                "100644" => FileMode::Regular,
                "100755" => FileMode::Executable,
                "120000" => FileMode::Symlink,
                "40000" => FileMode::Directory,
                _ => return Err(ParseError::InvalidLength),
            };
            rest = &rest[space + 1..];
            let nul = rest.iter().position(|&b| b == 0).ok_or(ParseError::InvalidLength)?;
            let name = std::str::from_utf8(&rest[..nul]).map_err(|_| ParseError::InvalidLength)?.to_string();
            rest = &rest[nul + 1..];
            if rest.len() < 20 {
                return Err(ParseError::InvalidLength);
            }
            let mut id_bytes = [0u8; 20];
            id_bytes.copy_from_slice(&rest[..20]);
            rest = &rest[20..];
            tree.insert(TreeEntry { mode, name, id: ObjectId::from_bytes(id_bytes) });
        }
        Ok(tree)
    }
}

fn git_sort_key(entry: &TreeEntry) -> String {
    if entry.mode == FileMode::Directory {
        format!("{}/", entry.name)
    } else {
        entry.name.clone()
    }
}

#[derive(Debug, Clone)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub timestamp: i64,
    /// e.g. `"+0000"`.
    pub tz_offset: String,
}

impl Signature {
    fn encode(&self) -> String {
        format!("{} <{}> {} {}", self.name, self.email, self.timestamp, self.tz_offset)
    }
}

#[derive(Debug, Clone)]
pub struct Commit {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl Commit {
    pub fn id(&self) -> ObjectId {
        ObjectId::hash_framed(ObjectKind::Commit.as_str(), &self.encode())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&format!("tree {}\n", self.tree.to_hex()));
        for parent in &self.parents {
            out.push_str(&format!("parent {}\n", parent.to_hex()));
        }
        out.push_str(&format!("author {}\n", self.author.encode()));
        out.push_str(&format!("committer {}\n", self.committer.encode()));
        out.push('\n');
        out.push_str(&self.message);
        if !self.message.ends_with('\n') {
            out.push('\n');
        }
        out.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig() -> Signature {
        Signature {
            name: "Kohaku Bot".into(),
            email: "bot@kohakuhub.local".into(),
            timestamp: 1_700_000_000,
            tz_offset: "+0000".into(),
        }
    }

    #[test]
    fn blob_id_matches_known_git_empty_blob_hash() {
        // `git hash-object -t blob --stdin < /dev/null`
        let blob = Blob::new(Vec::new());
        assert_eq!(blob.id().to_hex(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }

    #[test]
    fn tree_round_trips_through_encode_decode() {
        let mut tree = Tree::new();
        tree.insert(TreeEntry {
            mode: FileMode::Regular,
            name: "README.md".into(),
            id: Blob::new(b"hi".to_vec()).id(),
        });
        let encoded = tree.encode();
        let decoded = Tree::decode(&encoded).unwrap();
        assert_eq!(decoded.get("README.md").unwrap().id, tree.get("README.md").unwrap().id);
    }

    #[test]
    fn tree_entries_are_sorted_by_name() {
        let mut tree = Tree::new();
        for name in ["zeta.txt", "alpha.txt", "mid.txt"] {
            tree.insert(TreeEntry {
                mode: FileMode::Regular,
                name: name.into(),
                id: Blob::new(name.as_bytes().to_vec()).id(),
            });
        }
        let names: Vec<&str> = tree.entries().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha.txt", "mid.txt", "zeta.txt"]);
    }

    #[test]
    fn encode_sorts_directories_as_if_name_had_trailing_slash() {
        let mut tree = Tree::new();
        tree.insert(TreeEntry {
            mode: FileMode::Directory,
            name: "lib".into(),
            id: Tree::new().id(),
        });
        tree.insert(TreeEntry {
            mode: FileMode::Regular,
            name: "lib.rs".into(),
            id: Blob::new(b"fn main() {}".to_vec()).id(),
        });

        let encoded = tree.encode();
        let lib_rs_pos = encoded.windows(7).position(|w| w == b"lib.rs\0").unwrap();
        let lib_pos = encoded.windows(4).position(|w| w == b"lib\0").unwrap();
        assert!(lib_rs_pos < lib_pos, "lib.rs must come before lib/ per git's tree-sort rule");
    }

    #[test]
    fn commit_id_is_deterministic_for_same_fields() {
        let tree_id = Tree::new().id();
        let commit = Commit {
            tree: tree_id,
            parents: vec![],
            author: sig(),
            committer: sig(),
            message: "init".into(),
        };
        let other = Commit { tree: tree_id, parents: vec![], author: sig(), committer: sig(), message: "init".into() };
        assert_eq!(commit.id(), other.id());
    }

    #[test]
    fn commit_message_gets_trailing_newline() {
        let commit = Commit {
            tree: Tree::new().id(),
            parents: vec![],
            author: sig(),
            committer: sig(),
            message: "no newline".into(),
        };
        assert!(commit.encode().ends_with(b"no newline\n"));
    }

    #[test]
    fn object_id_hex_round_trips() {
        let id = Blob::new(b"x".to_vec()).id();
        let parsed = ObjectId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, parsed);
    }
}
