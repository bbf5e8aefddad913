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

//! Pack synthesis pipeline and Smart HTTP service advertisement (C6,
//! spec §4.6). `GitBridge` is read-mostly: it derives everything from the
//! tree the [`crate::vcs::VcsBackend`] already holds for a branch, plus
//! blob content it pulls from the [`crate::blobstore::BlobStore`] on
//! demand. `receive-pack` is an accept-stub per spec §1/§9: it parses and
//! acknowledges but does not translate pushes into commits.

use crate::blobstore::BlobStore;
use crate::git::objects::{Blob, Commit, FileMode, ObjectKind, Signature, Tree, TreeEntry};
use crate::git::pack::PackWriter;
use crate::git::pktline::{encode_pkt_line, encode_pkt_line_str, encode_side_band, SideBandChannel, FLUSH_PKT};
use crate::vcs::{CommitRecord, VcsBackend};
use kohakuhub_core::error::{KohakuError, Result};
use kohakuhub_core::lfs::{LfsPointer, LfsSettings};
use std::sync::Arc;

/// Below this, a file's content is embedded as a real Git blob; at or
/// above it (or on an LFS suffix match) the bridge embeds the LFS pointer
/// text instead. Independent of the storage-LFS threshold (spec §4.6).
pub const PACK_INLINE_THRESHOLD_BYTES: u64 = 1_000_000;

const CAPABILITIES: &str = "multi_ack thin-pack side-band-64k ofs-delta agent=kohakuhub/1.0";

pub struct ServiceAdvertisement {
    pub content_type: String,
    pub body: Vec<u8>,
}

pub struct GitBridge {
    vcs: Arc<dyn VcsBackend>,
    blobstore: Arc<dyn BlobStore>,
    blob_bucket: String,
}

impl GitBridge {
    pub fn new(vcs: Arc<dyn VcsBackend>, blobstore: Arc<dyn BlobStore>, blob_bucket: String) -> Self {
        Self { vcs, blobstore, blob_bucket }
    }

    /// `GET {repo}.git/HEAD`.
    pub fn head_ref(&self) -> Vec<u8> {
        b"ref: refs/heads/main\n".to_vec()
    }

    /// `GET {repo}.git/info/refs?service=git-upload-pack|git-receive-pack`.
    pub async fn service_advertisement(&self, canonical_name: &str, service: &str) -> Result<ServiceAdvertisement> {
        if service != "git-upload-pack" && service != "git-receive-pack" {
            return Err(KohakuError::validation(format!("unsupported git service: {service}")));
        }

        let branches = self.vcs.list_branches(canonical_name).await?;
        let mut refs: Vec<(String, String)> = Vec::new();
        for branch in &branches {
            if let Some(revision) = self.vcs.resolve_branch(canonical_name, branch).await? {
                let (_, commit) = self.build_tree_and_commit(canonical_name, branch, &revision, None).await?;
                refs.push((format!("refs/heads/{branch}"), commit.id().to_hex()));
            }
        }

        let mut body = Vec::new();
        body.extend(encode_pkt_line_str(&format!("# service={service}"))?);
        body.extend_from_slice(FLUSH_PKT);

        if refs.is_empty() {
            body.extend(encode_pkt_line(format!("{} capabilities^{{}}\0{CAPABILITIES}\n", "0".repeat(40)).as_bytes())?);
        } else {
            let head = refs
                .iter()
                .find(|(name, _)| name == "refs/heads/main")
                .or_else(|| refs.first())
                .cloned();
            if let Some((_, oid)) = &head {
                body.extend(encode_pkt_line_str(&format!("{oid} HEAD\0{CAPABILITIES}"))?);
            }
            for (name, oid) in &refs {
                body.extend(encode_pkt_line_str(&format!("{oid} {name}"))?);
            }
        }
        body.extend_from_slice(FLUSH_PKT);

        Ok(ServiceAdvertisement {
            content_type: format!("application/x-{service}-advertisement"),
            body,
        })
    }

    /// Parses `want`/`have`/`done` lines out of an upload-pack request body
    /// and returns the wanted object ids; `have` lines are ignored since
    /// every fetch produces a fresh, non-incremental pack.
    fn parse_wants(body: &[u8]) -> Result<Vec<String>> {
        let (lines, _) = crate::git::pktline::decode_pkt_lines(body)?;
        let mut wants = Vec::new();
        for line in lines {
            if let crate::git::pktline::PktLine::Data(data) = line {
                let text = String::from_utf8_lossy(&data);
                if let Some(rest) = text.trim_end().strip_prefix("want ") {
                    let oid = rest.split(' ').next().unwrap_or(rest);
                    wants.push(oid.to_string());
                }
            }
        }
        Ok(wants)
    }

    /// `POST {repo}.git/git-upload-pack`. Builds one pack containing every
    /// object reachable from the target branch's current tree and frames
    /// it over side-band 64k.
    pub async fn upload_pack(&self, canonical_name: &str, branch: &str, request_body: &[u8]) -> Result<Vec<u8>> {
        let _wants = Self::parse_wants(request_body)?;

        let revision = self
            .vcs
            .resolve_branch(canonical_name, branch)
            .await?
            .ok_or_else(|| KohakuError::not_found(format!("branch {branch}")))?;

        let pack = self.build_pack(canonical_name, branch, &revision).await?;

        let mut out = Vec::new();
        out.extend(encode_pkt_line_str("NAK")?);
        out.extend(encode_side_band(SideBandChannel::Progress, b"kohakuhub: counting objects\n")?);
        out.extend(encode_side_band(SideBandChannel::Data, &pack)?);
        out.extend_from_slice(FLUSH_PKT);
        Ok(out)
    }

    /// `POST {repo}.git/git-receive-pack`. Acknowledges every ref update
    /// without ingesting the pushed pack (spec §1, §9: write-back is out
    /// of scope for this boundary).
    pub fn receive_pack_stub(&self, request_body: &[u8]) -> Result<Vec<u8>> {
        let (lines, _) = crate::git::pktline::decode_pkt_lines(request_body)?;
        let mut refs = Vec::new();
        for line in lines {
            if let crate::git::pktline::PktLine::Data(data) = line {
                let text = String::from_utf8_lossy(&data);
                let text = text.trim_end_matches(['\n', '\0']);
                if let Some(rest) = text.split('\0').next() {
                    let mut parts = rest.split(' ');
                    let (_old, _new, name) = (parts.next(), parts.next(), parts.next());
                    if let Some(name) = name {
                        refs.push(name.to_string());
                    }
                }
            }
        }

        let mut report = Vec::new();
        report.extend(encode_pkt_line_str("unpack ok")?);
        for name in &refs {
            report.extend(encode_pkt_line_str(&format!("ok {name}"))?);
        }
        report.extend_from_slice(FLUSH_PKT);

        let mut out = Vec::new();
        out.extend(encode_side_band(SideBandChannel::Data, &report)?);
        out.extend_from_slice(FLUSH_PKT);
        Ok(out)
    }

    async fn build_pack(&self, canonical_name: &str, branch: &str, revision: &str) -> Result<Vec<u8>> {
        let mut writer = PackWriter::new();
        let (_, commit) = self.build_tree_and_commit(canonical_name, branch, revision, Some(&mut writer)).await?;
        writer.add(ObjectKind::Commit, commit.encode());
        Ok(writer.build())
    }

    /// Walks the branch's current file list, building (and, if `writer` is
    /// given, also emitting) every blob and tree object, then the commit
    /// object pointing at the resulting root tree. Called once per fetch
    /// to build the real pack, and once per advertised ref (with no
    /// writer) so the advertised commit id matches what a subsequent fetch
    /// would actually produce.
    async fn build_tree_and_commit(
        &self,
        canonical_name: &str,
        branch: &str,
        revision: &str,
        mut writer: Option<&mut PackWriter>,
    ) -> Result<(crate::git::objects::ObjectId, Commit)> {
        let mut root = DirNode::default();
        let mut lfs_patterns: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();

        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .vcs
                .list_objects(canonical_name, branch, None, cursor.as_deref(), 1000)
                .await?;
            for entry in &page.entries {
                kohakuhub_core::revision::validate_path(&entry.path).map_err(KohakuError::validation)?;
                let blob = self.build_blob_for_entry(entry).await?;
                if entry.is_lfs {
                    lfs_patterns.insert(lfs_attribute_pattern(&entry.path));
                }
                if let Some(w) = writer.as_deref_mut() {
                    w.add(ObjectKind::Blob, blob.encode());
                }
                let components: Vec<&str> = entry.path.split('/').collect();
                root.insert(&components, blob.id());
            }
            if !page.has_more {
                break;
            }
            cursor = page.next_cursor;
        }

        self.synthesize_ancillary_files(&mut root, &lfs_patterns, writer.as_deref_mut())?;

        let root_tree = root.flush(writer.as_deref_mut());

        let commit = self.synthesize_commit(canonical_name, branch, revision, root_tree).await?;
        Ok((root_tree, commit))
    }

    /// Content below the inline threshold and not LFS-tracked is embedded
    /// directly; an LFS-tracked entry becomes pointer text keyed off its
    /// real sha256 checksum, not its storage key (spec §4.6 step 2-3).
    async fn build_blob_for_entry(&self, entry: &crate::vcs::ObjectEntry) -> Result<Blob> {
        if entry.is_lfs {
            let pointer = LfsPointer { oid: entry.checksum.clone(), size: entry.size };
            return Ok(Blob::new(pointer.to_text().into_bytes()));
        }
        let (bucket, key) = crate::blobstore::parse_s3_uri(&entry.physical_address)
            .unwrap_or_else(|_| (self.blob_bucket.clone(), entry.physical_address.clone()));
        let content = self.blobstore.get(&bucket, &key).await?;
        Ok(Blob::new(content))
    }

    fn synthesize_ancillary_files(
        &self,
        root: &mut DirNode,
        lfs_patterns: &std::collections::BTreeSet<String>,
        mut writer: Option<&mut PackWriter>,
    ) -> Result<()> {
        let settings = LfsSettings::default();
        let mut patterns = lfs_patterns.clone();
        patterns.extend(settings.suffix_rules.iter().map(|suffix| format!("*{suffix}")));

        if !patterns.is_empty() {
            let mut attrs = String::new();
            for pattern in &patterns {
                attrs.push_str(&format!("{pattern} filter=lfs diff=lfs merge=lfs -text\n"));
            }
            let blob = Blob::new(attrs.into_bytes());
            if let Some(w) = writer.as_deref_mut() {
                w.add(ObjectKind::Blob, blob.encode());
            }
            root.files.insert(".gitattributes".to_string(), blob.id());
        }

        let lfsconfig = "[lfs]\n\turl = /info/lfs\n".to_string();
        let blob = Blob::new(lfsconfig.into_bytes());
        if let Some(w) = writer.as_deref_mut() {
            w.add(ObjectKind::Blob, blob.encode());
        }
        root.files.insert(".lfsconfig".to_string(), blob.id());
        Ok(())
    }

    async fn synthesize_commit(
        &self,
        canonical_name: &str,
        branch: &str,
        revision: &str,
        root_tree: crate::git::objects::ObjectId,
    ) -> Result<Commit> {
        let commits = self.vcs.list_commits(canonical_name, branch, None, 1).await?;
        let latest: Option<&CommitRecord> = commits.iter().find(|c| c.revision == revision).or_else(|| commits.first());

        let (author_sig, committer_sig, message) = match latest {
            Some(c) => {
                let ts = c.timestamp.timestamp();
                (
                    Signature { name: c.author.name.clone(), email: c.author.email.clone(), timestamp: ts, tz_offset: "+0000".into() },
                    Signature { name: c.author.name.clone(), email: c.author.email.clone(), timestamp: ts, tz_offset: "+0000".into() },
                    c.message.clone(),
                )
            }
            None => {
                let sig = Signature { name: "kohakuhub".into(), email: "bot@kohakuhub.local".into(), timestamp: 0, tz_offset: "+0000".into() };
                (sig.clone(), sig, "synthesized snapshot".to_string())
            }
        };

        Ok(Commit {
            tree: root_tree,
            parents: Vec::new(),
            author: author_sig,
            committer: committer_sig,
            message,
        })
    }
}

/// `.gitattributes` pattern for an LFS-tracked path: `"*.ext"` when the
/// file has an extension (covers every same-extension sibling, matching
/// how HF-style repos track `*.safetensors`/`*.bin`), or the literal path
/// otherwise.
fn lfs_attribute_pattern(path: &str) -> String {
    let basename = path.rsplit('/').next().unwrap_or(path);
    match basename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!("*.{ext}"),
        _ => path.to_string(),
    }
}

/// A directory trie built from the flat path list before any Git tree
/// object is constructed, so siblings inserted one path at a time never
/// clobber each other (every path's insertion mutates the same owned node
/// rather than rebuilding a subtree from nothing).
#[derive(Default)]
struct DirNode {
    files: std::collections::BTreeMap<String, crate::git::objects::ObjectId>,
    dirs: std::collections::BTreeMap<String, DirNode>,
}

impl DirNode {
    fn insert(&mut self, components: &[&str], blob_id: crate::git::objects::ObjectId) {
        match components {
            [] => {}
            [name] => {
                self.files.insert(name.to_string(), blob_id);
            }
            [head, rest @ ..] => {
                self.dirs.entry(head.to_string()).or_default().insert(rest, blob_id);
            }
        }
    }

    /// Converts this node into a Git `Tree`, recursing into subdirectories
    /// first (post-order) so every child tree id is known before this
    /// node's own tree is hashed. Writes every produced object to `writer`
    /// when given.
    fn flush(self, mut writer: Option<&mut PackWriter>) -> crate::git::objects::ObjectId {
        let mut tree = Tree::new();
        for (name, id) in self.files {
            tree.insert(TreeEntry { mode: FileMode::Regular, name, id });
        }
        for (name, child) in self.dirs {
            let child_id = child.flush(writer.as_deref_mut());
            tree.insert(TreeEntry { mode: FileMode::Directory, name, id: child_id });
        }
        let id = tree.id();
        if let Some(w) = writer {
            w.add(ObjectKind::Tree, tree.encode());
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobstore::MemBlobStore;
    use crate::vcs::{CommitAuthor, MemoryVcsBackend, StagedObject, StagingArea, VcsBackend};

    async fn bridge_with_one_file() -> (GitBridge, String) {
        let vcs = Arc::new(MemoryVcsBackend::new());
        let blobstore = Arc::new(MemBlobStore::new());
        vcs.create_repo("repo", "main").await.unwrap();
        blobstore.put("bucket", "README.md", b"# hi".to_vec(), None).await.unwrap();
        let staging = StagingArea {
            puts: vec![StagedObject {
                path: "README.md".into(),
                physical_address: "s3://bucket/README.md".into(),
                size: 4,
                checksum: None,
            }],
            deletes: vec![],
        };
        let revision = vcs
            .commit("repo", "main", staging, "init", CommitAuthor { name: "a".into(), email: "a@x.com".into() })
            .await
            .unwrap();
        let bridge = GitBridge::new(vcs, blobstore, "bucket".into());
        (bridge, revision)
    }

    #[tokio::test]
    async fn lfs_entry_renders_pointer_text_from_checksum_not_physical_address() {
        let (bridge, _) = bridge_with_one_file().await;
        let entry = crate::vcs::ObjectEntry {
            path: "model.safetensors".into(),
            size: 2_000_000,
            checksum: "deadbeef".repeat(8),
            physical_address: "lfs/de/ad/deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef".into(),
            is_lfs: true,
        };
        let blob = bridge.build_blob_for_entry(&entry).await.unwrap();
        let text = String::from_utf8(blob.data).unwrap();
        assert!(text.contains(&format!("oid sha256:{}", entry.checksum)));
        assert!(!text.contains("lfs/de/ad"));
    }

    #[tokio::test]
    async fn small_non_lfs_entry_embeds_real_content() {
        let (bridge, _) = bridge_with_one_file().await;
        let entry = crate::vcs::ObjectEntry {
            path: "README.md".into(),
            size: 4,
            checksum: String::new(),
            physical_address: "s3://bucket/README.md".into(),
            is_lfs: false,
        };
        let blob = bridge.build_blob_for_entry(&entry).await.unwrap();
        assert_eq!(blob.data, b"# hi");
    }

    #[test]
    fn gitattributes_emitted_for_size_based_lfs_entry_even_with_no_suffix_rules() {
        let vcs = Arc::new(MemoryVcsBackend::new());
        let blobstore = Arc::new(MemBlobStore::new());
        let bridge = GitBridge::new(vcs, blobstore, "bucket".into());
        let mut patterns = std::collections::BTreeSet::new();
        patterns.insert(lfs_attribute_pattern("model.safetensors"));
        let mut root = DirNode::default();
        bridge.synthesize_ancillary_files(&mut root, &patterns, None).unwrap();
        assert!(root.files.contains_key(".gitattributes"));
    }

    #[test]
    fn lfs_attribute_pattern_uses_extension_glob() {
        assert_eq!(lfs_attribute_pattern("model.safetensors"), "*.safetensors");
        assert_eq!(lfs_attribute_pattern("weights/shard.bin"), "*.bin");
        assert_eq!(lfs_attribute_pattern("Makefile"), "Makefile");
    }

    #[tokio::test]
    async fn head_ref_points_at_main() {
        let (bridge, _) = bridge_with_one_file().await;
        assert_eq!(bridge.head_ref(), b"ref: refs/heads/main\n".to_vec());
    }

    #[tokio::test]
    async fn service_advertisement_lists_main_branch() {
        let (bridge, _) = bridge_with_one_file().await;
        let ad = bridge.service_advertisement("repo", "git-upload-pack").await.unwrap();
        assert_eq!(ad.content_type, "application/x-git-upload-pack-advertisement");
        let text = String::from_utf8_lossy(&ad.body);
        assert!(text.contains("refs/heads/main"));
        assert!(text.contains("side-band-64k"));
    }

    #[tokio::test]
    async fn upload_pack_produces_nonempty_pack_in_side_band() {
        let (bridge, _) = bridge_with_one_file().await;
        let want_line = encode_pkt_line_str(&format!("want {}", "0".repeat(40))).unwrap();
        let response = bridge.upload_pack("repo", "main", &want_line).await.unwrap();
        assert!(!response.is_empty());
        let (lines, _) = crate::git::pktline::decode_pkt_lines(&response).unwrap();
        assert!(!lines.is_empty());
    }

    #[tokio::test]
    async fn receive_pack_stub_acknowledges_ref_updates() {
        let (bridge, _) = bridge_with_one_file().await;
        let mut cmd = "0".repeat(40);
        cmd.push(' ');
        cmd.push_str(&"1".repeat(40));
        cmd.push_str(" refs/heads/main\0report-status");
        let body = encode_pkt_line(cmd.as_bytes()).unwrap();
        let response = bridge.receive_pack_stub(&body).unwrap();
        assert!(!response.is_empty());
    }

    #[test]
    fn dir_node_groups_siblings_under_shared_subtree() {
        let mut root = DirNode::default();
        let a = Blob::new(b"a".to_vec()).id();
        let b = Blob::new(b"b".to_vec()).id();
        root.insert(&["dir", "a.txt"], a);
        root.insert(&["dir", "b.txt"], b);
        assert_eq!(root.dirs.get("dir").unwrap().files.len(), 2);
    }

    #[test]
    fn dir_node_flush_produces_directory_mode_entry() {
        let mut root = DirNode::default();
        let blob_id = Blob::new(b"x".to_vec()).id();
        root.insert(&["dir", "file.txt"], blob_id);
        let mut writer = PackWriter::new();
        root.flush(Some(&mut writer));
        // one blob + two trees (dir, root)
        assert_eq!(writer.len(), 3);
    }
}
