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

//! In-process `BlobStore` used by server/CLI tests and by `kohakuhub-cli`'s
//! dry-run mode. Keyed the same way `response_git`'s object store keys
//! content: a flat map from a fully-qualified key to its bytes, guarded by
//! `DashMap` rather than a single mutex so concurrent LFS uploads in tests
//! don't serialize on each other.

use super::{BlobStore, CompletedPart, DeleteReport, MultipartUpload, ObjectStat, PresignedUpload};
use async_trait::async_trait;
use dashmap::DashMap;
use kohakuhub_core::error::{KohakuError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

struct StoredObject {
    body: Vec<u8>,
    content_type: Option<String>,
    last_modified: chrono::DateTime<chrono::Utc>,
}

struct PendingMultipart {
    parts: Vec<Option<Vec<u8>>>,
}

/// `bucket/key -> StoredObject`. Presigned URLs are synthesized as
/// `mem://<bucket>/<key>?op=<get|put>&exp=<unix>` so tests can assert on
/// their shape without a real HTTP round trip.
#[derive(Default)]
pub struct MemBlobStore {
    objects: DashMap<String, StoredObject>,
    uploads: DashMap<String, PendingMultipart>,
    upload_seq: AtomicU64,
}

impl MemBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn qualify(bucket: &str, key: &str) -> String {
        format!("{bucket}/{key}")
    }
}

#[async_trait]
impl BlobStore for MemBlobStore {
    async fn presign_download(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
        filename_hint: Option<&str>,
    ) -> Result<String> {
        let qualified = Self::qualify(bucket, key);
        if !self.objects.contains_key(&qualified) {
            return Err(KohakuError::not_found(format!("object {qualified}")));
        }
        let exp = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        let mut url = format!("mem://{qualified}?op=get&exp={exp}");
        if let Some(name) = filename_hint {
            url.push_str(&format!("&filename={name}"));
        }
        Ok(url)
    }

    async fn presign_upload(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
        content_type: Option<&str>,
        sha256: Option<&str>,
    ) -> Result<PresignedUpload> {
        let qualified = Self::qualify(bucket, key);
        let exp = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        let url = format!("mem://{qualified}?op=put&exp={exp}");
        let mut headers = Vec::new();
        if let Some(ct) = content_type {
            headers.push(("Content-Type".to_string(), ct.to_string()));
        }
        if let Some(sum) = sha256 {
            headers.push(("x-amz-checksum-sha256".to_string(), sum.to_string()));
        }
        Ok(PresignedUpload {
            url,
            headers,
            expires_at: chrono::Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default(),
        })
    }

    async fn multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        part_count: u32,
        ttl: Duration,
        upload_id: Option<&str>,
    ) -> Result<MultipartUpload> {
        let qualified = Self::qualify(bucket, key);
        let upload_id = match upload_id {
            Some(id) => id.to_string(),
            None => {
                let n = self.upload_seq.fetch_add(1, Ordering::Relaxed);
                format!("mem-upload-{n}")
            }
        };
        self.uploads.insert(
            upload_id.clone(),
            PendingMultipart {
                parts: vec![None; part_count as usize],
            },
        );
        let exp = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        let part_urls = (1..=part_count)
            .map(|n| format!("mem://{qualified}?op=putpart&part={n}&uploadId={upload_id}&exp={exp}"))
            .collect();
        Ok(MultipartUpload {
            upload_id,
            part_urls,
            expires_at: chrono::Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default(),
        })
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()> {
        let (_, pending) = self
            .uploads
            .remove(upload_id)
            .ok_or_else(|| KohakuError::not_found(format!("upload {upload_id}")))?;
        let mut assembled = Vec::new();
        for part in parts {
            let idx = part.part_number as usize - 1;
            let body = pending
                .parts
                .get(idx)
                .and_then(|p| p.clone())
                .ok_or_else(|| KohakuError::conflict(format!("part {} never uploaded", part.part_number)))?;
            assembled.extend_from_slice(&body);
        }
        let qualified = Self::qualify(bucket, key);
        self.objects.insert(
            qualified,
            StoredObject {
                body: assembled,
                content_type: None,
                last_modified: chrono::Utc::now(),
            },
        );
        Ok(())
    }

    async fn abort_multipart(&self, _bucket: &str, _key: &str, upload_id: &str) -> Result<()> {
        self.uploads.remove(upload_id);
        Ok(())
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectStat>> {
        let qualified = Self::qualify(bucket, key);
        Ok(self.objects.get(&qualified).map(|obj| ObjectStat {
            size: obj.body.len() as u64,
            etag: format!("{:x}", md5_like(&obj.body)),
            last_modified: obj.last_modified,
            content_type: obj.content_type.clone(),
        }))
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let qualified = Self::qualify(bucket, key);
        self.objects
            .get(&qualified)
            .map(|obj| obj.body.clone())
            .ok_or_else(|| KohakuError::not_found(format!("object {qualified}")))
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: Option<&str>) -> Result<()> {
        let qualified = Self::qualify(bucket, key);
        self.objects.insert(
            qualified,
            StoredObject {
                body,
                content_type: content_type.map(|s| s.to_string()),
                last_modified: chrono::Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> Result<DeleteReport> {
        let qualified_prefix = Self::qualify(bucket, prefix);
        let to_remove: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(&qualified_prefix))
            .map(|entry| entry.key().clone())
            .collect();
        let deleted = to_remove.len() as u64;
        for key in to_remove {
            self.objects.remove(&key);
        }
        Ok(DeleteReport {
            deleted,
            errors: Vec::new(),
        })
    }

    async fn copy_prefix(&self, bucket: &str, from: &str, to: &str, exclude: Option<&str>) -> Result<u64> {
        let from_prefix = Self::qualify(bucket, from);
        let to_prefix = Self::qualify(bucket, to);
        let mut copied = 0u64;
        let matches: Vec<(String, Vec<u8>, Option<String>)> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(&from_prefix))
            .filter(|entry| exclude.map(|ex| !entry.key().contains(ex)).unwrap_or(true))
            .map(|entry| (entry.key().clone(), entry.value().body.clone(), entry.value().content_type.clone()))
            .collect();
        for (key, body, content_type) in matches {
            let suffix = &key[from_prefix.len()..];
            let new_key = format!("{to_prefix}{suffix}");
            self.objects.insert(
                new_key,
                StoredObject {
                    body,
                    content_type,
                    last_modified: chrono::Utc::now(),
                },
            );
            copied += 1;
        }
        Ok(copied)
    }
}

/// Cheap, non-cryptographic content fingerprint for synthetic ETags in
/// tests; never exposed as a real checksum.
fn md5_like(body: &[u8]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    body.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemBlobStore::new();
        store.put("b", "k", b"hello".to_vec(), None).await.unwrap();
        assert_eq!(store.get("b", "k").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn head_reports_size() {
        let store = MemBlobStore::new();
        store.put("b", "k", vec![0u8; 42], Some("application/octet-stream")).await.unwrap();
        let stat = store.head("b", "k").await.unwrap().unwrap();
        assert_eq!(stat.size, 42);
    }

    #[tokio::test]
    async fn multipart_upload_assembles_parts_in_order() {
        let store = MemBlobStore::new();
        let upload = store
            .multipart_upload("b", "big", 2, Duration::from_secs(60), None)
            .await
            .unwrap();
        {
            let mut pending = store.uploads.get_mut(&upload.upload_id).unwrap();
            pending.parts[0] = Some(b"part-one-".to_vec());
            pending.parts[1] = Some(b"part-two".to_vec());
        }
        store
            .complete_multipart(
                "b",
                "big",
                &upload.upload_id,
                &[
                    CompletedPart { part_number: 1, etag: "e1".into() },
                    CompletedPart { part_number: 2, etag: "e2".into() },
                ],
            )
            .await
            .unwrap();
        assert_eq!(store.get("b", "big").await.unwrap(), b"part-one-part-two");
    }

    #[tokio::test]
    async fn delete_prefix_removes_only_matching_keys() {
        let store = MemBlobStore::new();
        store.put("b", "lfs/ab/1", vec![1], None).await.unwrap();
        store.put("b", "lfs/ab/2", vec![2], None).await.unwrap();
        store.put("b", "other/1", vec![3], None).await.unwrap();
        let report = store.delete_prefix("b", "lfs/ab/").await.unwrap();
        assert_eq!(report.deleted, 2);
        assert!(store.get("b", "other/1").await.is_ok());
    }

    #[tokio::test]
    async fn copy_prefix_excludes_matching_substring() {
        let store = MemBlobStore::new();
        store.put("b", "src/a.txt", vec![1], None).await.unwrap();
        store.put("b", "src/lfs_manifest.json", vec![2], None).await.unwrap();
        let copied = store.copy_prefix("b", "src/", "dst/", Some("lfs_manifest")).await.unwrap();
        assert_eq!(copied, 1);
        assert!(store.get("b", "dst/a.txt").await.is_ok());
        assert!(store.get("b", "dst/lfs_manifest.json").await.is_err());
    }
}
