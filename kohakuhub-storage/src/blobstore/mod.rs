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

//! Blob Store Adapter (C1, spec §4.1).
//!
//! The trait is the stable boundary; handlers never talk to an S3 SDK
//! directly. All methods are `async fn` so implementations can dispatch
//! blocking SDK calls onto a bounded execution pool without the caller ever
//! owning a pool thread while suspended (spec §5).

#[cfg(feature = "s3")]
mod s3;
mod mem;

#[cfg(feature = "s3")]
pub use s3::S3BlobStore;
pub use mem::MemBlobStore;

use async_trait::async_trait;
use kohakuhub_core::error::{KohakuError, Result};
use std::time::Duration;

pub const DEFAULT_PRESIGN_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct ObjectStat {
    pub size: u64,
    pub etag: String,
    pub last_modified: chrono::DateTime<chrono::Utc>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PresignedUpload {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct MultipartUpload {
    pub upload_id: String,
    pub part_urls: Vec<String>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteReport {
    pub deleted: u64,
    pub errors: Vec<String>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// `presignDownload`. TTL defaults to `DEFAULT_PRESIGN_TTL`; a
    /// `filename_hint` emits `Content-Disposition: attachment; filename=...`.
    /// Must be constructed against the *public* endpoint, which may differ
    /// from the internal one used for uploads.
    async fn presign_download(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
        filename_hint: Option<&str>,
    ) -> Result<String>;

    /// `presignUpload`. When `sha256` is given, the URL is bound to
    /// `x-amz-checksum-sha256` and the client MUST present that header.
    async fn presign_upload(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
        content_type: Option<&str>,
        sha256: Option<&str>,
    ) -> Result<PresignedUpload>;

    /// Starts (or resumes, given `upload_id`) a multipart upload for blobs
    /// above the LFS multipart threshold.
    async fn multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        part_count: u32,
        ttl: Duration,
        upload_id: Option<&str>,
    ) -> Result<MultipartUpload>;

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()>;

    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()>;

    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectStat>>;

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        Ok(self.head(bucket, key).await?.is_some())
    }

    /// Reads the full object body. Used by the Git bridge (C6) to embed
    /// small blobs directly into synthesized pack objects.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: Option<&str>) -> Result<()>;

    /// Paginates listing and deletes in batches of 1000 (backend limit).
    /// Continues on per-object error and reports total success (spec §4.1).
    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> Result<DeleteReport>;

    /// Used for rename/fork (spec §4.1, scenario S6).
    async fn copy_prefix(
        &self,
        bucket: &str,
        from: &str,
        to: &str,
        exclude: Option<&str>,
    ) -> Result<u64>;
}

/// `parseS3URI("s3://bucket/key") -> (bucket, key)` (spec §4.1).
pub fn parse_s3_uri(uri: &str) -> Result<(String, String)> {
    let rest = uri
        .strip_prefix("s3://")
        .ok_or_else(|| KohakuError::validation(format!("not an s3:// URI: {uri}")))?;
    let (bucket, key) = rest
        .split_once('/')
        .ok_or_else(|| KohakuError::validation(format!("s3 URI missing key: {uri}")))?;
    if bucket.is_empty() || key.is_empty() {
        return Err(KohakuError::validation(format!("s3 URI missing bucket or key: {uri}")));
    }
    Ok((bucket.to_string(), key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_uri() {
        let (bucket, key) = parse_s3_uri("s3://my-bucket/lfs/ab/cd/abcd").unwrap();
        assert_eq!(bucket, "my-bucket");
        assert_eq!(key, "lfs/ab/cd/abcd");
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!(parse_s3_uri("my-bucket/key").is_err());
    }

    #[test]
    fn rejects_missing_key() {
        assert!(parse_s3_uri("s3://my-bucket").is_err());
    }
}
