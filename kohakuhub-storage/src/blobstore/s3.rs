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

//! S3-backed `BlobStore`. Works against AWS S3 and any S3-compatible
//! service (MinIO, R2, etc.) by pointing `aws_config` at a custom
//! endpoint; the public/internal endpoint split mirrors the pattern most
//! self-hosted deployments need when the server and the client reach the
//! object store over different network paths.

use super::{BlobStore, CompletedPart, DeleteReport, MultipartUpload, ObjectStat, PresignedUpload};
use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart, ObjectIdentifier};
use aws_sdk_s3::Client;
use kohakuhub_core::error::{KohakuError, Result};
use std::time::Duration;

pub struct S3BlobStore {
    client: Client,
    /// Endpoint used when presigning URLs handed back to external clients;
    /// may differ from the endpoint `client` itself talks to.
    public_endpoint: Option<String>,
}

impl S3BlobStore {
    pub fn new(client: Client, public_endpoint: Option<String>) -> Self {
        Self { client, public_endpoint }
    }

    /// Builds a client from the ambient AWS config (region, credentials,
    /// endpoint override via `AWS_ENDPOINT_URL`), as self-hosted deployments
    /// typically configure MinIO or another S3-compatible backend.
    pub async fn from_env(public_endpoint: Option<String>) -> Self {
        let config = aws_config::load_from_env().await;
        let client = Client::new(&config);
        Self::new(client, public_endpoint)
    }

    /// Builds a client from explicit server configuration rather than the
    /// ambient environment, for MinIO-style self-hosted deployments with
    /// static keys and path-style bucket addressing.
    pub async fn from_config(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
        public_endpoint: Option<String>,
    ) -> Self {
        let credentials = aws_sdk_s3::config::Credentials::new(access_key, secret_key, None, None, "kohakuhub-server");
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .endpoint_url(endpoint)
            .region(aws_sdk_s3::config::Region::new(region.to_string()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();
        Self::new(Client::from_conf(config), public_endpoint)
    }

    fn rewrite_endpoint(&self, url: String) -> String {
        let Some(public) = &self.public_endpoint else {
            return url;
        };
        match url.split_once("://").and_then(|(_, rest)| rest.split_once('/')) {
            Some((_, path)) => format!("{}/{}", public.trim_end_matches('/'), path),
            None => url,
        }
    }

    fn map_sdk_err(context: &str, e: impl std::fmt::Display) -> KohakuError {
        KohakuError::TransientBackend(format!("{context}: {e}"))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn presign_download(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
        filename_hint: Option<&str>,
    ) -> Result<String> {
        let mut req = self.client.get_object().bucket(bucket).key(key);
        if let Some(name) = filename_hint {
            req = req.response_content_disposition(format!("attachment; filename=\"{name}\""));
        }
        let presign_config = PresigningConfig::expires_in(ttl)
            .map_err(|e| Self::map_sdk_err("building presign config", e))?;
        let presigned = req
            .presigned(presign_config)
            .await
            .map_err(|e| Self::map_sdk_err("presigning GET", e))?;
        Ok(self.rewrite_endpoint(presigned.uri().to_string()))
    }

    async fn presign_upload(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
        content_type: Option<&str>,
        sha256: Option<&str>,
    ) -> Result<PresignedUpload> {
        let mut req = self.client.put_object().bucket(bucket).key(key);
        if let Some(ct) = content_type {
            req = req.content_type(ct);
        }
        if let Some(sum) = sha256 {
            req = req.checksum_sha256(sum);
        }
        let presign_config = PresigningConfig::expires_in(ttl)
            .map_err(|e| Self::map_sdk_err("building presign config", e))?;
        let presigned = req
            .presigned(presign_config)
            .await
            .map_err(|e| Self::map_sdk_err("presigning PUT", e))?;

        let mut headers = Vec::new();
        if let Some(ct) = content_type {
            headers.push(("Content-Type".to_string(), ct.to_string()));
        }
        if let Some(sum) = sha256 {
            headers.push(("x-amz-checksum-sha256".to_string(), sum.to_string()));
        }

        Ok(PresignedUpload {
            url: self.rewrite_endpoint(presigned.uri().to_string()),
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
        let upload_id = match upload_id {
            Some(id) => id.to_string(),
            None => {
                let created = self
                    .client
                    .create_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(|e| Self::map_sdk_err("create_multipart_upload", e))?;
                created
                    .upload_id()
                    .ok_or_else(|| KohakuError::internal("S3 did not return an upload id"))?
                    .to_string()
            }
        };

        let presign_config = PresigningConfig::expires_in(ttl)
            .map_err(|e| Self::map_sdk_err("building presign config", e))?;
        let mut part_urls = Vec::with_capacity(part_count as usize);
        for part_number in 1..=part_count {
            let presigned = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .part_number(part_number as i32)
                .presigned(presign_config.clone())
                .await
                .map_err(|e| Self::map_sdk_err("presigning upload_part", e))?;
            part_urls.push(self.rewrite_endpoint(presigned.uri().to_string()));
        }

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
        let completed_parts: Vec<S3CompletedPart> = parts
            .iter()
            .map(|p| {
                S3CompletedPart::builder()
                    .part_number(p.part_number as i32)
                    .e_tag(&p.etag)
                    .build()
            })
            .collect();

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| Self::map_sdk_err("complete_multipart_upload", e))?;
        Ok(())
    }

    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| Self::map_sdk_err("abort_multipart_upload", e))?;
        Ok(())
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectStat>> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(resp) => Ok(Some(ObjectStat {
                size: resp.content_length().unwrap_or(0).max(0) as u64,
                etag: resp.e_tag().unwrap_or_default().trim_matches('"').to_string(),
                last_modified: resp
                    .last_modified()
                    .and_then(|dt| chrono::DateTime::from_timestamp(dt.secs(), 0))
                    .unwrap_or_else(chrono::Utc::now),
                content_type: resp.content_type().map(|s| s.to_string()),
            })),
            Err(e) => {
                let service_err = e.as_service_error();
                if service_err.map(|se| se.is_not_found()).unwrap_or(false) {
                    Ok(None)
                } else {
                    Err(Self::map_sdk_err("head_object", e))
                }
            }
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_err("get_object", e))?;
        let bytes = resp
            .body
            .collect()
            .await
            .map_err(|e| Self::map_sdk_err("reading get_object body", e))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: Option<&str>) -> Result<()> {
        let mut req = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body.into());
        if let Some(ct) = content_type {
            req = req.content_type(ct);
        }
        req.send().await.map_err(|e| Self::map_sdk_err("put_object", e))?;
        Ok(())
    }

    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> Result<DeleteReport> {
        let mut report = DeleteReport::default();
        let mut continuation: Option<String> = None;
        loop {
            let mut list_req = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
            if let Some(token) = &continuation {
                list_req = list_req.continuation_token(token);
            }
            let listed = list_req
                .send()
                .await
                .map_err(|e| Self::map_sdk_err("list_objects_v2", e))?;

            let keys: Vec<ObjectIdentifier> = listed
                .contents()
                .iter()
                .filter_map(|o| o.key())
                .filter_map(|k| ObjectIdentifier::builder().key(k).build().ok())
                .collect();

            if !keys.is_empty() {
                let batch_size = keys.len() as u64;
                let delete = aws_sdk_s3::types::Delete::builder()
                    .set_objects(Some(keys))
                    .build()
                    .map_err(|e| Self::map_sdk_err("building delete batch", e))?;
                match self
                    .client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send()
                    .await
                {
                    Ok(resp) => {
                        report.deleted += resp.deleted().len() as u64;
                        for err in resp.errors() {
                            report.errors.push(format!(
                                "{}: {}",
                                err.key().unwrap_or_default(),
                                err.message().unwrap_or_default()
                            ));
                        }
                    }
                    Err(e) => report.errors.push(format!("batch of {batch_size}: {e}")),
                }
            }

            continuation = listed.next_continuation_token().map(|s| s.to_string());
            if continuation.is_none() {
                break;
            }
        }
        Ok(report)
    }

    async fn copy_prefix(&self, bucket: &str, from: &str, to: &str, exclude: Option<&str>) -> Result<u64> {
        let mut copied = 0u64;
        let mut continuation: Option<String> = None;
        loop {
            let mut list_req = self.client.list_objects_v2().bucket(bucket).prefix(from);
            if let Some(token) = &continuation {
                list_req = list_req.continuation_token(token);
            }
            let listed = list_req
                .send()
                .await
                .map_err(|e| Self::map_sdk_err("list_objects_v2", e))?;

            for object in listed.contents() {
                let Some(key) = object.key() else { continue };
                if exclude.map(|ex| key.contains(ex)).unwrap_or(false) {
                    continue;
                }
                let suffix = &key[from.len()..];
                let dest_key = format!("{to}{suffix}");
                let source = format!("{bucket}/{key}");
                self.client
                    .copy_object()
                    .bucket(bucket)
                    .copy_source(&source)
                    .key(&dest_key)
                    .send()
                    .await
                    .map_err(|e| Self::map_sdk_err("copy_object", e))?;
                copied += 1;
            }

            continuation = listed.next_continuation_token().map(|s| s.to_string());
            if continuation.is_none() {
                break;
            }
        }
        Ok(copied)
    }
}
