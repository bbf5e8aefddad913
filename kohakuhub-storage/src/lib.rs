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

//! KohakuHub Storage
//!
//! Backend adapters for the content plane: blob storage (C1), the
//! branch/commit backend (C2), the Git Smart HTTP bridge (C6), the
//! sqlite-backed metadata store (namespaces, repos, commit log, LFS
//! history, invitations, SSH keys, fallback sources), and the quota
//! engine (C7). `kohakuhub-server` depends on this crate and never talks
//! to S3 or sqlite directly.

pub mod blobstore;
pub mod db;
pub mod git;
pub mod quota;
pub mod vcs;

pub use blobstore::{BlobStore, MemBlobStore, ObjectStat};
#[cfg(feature = "s3")]
pub use blobstore::S3BlobStore;
pub use db::MetadataStore;
pub use quota::QuotaEngine;
pub use vcs::{MemoryVcsBackend, VcsBackend};
