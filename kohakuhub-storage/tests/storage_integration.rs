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

//! Integration tests across the storage crate's backends: direct
//! construction, plain `#[test]`/`#[tokio::test]` assertions against the
//! public API, no mocking.

use kohakuhub_core::namespace::NamespaceKey;
use kohakuhub_core::quota::QuotaLimit;
use kohakuhub_storage::vcs::{CommitAuthor, StagedObject, StagingArea};
use kohakuhub_storage::{BlobStore, MemBlobStore, MemoryVcsBackend, MetadataStore, QuotaEngine, VcsBackend};
use std::time::Duration;

fn author() -> CommitAuthor {
    CommitAuthor {
        name: "tester".to_string(),
        email: "tester@example.com".to_string(),
    }
}

#[tokio::test]
async fn mem_blob_store_round_trips_put_get_and_delete_prefix() {
    let store = MemBlobStore::new();
    store.put("kohakuhub", "alice/widgets/a.txt", b"hello".to_vec(), Some("text/plain")).await.unwrap();
    store.put("kohakuhub", "alice/widgets/b.txt", b"world".to_vec(), None).await.unwrap();

    assert!(store.exists("kohakuhub", "alice/widgets/a.txt").await.unwrap());
    assert_eq!(store.get("kohakuhub", "alice/widgets/a.txt").await.unwrap(), b"hello");

    let report = store.delete_prefix("kohakuhub", "alice/widgets/").await.unwrap();
    assert_eq!(report.deleted, 2);
    assert!(!store.exists("kohakuhub", "alice/widgets/a.txt").await.unwrap());
}

#[tokio::test]
async fn mem_blob_store_presigned_download_url_embeds_bucket_and_key() {
    let store = MemBlobStore::new();
    store.put("kohakuhub", "alice/m/file.bin", vec![1, 2, 3], None).await.unwrap();
    let url = store
        .presign_download("kohakuhub", "alice/m/file.bin", Duration::from_secs(60), None)
        .await
        .unwrap();
    assert!(url.contains("kohakuhub"));
    assert!(url.contains("alice/m/file.bin"));
}

#[tokio::test]
async fn memory_vcs_backend_commits_and_lists_objects() {
    let vcs = MemoryVcsBackend::new();
    vcs.create_repo("models/alice/widgets", "main").await.unwrap();
    assert!(vcs.repo_exists("models/alice/widgets").await.unwrap());

    let staging = StagingArea {
        puts: vec![StagedObject {
            path: "README.md".to_string(),
            physical_address: "s3://kohakuhub/models/alice/widgets/README.md".to_string(),
            size: 13,
            checksum: Some("deadbeef".to_string()),
        }],
        deletes: vec![],
    };
    let rev = vcs
        .commit("models/alice/widgets", "main", staging, "initial commit", author())
        .await
        .unwrap();
    assert!(!rev.is_empty());

    let page = vcs.list_objects("models/alice/widgets", "main", None, None, 100).await.unwrap();
    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.entries[0].path, "README.md");
    assert!(!page.has_more);

    let resolved = vcs.resolve_branch("models/alice/widgets", "main").await.unwrap();
    assert_eq!(resolved.as_deref(), Some(rev.as_str()));
}

#[tokio::test]
async fn memory_vcs_backend_branch_create_and_reset() {
    let vcs = MemoryVcsBackend::new();
    vcs.create_repo("models/alice/widgets", "main").await.unwrap();

    let staging = StagingArea {
        puts: vec![StagedObject {
            path: "a.txt".to_string(),
            physical_address: "s3://kohakuhub/a.txt".to_string(),
            size: 1,
            checksum: None,
        }],
        deletes: vec![],
    };
    let first = vcs
        .commit("models/alice/widgets", "main", staging, "first", author())
        .await
        .unwrap();

    vcs.create_branch("models/alice/widgets", "dev", &first).await.unwrap();
    assert!(vcs.list_branches("models/alice/widgets").await.unwrap().contains(&"dev".to_string()));

    let second_staging = StagingArea {
        puts: vec![StagedObject {
            path: "b.txt".to_string(),
            physical_address: "s3://kohakuhub/b.txt".to_string(),
            size: 1,
            checksum: None,
        }],
        deletes: vec![],
    };
    vcs.commit("models/alice/widgets", "main", second_staging, "second", author()).await.unwrap();

    vcs.reset("models/alice/widgets", "main", &first).await.unwrap();
    let after_reset = vcs.resolve_branch("models/alice/widgets", "main").await.unwrap();
    assert_eq!(after_reset.as_deref(), Some(first.as_str()));
}

#[test]
fn quota_engine_admits_within_limit_and_rejects_over_limit() {
    let store = std::sync::Arc::new(MetadataStore::open_in_memory().unwrap());
    let engine = QuotaEngine::new(store);
    let key = NamespaceKey::user("alice");

    engine.set_limits(&key, QuotaLimit::Bytes(1000), QuotaLimit::Unlimited).unwrap();
    assert!(engine.admit(&key, 500, true).unwrap());
    engine.admit_and_apply(&key, 500, true).unwrap();

    let ns = engine.get(&key).unwrap();
    assert_eq!(ns.private_used_bytes, 500);

    assert!(!engine.admit(&key, 600, true).unwrap());
    let err = engine.apply(&key, 600, true).unwrap_err();
    assert!(matches!(err, kohakuhub_core::error::KohakuError::QuotaExceeded { .. }));
}

#[test]
fn quota_engine_recompute_overrides_drift() {
    let store = std::sync::Arc::new(MetadataStore::open_in_memory().unwrap());
    let engine = QuotaEngine::new(store);
    let key = NamespaceKey::org("acme");

    engine.admit_and_apply(&key, 100, false).unwrap();
    engine.recompute(&key, 42, 7).unwrap();

    let ns = engine.get(&key).unwrap();
    assert_eq!(ns.private_used_bytes, 42);
    assert_eq!(ns.public_used_bytes, 7);
}

#[test]
fn metadata_store_repository_and_namespace_round_trip() {
    let store = MetadataStore::open_in_memory().unwrap();
    let id = kohakuhub_core::repo::RepoId::new(kohakuhub_core::repo::RepoType::Model, "alice", "widgets");
    let repo = kohakuhub_core::Repository::new(id.clone(), true);

    store.insert_repository(&repo).unwrap();
    let fetched = store.get_repository(&id).unwrap().unwrap();
    assert_eq!(fetched.id, id);
    assert!(fetched.private);

    store.delete_repository(&id).unwrap();
    assert!(store.get_repository(&id).unwrap().is_none());
}
