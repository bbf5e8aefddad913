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

pub mod commit;
pub mod git_http;
pub mod health;
pub mod invitations;
pub mod lfs;
pub mod quota;
pub mod repos;
pub mod resolve;
pub mod ssh_keys;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use kohakuhub_core::error::KohakuError;
use kohakuhub_core::namespace::NamespaceKey;
use kohakuhub_core::repo::RepoType;

pub(crate) fn parse_repo_type(type_plural: &str) -> ApiResult<RepoType> {
    RepoType::from_plural(type_plural)
        .ok_or_else(|| ApiError(KohakuError::validation(format!("unknown repo type: {type_plural}"))))
}

/// axum's router captures a whole path segment per parameter, so
/// `{name}.git` arrives as one token; Git Smart HTTP and LFS routes strip
/// the suffix themselves rather than splitting it out in the route table.
pub(crate) fn strip_dot_git(name: &str) -> &str {
    name.strip_suffix(".git").unwrap_or(name)
}

/// Resolves the on-disk [`NamespaceKey`] (user vs org) for a namespace name
/// so quota calls use the same key identity as repo creation.
pub(crate) fn repo_namespace_key(state: &AppState, namespace: &str) -> ApiResult<NamespaceKey> {
    let is_org = state.store.get_namespace(&NamespaceKey::org(namespace))?.is_some();
    Ok(NamespaceKey {
        name: namespace.to_string(),
        is_org,
    })
}
