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

//! Shared application state handed to every handler.

use crate::auth::AuthContext;
use crate::config::ServerConfig;
use crate::fallback::FallbackRouter;
use kohakuhub_core::permissions::Principal;
use kohakuhub_storage::git::GitBridge;
use kohakuhub_storage::{BlobStore, MetadataStore, QuotaEngine, VcsBackend};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<MetadataStore>,
    pub vcs: Arc<dyn VcsBackend>,
    pub blobs: Arc<dyn BlobStore>,
    pub quota: Arc<QuotaEngine>,
    pub fallback: Arc<FallbackRouter>,
    pub git_bridge: Arc<GitBridge>,
}

impl AppState {
    /// Resolves an [`AuthContext`] into a full [`Principal`] for a single
    /// namespace — the only namespace a given request ever needs a role
    /// for (spec §4.3).
    pub fn principal_for(&self, ctx: &AuthContext, namespace: &str) -> kohakuhub_core::error::Result<Principal> {
        let namespace_roles = match &ctx.user {
            Some(user) => match self.store.get_role(namespace, user)? {
                Some(role) => vec![(namespace.to_string(), role)],
                None => vec![],
            },
            None => vec![],
        };
        Ok(Principal {
            user: ctx.user.clone(),
            platform_admin: ctx.platform_admin,
            namespace_roles,
        })
    }
}
