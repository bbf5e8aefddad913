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

//! Write-check pipeline (C3, spec §4.3).
//!
//! These are pure functions over already-resolved facts (the principal's
//! roles, the repo's owner/visibility). Looking those facts up is the
//! storage layer's job; `kohakuhub-server` is the only caller that should
//! ever need both.

use crate::namespace::Role;
use crate::repo::Repository;

/// A resolved, authenticated (or anonymous) caller.
#[derive(Debug, Clone)]
pub struct Principal {
    /// `None` for anonymous requests.
    pub user: Option<String>,
    pub platform_admin: bool,
    /// Roles this principal holds, keyed by namespace name.
    pub namespace_roles: Vec<(String, Role)>,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self {
            user: None,
            platform_admin: false,
            namespace_roles: Vec::new(),
        }
    }

    pub fn role_in(&self, namespace: &str) -> Option<Role> {
        self.namespace_roles
            .iter()
            .find(|(ns, _)| ns == namespace)
            .map(|(_, r)| *r)
    }

    pub fn is_self(&self, namespace: &str) -> bool {
        self.user.as_deref() == Some(namespace)
    }
}

/// `canRead`: public repos are always readable; private repos require any
/// role in the owning namespace.
pub fn can_read(principal: &Principal, repo: &Repository) -> bool {
    if !repo.private {
        return true;
    }
    principal.platform_admin || principal.role_in(&repo.id.namespace).is_some()
}

/// `canWrite`: the owner user, or a member-or-above of the owning org.
/// Visibility (private/public) does not change the write check.
pub fn can_write(principal: &Principal, repo: &Repository) -> bool {
    if principal.platform_admin {
        return true;
    }
    if principal.is_self(&repo.id.namespace) {
        return true;
    }
    matches!(
        principal.role_in(&repo.id.namespace),
        Some(r) if r.at_least(Role::Member)
    )
}

/// Repository *creation* check (spec §4.3): user namespaces require the
/// principal to be that user or a platform admin; org namespaces require
/// member-or-above in that org.
pub fn can_create_in_namespace(principal: &Principal, namespace: &str, namespace_is_org: bool) -> bool {
    if principal.platform_admin {
        return true;
    }
    if !namespace_is_org {
        return principal.is_self(namespace);
    }
    matches!(
        principal.role_in(namespace),
        Some(r) if r.at_least(Role::Member)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{RepoId, RepoType};

    fn repo(private: bool, namespace: &str) -> Repository {
        Repository::new(RepoId::new(RepoType::Model, namespace, "m1"), private)
    }

    #[test]
    fn public_repo_is_always_readable() {
        let anon = Principal::anonymous();
        assert!(can_read(&anon, &repo(false, "alice")));
    }

    #[test]
    fn private_repo_requires_membership() {
        let anon = Principal::anonymous();
        assert!(!can_read(&anon, &repo(true, "alice")));

        let member = Principal {
            user: Some("bob".into()),
            platform_admin: false,
            namespace_roles: vec![("alice".into(), Role::Visitor)],
        };
        assert!(can_read(&member, &repo(true, "alice")));
    }

    #[test]
    fn owner_can_always_write_own_namespace() {
        let owner = Principal {
            user: Some("alice".into()),
            platform_admin: false,
            namespace_roles: vec![],
        };
        assert!(can_write(&owner, &repo(false, "alice")));
    }

    #[test]
    fn visitor_cannot_write() {
        let visitor = Principal {
            user: Some("bob".into()),
            platform_admin: false,
            namespace_roles: vec![("org1".into(), Role::Visitor)],
        };
        assert!(!can_write(&visitor, &repo(false, "org1")));
    }

    #[test]
    fn member_can_write_org_repo() {
        let member = Principal {
            user: Some("bob".into()),
            platform_admin: false,
            namespace_roles: vec![("org1".into(), Role::Member)],
        };
        assert!(can_write(&member, &repo(true, "org1")));
    }
}
