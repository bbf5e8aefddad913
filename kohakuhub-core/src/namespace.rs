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

//! Namespaces (users and orgs) and membership roles (spec §3).

use serde::{Deserialize, Serialize};
use std::fmt;

/// `(name, is_org)` — unique within its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespaceKey {
    pub name: String,
    pub is_org: bool,
}

impl NamespaceKey {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_org: false,
        }
    }

    pub fn org(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_org: true,
        }
    }
}

impl fmt::Display for NamespaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
    pub key: NamespaceKey,
    pub private_quota_bytes: super::quota::QuotaLimit,
    pub public_quota_bytes: super::quota::QuotaLimit,
    pub private_used_bytes: i64,
    pub public_used_bytes: i64,
}

impl Namespace {
    pub fn new(key: NamespaceKey) -> Self {
        Self {
            key,
            private_quota_bytes: super::quota::QuotaLimit::Unlimited,
            public_quota_bytes: super::quota::QuotaLimit::Unlimited,
            private_used_bytes: 0,
            public_used_bytes: 0,
        }
    }
}

/// Role within a namespace. Ordered `visitor < member < admin < super_admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Visitor,
    Member,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn at_least(self, floor: Role) -> bool {
        self >= floor
    }
}

/// `(namespace, user, role)` relation. Exactly one super-admin per org at
/// creation; the last super-admin can never be demoted or removed —
/// enforced by callers in the storage layer, not representable here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub namespace: NamespaceKey,
    pub user: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering_matches_spec() {
        assert!(Role::SuperAdmin.at_least(Role::Admin));
        assert!(Role::Admin.at_least(Role::Member));
        assert!(!Role::Visitor.at_least(Role::Member));
    }
}
