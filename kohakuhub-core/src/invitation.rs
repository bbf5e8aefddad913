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

//! Invitation tokens (C11, spec §3, §4.11). Each binds one action; `-1`
//! usage means unlimited.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "camelCase")]
pub enum InvitationAction {
    JoinOrg { org_id: String, role: crate::namespace::Role },
    RegisterAccount { org_id: Option<String>, role: Option<crate::namespace::Role> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub token: String,
    pub action: InvitationAction,
    pub created_by: String,
    /// `-1` means unlimited.
    pub max_usage: i64,
    pub usage_count: i64,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub email: Option<String>,
}

impl Invitation {
    /// Available iff `now < expiresAt && usageCount < maxUsage` (unlimited
    /// when `max_usage == -1`).
    pub fn is_available(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        if now >= self.expires_at {
            return false;
        }
        self.max_usage == -1 || self.usage_count < self.max_usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invite(max_usage: i64, usage_count: i64) -> Invitation {
        Invitation {
            token: "tok".into(),
            action: InvitationAction::RegisterAccount {
                org_id: None,
                role: None,
            },
            created_by: "admin".into(),
            max_usage,
            usage_count,
            expires_at: chrono::Utc::now() + Duration::hours(1),
            email: None,
        }
    }

    #[test]
    fn unlimited_usage_never_exhausts() {
        let inv = invite(-1, 10_000);
        assert!(inv.is_available(chrono::Utc::now()));
    }

    #[test]
    fn one_shot_token_exhausts_after_first_use() {
        let mut inv = invite(1, 0);
        assert!(inv.is_available(chrono::Utc::now()));
        inv.usage_count += 1;
        assert!(!inv.is_available(chrono::Utc::now()));
    }

    #[test]
    fn expired_token_is_unavailable() {
        let mut inv = invite(1, 0);
        inv.expires_at = chrono::Utc::now() - Duration::hours(1);
        assert!(!inv.is_available(chrono::Utc::now()));
    }
}
