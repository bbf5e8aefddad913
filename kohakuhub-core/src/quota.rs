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

//! Quota primitives shared between core and the quota engine (C7).
//!
//! The engine itself (admit/apply/recompute, row-level serialization) lives
//! in `kohakuhub-storage::quota` since it owns the persisted counters; this
//! module only holds the value types both layers agree on.

use serde::{Deserialize, Serialize};

/// Either a byte ceiling or the "unlimited" sentinel (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaLimit {
    Unlimited,
    Bytes(i64),
}

impl QuotaLimit {
    /// `true` iff `used + delta` would stay within the limit (or the limit
    /// is unlimited) and would not go negative.
    pub fn admits(self, used: i64, delta: i64) -> bool {
        let projected = used + delta;
        if projected < 0 {
            return false;
        }
        match self {
            QuotaLimit::Unlimited => true,
            QuotaLimit::Bytes(limit) => projected <= limit,
        }
    }

    /// Bytes remaining given current usage; `i64::MAX` when unlimited.
    pub fn available(self, used: i64) -> i64 {
        match self {
            QuotaLimit::Unlimited => i64::MAX - used,
            QuotaLimit::Bytes(limit) => limit - used,
        }
    }
}

/// Snapshot of a namespace's four quota counters (spec §3, §4.7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NamespaceQuota {
    pub private_quota: QuotaLimit,
    pub public_quota: QuotaLimit,
    pub private_used: i64,
    pub public_used: i64,
}

impl NamespaceQuota {
    pub fn used(&self, private: bool) -> i64 {
        if private {
            self.private_used
        } else {
            self.public_used
        }
    }

    pub fn quota(&self, private: bool) -> QuotaLimit {
        if private {
            self.private_quota
        } else {
            self.public_quota
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_always_admits_positive_delta() {
        assert!(QuotaLimit::Unlimited.admits(1_000_000, 500));
    }

    #[test]
    fn bytes_limit_rejects_overflow() {
        let limit = QuotaLimit::Bytes(1000);
        assert!(limit.admits(900, 100));
        assert!(!limit.admits(900, 101));
    }

    #[test]
    fn negative_projection_is_rejected() {
        let limit = QuotaLimit::Bytes(1000);
        assert!(!limit.admits(10, -20));
    }

    #[test]
    fn available_reports_remaining_bytes() {
        let limit = QuotaLimit::Bytes(1000);
        assert_eq!(limit.available(900), 100);
    }
}
