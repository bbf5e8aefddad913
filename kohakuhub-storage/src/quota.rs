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

//! Quota Engine (C7, spec §4.7): namespace-row counters with row-level
//! serialization, following the same per-key locking discipline as
//! `agentreplay-server`'s rate limiter token buckets — one lock per key,
//! admission and application under that lock, unrelated keys never block
//! each other.

use crate::db::MetadataStore;
use dashmap::DashMap;
use kohakuhub_core::error::{KohakuError, Result};
use kohakuhub_core::namespace::{Namespace, NamespaceKey};
use kohakuhub_core::quota::QuotaLimit;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct QuotaEngine {
    store: Arc<MetadataStore>,
    row_locks: DashMap<NamespaceKey, Arc<Mutex<()>>>,
}

impl QuotaEngine {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self {
            store,
            row_locks: DashMap::new(),
        }
    }

    fn lock_for(&self, key: &NamespaceKey) -> Arc<Mutex<()>> {
        self.row_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn load_or_default(&self, key: &NamespaceKey) -> Result<Namespace> {
        Ok(self
            .store
            .get_namespace(key)?
            .unwrap_or_else(|| Namespace::new(key.clone())))
    }

    /// `admit`: true iff `used + delta` stays within quota (or unlimited)
    /// and does not go negative. Does not persist; callers that intend to
    /// proceed must follow with [`Self::apply`] under the same admission
    /// decision (spec §4.7: "For batch admission, callers compute the net
    /// delta across all records first").
    pub fn admit(&self, key: &NamespaceKey, delta_bytes: i64, private: bool) -> Result<bool> {
        let lock = self.lock_for(key);
        let _guard = lock.lock();
        let ns = self.load_or_default(key)?;
        let (used, limit) = if private {
            (ns.private_used_bytes, ns.private_quota_bytes)
        } else {
            (ns.public_used_bytes, ns.public_quota_bytes)
        };
        Ok(limit.admits(used, delta_bytes))
    }

    /// Applies `delta_bytes` to the namespace's counter, serialized through
    /// the row lock so concurrent admit+apply pairs on the same namespace
    /// never interleave. Returns `QuotaExceeded` if the result would exceed
    /// quota — callers that already ran `admit` immediately before `apply`
    /// under a held lock should never observe this (spec §4.7: "admission
    /// and application on the same namespace are serialized").
    pub fn apply(&self, key: &NamespaceKey, delta_bytes: i64, private: bool) -> Result<()> {
        let lock = self.lock_for(key);
        let _guard = lock.lock();
        let mut ns = self.load_or_default(key)?;
        let (used, limit) = if private {
            (ns.private_used_bytes, ns.private_quota_bytes)
        } else {
            (ns.public_used_bytes, ns.public_quota_bytes)
        };
        if !limit.admits(used, delta_bytes) {
            return Err(KohakuError::QuotaExceeded {
                namespace: key.name.clone(),
                requested: delta_bytes,
                available: limit.available(used),
            });
        }
        if private {
            ns.private_used_bytes += delta_bytes;
        } else {
            ns.public_used_bytes += delta_bytes;
        }
        self.store.upsert_namespace(&ns)
    }

    /// Admits and applies `delta_bytes` as one atomic step under the row
    /// lock — the composition handlers should use for a single write,
    /// avoiding the check-then-act race a separate `admit`+`apply` call
    /// pair would otherwise have between the two lock acquisitions.
    pub fn admit_and_apply(&self, key: &NamespaceKey, delta_bytes: i64, private: bool) -> Result<()> {
        let lock = self.lock_for(key);
        let _guard = lock.lock();
        let mut ns = self.load_or_default(key)?;
        let (used, limit) = if private {
            (ns.private_used_bytes, ns.private_quota_bytes)
        } else {
            (ns.public_used_bytes, ns.public_quota_bytes)
        };
        if !limit.admits(used, delta_bytes) {
            return Err(KohakuError::QuotaExceeded {
                namespace: key.name.clone(),
                requested: delta_bytes,
                available: limit.available(used),
            });
        }
        if private {
            ns.private_used_bytes += delta_bytes;
        } else {
            ns.public_used_bytes += delta_bytes;
        }
        self.store.upsert_namespace(&ns)
    }

    /// Recomputes both counters from a caller-supplied ground truth (the
    /// sum of file sizes across every repository in the namespace, as
    /// tallied by the caller from C2/C5) and writes it back, overriding
    /// whatever drift had accumulated (spec §4.7).
    pub fn recompute(&self, key: &NamespaceKey, private_total: i64, public_total: i64) -> Result<()> {
        let lock = self.lock_for(key);
        let _guard = lock.lock();
        let mut ns = self.load_or_default(key)?;
        ns.private_used_bytes = private_total;
        ns.public_used_bytes = public_total;
        self.store.upsert_namespace(&ns)
    }

    /// Moves `bytes` from one visibility counter to the other within the
    /// same namespace, atomically under the row lock (spec §4.7
    /// `moveVisibility`, invoked when a repo's visibility flips). The
    /// destination must still admit the move or the flip is rejected.
    pub fn move_visibility(&self, key: &NamespaceKey, bytes: i64, to_private: bool) -> Result<()> {
        let lock = self.lock_for(key);
        let _guard = lock.lock();
        let mut ns = self.load_or_default(key)?;
        let (dest_used, dest_limit) = if to_private {
            (ns.private_used_bytes, ns.private_quota_bytes)
        } else {
            (ns.public_used_bytes, ns.public_quota_bytes)
        };
        if !dest_limit.admits(dest_used, bytes) {
            return Err(KohakuError::QuotaExceeded {
                namespace: key.name.clone(),
                requested: bytes,
                available: dest_limit.available(dest_used),
            });
        }
        if to_private {
            ns.public_used_bytes -= bytes;
            ns.private_used_bytes += bytes;
        } else {
            ns.private_used_bytes -= bytes;
            ns.public_used_bytes += bytes;
        }
        self.store.upsert_namespace(&ns)
    }

    pub fn set_limits(&self, key: &NamespaceKey, private: QuotaLimit, public: QuotaLimit) -> Result<()> {
        let lock = self.lock_for(key);
        let _guard = lock.lock();
        let mut ns = self.load_or_default(key)?;
        ns.private_quota_bytes = private;
        ns.public_quota_bytes = public;
        self.store.upsert_namespace(&ns)
    }

    pub fn get(&self, key: &NamespaceKey) -> Result<Namespace> {
        self.load_or_default(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> QuotaEngine {
        QuotaEngine::new(Arc::new(MetadataStore::open_in_memory().unwrap()))
    }

    #[test]
    fn admit_rejects_over_quota_request() {
        let engine = engine();
        let key = NamespaceKey::user("alice");
        engine.set_limits(&key, QuotaLimit::Bytes(100), QuotaLimit::Unlimited).unwrap();
        assert!(engine.admit(&key, 50, true).unwrap());
        engine.apply(&key, 50, true).unwrap();
        assert!(!engine.admit(&key, 51, true).unwrap());
        assert!(engine.admit(&key, 50, true).unwrap());
    }

    #[test]
    fn apply_persists_and_rejects_overflow() {
        let engine = engine();
        let key = NamespaceKey::user("bob");
        engine.set_limits(&key, QuotaLimit::Bytes(100), QuotaLimit::Unlimited).unwrap();
        engine.apply(&key, 90, true).unwrap();
        assert!(engine.apply(&key, 20, true).is_err());
        assert_eq!(engine.get(&key).unwrap().private_used_bytes, 90);
    }

    #[test]
    fn move_visibility_shifts_bytes_between_counters() {
        let engine = engine();
        let key = NamespaceKey::org("acme");
        engine.apply(&key, 1000, true).unwrap();
        engine.move_visibility(&key, 400, false).unwrap();
        let ns = engine.get(&key).unwrap();
        assert_eq!(ns.private_used_bytes, 600);
        assert_eq!(ns.public_used_bytes, 400);
    }

    #[test]
    fn recompute_overrides_drifted_counters() {
        let engine = engine();
        let key = NamespaceKey::user("carol");
        engine.apply(&key, 10, true).unwrap();
        engine.recompute(&key, 500, 250).unwrap();
        let ns = engine.get(&key).unwrap();
        assert_eq!(ns.private_used_bytes, 500);
        assert_eq!(ns.public_used_bytes, 250);
    }

    #[test]
    fn move_visibility_respects_destination_quota() {
        let engine = engine();
        let key = NamespaceKey::user("dave");
        engine.set_limits(&key, QuotaLimit::Unlimited, QuotaLimit::Bytes(100)).unwrap();
        engine.apply(&key, 1000, true).unwrap();
        assert!(engine.move_visibility(&key, 200, false).is_err());
    }
}
