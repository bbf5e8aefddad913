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

//! Stable error kinds for the content plane.
//!
//! Every variant maps to exactly one HTTP status in the server crate; see
//! spec §7. Adapters (blobstore, vcs backend) return these directly so
//! handlers never need to pattern-match on adapter-specific errors.

use thiserror::Error;

/// Result type used across the content plane.
pub type Result<T> = std::result::Result<T, KohakuError>;

#[derive(Debug, Error)]
pub enum KohakuError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("quota exceeded in namespace {namespace}: requested {requested}, available {available}")]
    QuotaExceeded {
        namespace: String,
        requested: i64,
        available: i64,
    },

    #[error("LFS object missing: {0}")]
    LfsObjectMissing(String),

    #[error("backend temporarily unavailable: {0}")]
    TransientBackend(String),

    #[error("internal error [{1}]: {0}")]
    Internal(String, String),
}

impl KohakuError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    pub fn permission_denied(what: impl Into<String>) -> Self {
        Self::PermissionDenied(what.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        let correlation_id = uuid_like_id();
        Self::Internal(msg.into(), correlation_id)
    }

    /// Stable HTTP status code for this error kind (spec §7).
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::AuthRequired => 401,
            Self::PermissionDenied(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::QuotaExceeded { .. } => 413,
            Self::LfsObjectMissing(_) => 422,
            Self::TransientBackend(_) => 503,
            Self::Internal(..) => 500,
        }
    }
}

impl From<serde_json::Error> for KohakuError {
    fn from(e: serde_json::Error) -> Self {
        KohakuError::Validation(format!("malformed JSON: {e}"))
    }
}

/// Derived from the current time and a process-local counter.
fn uuid_like_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let now = chrono::Utc::now().timestamp_micros();
    format!("{now:x}-{n:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_spec_table() {
        assert_eq!(KohakuError::validation("x").status_code(), 400);
        assert_eq!(KohakuError::AuthRequired.status_code(), 401);
        assert_eq!(KohakuError::permission_denied("x").status_code(), 403);
        assert_eq!(KohakuError::not_found("x").status_code(), 404);
        assert_eq!(KohakuError::conflict("x").status_code(), 409);
        assert_eq!(
            KohakuError::QuotaExceeded {
                namespace: "a".into(),
                requested: 1,
                available: 0
            }
            .status_code(),
            413
        );
        assert_eq!(KohakuError::LfsObjectMissing("x".into()).status_code(), 422);
        assert_eq!(KohakuError::TransientBackend("x".into()).status_code(), 503);
        assert_eq!(KohakuError::internal("x").status_code(), 500);
    }
}
