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

//! Maps `KohakuError` onto HTTP responses using the status table in
//! `kohakuhub_core::error::KohakuError::status_code`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kohakuhub_core::error::KohakuError;
use serde_json::json;

pub struct ApiError(pub KohakuError);

impl From<KohakuError> for ApiError {
    fn from(e: KohakuError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = self.0.to_string();
        let body = match &self.0 {
            KohakuError::QuotaExceeded { namespace, requested, available } => json!({
                "error": message,
                "namespace": namespace,
                "requested": requested,
                "available": available,
            }),
            _ => json!({ "error": message }),
        };
        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn quota_exceeded_body_carries_structured_fields() {
        let err = ApiError(KohakuError::QuotaExceeded {
            namespace: "alice".to_string(),
            requested: 100,
            available: 40,
        });
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["namespace"], "alice");
        assert_eq!(body["requested"], 100);
        assert_eq!(body["available"], 40);
        assert!(body["error"].as_str().unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn not_found_body_is_plain_error_string() {
        let err = ApiError(KohakuError::not_found("repository x"));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body.get("namespace").is_none());
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }
}
