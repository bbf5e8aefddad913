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

//! Authentication (spec §3, §4.6): resolves a credential to a principal.
//! Mirrors the pluggable-strategy shape of a JWT/API-key authenticator, but
//! the credential here is always an opaque API token looked up in
//! [`kohakuhub_storage::MetadataStore`]'s `api_tokens` table, and HTTP Basic
//! is a first-class strategy because Git Smart HTTP requires it (spec
//! §4.6: "username is the user's login; password is an API token").

use axum::extract::Request as AxumRequest;
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use kohakuhub_storage::MetadataStore;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Resolved caller identity. Namespace-scoped roles are looked up lazily
/// per request against the namespace the handler is already operating on,
/// rather than carried here, since most requests only ever touch one.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: Option<String>,
    pub platform_admin: bool,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self {
            user: None,
            platform_admin: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing authentication credentials")]
    MissingCredentials,
    #[error("invalid authentication credentials")]
    InvalidCredentials,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
    }
}

pub trait Authenticator: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError>;
}

/// Hashes a raw bearer/basic-auth token the same way on issuance and on
/// lookup, so the credential store never holds a token in plaintext.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

fn lookup(store: &MetadataStore, raw_token: &str) -> Result<AuthContext, AuthError> {
    let hash = hash_token(raw_token);
    let found = store
        .validate_token(&hash, chrono::Utc::now())
        .map_err(|_| AuthError::InvalidCredentials)?;
    match found {
        Some((user, platform_admin)) => Ok(AuthContext {
            user: Some(user),
            platform_admin,
        }),
        None => Err(AuthError::InvalidCredentials),
    }
}

/// `Authorization: Bearer <token>` — the API surface's primary credential.
pub struct ApiTokenAuth {
    store: Arc<MetadataStore>,
}

impl ApiTokenAuth {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }
}

impl Authenticator for ApiTokenAuth {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let raw = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or(AuthError::MissingCredentials)?;
        lookup(&self.store, raw)
    }
}

/// `Authorization: Basic <base64(login:token)>` — the Git Smart HTTP path
/// (spec §4.6). The username is accepted but not checked against the
/// token's owner: the token alone determines the principal, same as the
/// bearer path, so a mismatched username is harmless rather than rejected.
pub struct BasicTokenAuth {
    store: Arc<MetadataStore>,
}

impl BasicTokenAuth {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }
}

impl Authenticator for BasicTokenAuth {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let raw = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Basic "))
            .ok_or(AuthError::MissingCredentials)?;
        let decoded = STANDARD
            .decode(raw)
            .map_err(|_| AuthError::InvalidCredentials)?;
        let text = String::from_utf8(decoded).map_err(|_| AuthError::InvalidCredentials)?;
        let (_login, password) = text.split_once(':').ok_or(AuthError::InvalidCredentials)?;
        lookup(&self.store, password)
    }
}

/// Tries each strategy in order, returning the first success.
pub struct MultiAuth {
    strategies: Vec<Box<dyn Authenticator>>,
}

impl MultiAuth {
    pub fn new(strategies: Vec<Box<dyn Authenticator>>) -> Self {
        Self { strategies }
    }
}

impl Authenticator for MultiAuth {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let mut last_err = AuthError::MissingCredentials;
        for strategy in &self.strategies {
            match strategy.authenticate(headers) {
                Ok(ctx) => return Ok(ctx),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }
}

/// Every request runs as the platform admin. Refused at bootstrap on any
/// non-loopback listen address; see `run_server`'s security banner.
pub struct NoAuth;

impl Authenticator for NoAuth {
    fn authenticate(&self, _headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        Ok(AuthContext {
            user: Some("admin".to_string()),
            platform_admin: true,
        })
    }
}

/// Resolves credentials and attaches the resulting [`AuthContext`] to the
/// request's extensions. Anonymous access (no credentials at all) is
/// allowed through as [`AuthContext::anonymous`] — handlers enforce the
/// read/write checks that actually require a principal (spec §4.3).
pub async fn auth_middleware(
    auth: axum::Extension<Arc<dyn Authenticator>>,
    mut req: AxumRequest,
    next: Next,
) -> Response {
    match auth.authenticate(req.headers()) {
        Ok(ctx) => {
            req.extensions_mut().insert(ctx);
        }
        Err(AuthError::MissingCredentials) => {
            req.extensions_mut().insert(AuthContext::anonymous());
        }
        Err(e) => return e.into_response(),
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn store_with_token(user: &str, admin: bool) -> (Arc<MetadataStore>, String) {
        let store = Arc::new(MetadataStore::open_in_memory().unwrap());
        let raw = "raw-token-value";
        store.create_token(&hash_token(raw), user, admin).unwrap();
        (store, raw.to_string())
    }

    #[test]
    fn bearer_token_resolves_principal() {
        let (store, raw) = store_with_token("alice", false);
        let auth = ApiTokenAuth::new(store);
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {raw}")).unwrap(),
        );
        let ctx = auth.authenticate(&headers).unwrap();
        assert_eq!(ctx.user.as_deref(), Some("alice"));
        assert!(!ctx.platform_admin);
    }

    #[test]
    fn basic_auth_ignores_username_and_checks_token() {
        let (store, raw) = store_with_token("bob", true);
        let auth = BasicTokenAuth::new(store);
        let mut headers = HeaderMap::new();
        let encoded = STANDARD.encode(format!("anything:{raw}"));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );
        let ctx = auth.authenticate(&headers).unwrap();
        assert_eq!(ctx.user.as_deref(), Some("bob"));
        assert!(ctx.platform_admin);
    }

    #[test]
    fn multi_auth_falls_through_to_second_strategy() {
        let (store, raw) = store_with_token("carol", false);
        let multi = MultiAuth::new(vec![
            Box::new(ApiTokenAuth::new(store.clone())),
            Box::new(BasicTokenAuth::new(store)),
        ]);
        let mut headers = HeaderMap::new();
        let encoded = STANDARD.encode(format!("carol:{raw}"));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );
        let ctx = multi.authenticate(&headers).unwrap();
        assert_eq!(ctx.user.as_deref(), Some("carol"));
    }

    #[test]
    fn no_auth_always_grants_platform_admin() {
        let ctx = NoAuth.authenticate(&HeaderMap::new()).unwrap();
        assert!(ctx.platform_admin);
    }
}
