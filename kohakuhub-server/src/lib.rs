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

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod fallback;
pub mod state;

use anyhow::Result;
use auth::{ApiTokenAuth, Authenticator, BasicTokenAuth, MultiAuth, NoAuth};
use axum::middleware as axum_middleware;
use axum::routing::{delete, get, post, put};
use axum::{Extension, Router};
use config::ServerConfig;
use fallback::FallbackRouter;
use kohakuhub_storage::git::GitBridge;
use kohakuhub_storage::{MemBlobStore, MemoryVcsBackend, MetadataStore, QuotaEngine};
use state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub async fn run_server(config: ServerConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "kohakuhub_server=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting KohakuHub server");
    tracing::info!(config = ?config, "loaded configuration");

    let addr = config.socket_addr()?;
    let is_localhost = config.is_localhost();

    let store = Arc::new(MetadataStore::open(&config.storage.db_path)?);
    let quota = Arc::new(QuotaEngine::new(store.clone()));

    let blobs: Arc<dyn kohakuhub_storage::BlobStore> = if config.s3.endpoint.is_empty() {
        tracing::warn!("no S3 endpoint configured, using in-memory blob store (data does not persist)");
        Arc::new(MemBlobStore::new())
    } else {
        let store = kohakuhub_storage::S3BlobStore::from_config(
            &config.s3.endpoint,
            &config.s3.access_key,
            &config.s3.secret_key,
            &config.s3.region,
            config.s3.public_endpoint.clone(),
        )
        .await;
        Arc::new(store)
    };

    // TODO: swap in a durable VcsBackend once one exists; the in-memory
    // backend loses all commits/objects on restart.
    let vcs: Arc<dyn kohakuhub_storage::VcsBackend> = Arc::new(MemoryVcsBackend::new());

    let sources = store.list_fallback_sources()?;
    let fallback = Arc::new(FallbackRouter::new(
        config.fallback.enabled,
        sources,
        Duration::from_secs(config.fallback.cache_ttl_secs),
        Duration::from_secs(config.fallback.timeout_secs),
        config.fallback.max_concurrent,
    ));

    let git_bridge = Arc::new(GitBridge::new(vcs.clone(), blobs.clone(), config.s3.bucket.clone()));

    let config = Arc::new(config);
    let state = AppState {
        config: config.clone(),
        store: store.clone(),
        vcs,
        blobs,
        quota,
        fallback,
        git_bridge,
    };

    let authenticator: Arc<dyn Authenticator> = if !config.auth.disabled {
        tracing::info!("authentication enabled (bearer + basic API token)");
        Arc::new(MultiAuth::new(vec![
            Box::new(ApiTokenAuth::new(store.clone())),
            Box::new(BasicTokenAuth::new(store.clone())),
        ]))
    } else if is_localhost {
        tracing::warn!(
            "\n\
            ==============================================================\n\
              Authentication is DISABLED (NoAuth mode)\n\
              Every request runs as the platform admin.\n\
              This is only safe for local desktop/development use.\n\
              Binding to: {addr}\n\
            =============================================================="
        );
        Arc::new(NoAuth)
    } else {
        anyhow::bail!(
            "authentication is disabled on non-localhost address '{addr}'; \
             bind to 127.0.0.1, or set auth.disabled = false / KOHAKUHUB_AUTH_DISABLED=false",
        );
    };

    let app = build_router(state, authenticator);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("shutdown complete");
    Ok(())
}

/// Wires every handler onto its route, plus the auth/CORS/trace middleware
/// stack. Factored out of [`run_server`] so tests can build and drive the
/// exact same router without going through a real TCP listener.
pub fn build_router(state: AppState, authenticator: Arc<dyn Authenticator>) -> Router {
    let enable_cors = state.config.server.enable_cors;
    let cors_origins = state.config.server.cors_origins.clone();

    Router::new()
        .route("/api/health", get(api::health::health_check))
        .route("/api/repos/create", post(api::repos::create_repo))
        .route("/api/repos/delete", delete(api::repos::delete_repo))
        .route("/api/repos/move", post(api::repos::move_repo))
        .route("/api/repos/branches/create", post(api::repos::create_branch))
        .route("/api/repos/branches/reset", post(api::repos::reset_branch))
        .route("/api/repos/visibility", put(api::repos::set_visibility))
        .route("/api/:repo_type/:namespace/:name", get(api::repos::repo_info))
        .route("/api/:repo_type/:namespace/:name/revision/:rev", get(api::repos::revision_info))
        .route("/api/:repo_type/:namespace/:name/tree/:rev", get(api::repos::tree_listing))
        .route("/api/:repo_type/:namespace/:name/commit/:branch", post(api::commit::commit))
        .route("/:repo_type/:namespace/:name/resolve/:rev/*path", get(api::resolve::resolve_file).head(api::resolve::head_file))
        .route("/:repo_type/:namespace/:name/info/lfs/objects/batch", post(api::lfs::lfs_batch))
        .route("/api/:repo_type/:namespace/:name/info/lfs/verify", post(api::lfs::lfs_verify))
        .route("/:namespace/:name/info/refs", get(api::git_http::info_refs))
        .route("/:namespace/:name/HEAD", get(api::git_http::git_head))
        .route("/:namespace/:name/git-upload-pack", post(api::git_http::upload_pack))
        .route("/:namespace/:name/git-receive-pack", post(api::git_http::receive_pack))
        .route("/api/quota/:namespace", get(api::quota::get_quota).put(api::quota::set_quota))
        .route("/api/quota/:namespace/recalculate", post(api::quota::recalculate_quota))
        .route("/api/invitations/create", post(api::invitations::create_invitation))
        .route("/api/invitations/:token/accept", post(api::invitations::accept_invitation))
        .route("/api/invitations/:token", delete(api::invitations::revoke_invitation))
        .route("/api/user/keys", post(api::ssh_keys::add_ssh_key).get(api::ssh_keys::list_ssh_keys))
        .route("/api/user/keys/:fingerprint", delete(api::ssh_keys::delete_ssh_key))
        .layer(axum_middleware::from_fn(auth::auth_middleware))
        .layer(Extension(authenticator))
        .with_state(state)
        .layer(if enable_cors {
            let mut cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
            cors = if cors_origins.is_empty() {
                tracing::warn!("CORS: allowing all origins (set server.cors_origins in production)");
                cors.allow_origin(Any)
            } else {
                cors.allow_origin(Any)
            };
            cors
        } else {
            CorsLayer::new()
        })
        .layer(TraceLayer::new_for_http())
}

/// Waits for Ctrl+C so in-flight Git pack streams and multipart uploads can
/// finish instead of being cut off mid-response.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "failed to install ctrl-c handler");
        return;
    }
    tracing::info!("received shutdown signal");
}
