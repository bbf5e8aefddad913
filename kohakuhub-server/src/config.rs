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

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// KohakuHub Server Configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub server: HttpServerConfig,
    pub storage: StorageConfig,
    pub s3: S3Config,
    pub auth: AuthConfig,
    #[serde(default)]
    pub lfs: LfsConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_addr")]
    pub listen_addr: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Path to the sqlite metadata database. `:memory:` runs fully in-process.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Default branch/commit backend used when a repo has no override.
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3Config {
    pub endpoint: String,
    /// Endpoint embedded in presigned URLs returned to clients; may differ
    /// from `endpoint` when the server reaches S3 over an internal network
    /// (spec §4.1).
    #[serde(default)]
    pub public_endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// `true` requires every request to carry valid credentials; `false`
    /// runs every request as the platform admin principal (dev only — the
    /// bootstrap refuses to start this way on a non-localhost listen
    /// address, mirroring the teacher's NoAuth security banner).
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LfsConfig {
    #[serde(default = "default_lfs_threshold")]
    pub threshold_bytes: u64,
    #[serde(default = "default_keep_versions")]
    pub keep_versions: u32,
    #[serde(default)]
    pub auto_gc: bool,
}

impl Default for LfsConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: default_lfs_threshold(),
            keep_versions: default_keep_versions(),
            auto_gc: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_fallback_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_fallback_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_fallback_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cache_ttl_secs: default_fallback_cache_ttl(),
            timeout_secs: default_fallback_timeout(),
            max_concurrent: default_fallback_max_concurrent(),
        }
    }
}

fn default_http_addr() -> String {
    "127.0.0.1:48880".to_string()
}

fn default_max_connections() -> usize {
    1000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_enable_cors() -> bool {
    true
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./kohakuhub-data/metadata.db")
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_lfs_threshold() -> u64 {
    kohakuhub_core::lfs::DEFAULT_THRESHOLD_BYTES
}

fn default_keep_versions() -> u32 {
    kohakuhub_core::lfs::DEFAULT_KEEP_VERSIONS
}

fn default_fallback_cache_ttl() -> u64 {
    3600
}

fn default_fallback_timeout() -> u64 {
    10
}

fn default_fallback_max_concurrent() -> usize {
    8
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: HttpServerConfig {
                listen_addr: default_http_addr(),
                max_connections: default_max_connections(),
                request_timeout_secs: default_request_timeout(),
                enable_cors: default_enable_cors(),
                cors_origins: vec![],
            },
            storage: StorageConfig {
                db_path: default_db_path(),
                default_branch: default_branch(),
            },
            s3: S3Config {
                endpoint: "http://127.0.0.1:9000".to_string(),
                public_endpoint: None,
                access_key: "minioadmin".to_string(),
                secret_key: "minioadmin".to_string(),
                bucket: "kohakuhub".to_string(),
                region: default_region(),
            },
            auth: AuthConfig { disabled: false },
            lfs: LfsConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Applies the environment variable surface documented in spec §6.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("KOHAKUHUB_HTTP_ADDR") {
            config.server.listen_addr = addr;
        }
        if let Ok(db) = std::env::var("KOHAKUHUB_DB_PATH") {
            config.storage.db_path = PathBuf::from(db);
        }
        if let Ok(v) = std::env::var("KOHAKUHUB_AUTH_DISABLED") {
            config.auth.disabled = v.parse().unwrap_or(false);
        }

        if let Ok(v) = std::env::var("S3_ENDPOINT") {
            config.s3.endpoint = v;
        }
        if let Ok(v) = std::env::var("S3_PUBLIC_ENDPOINT") {
            config.s3.public_endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("S3_ACCESS_KEY") {
            config.s3.access_key = v;
        }
        if let Ok(v) = std::env::var("S3_SECRET_KEY") {
            config.s3.secret_key = v;
        }
        if let Ok(v) = std::env::var("S3_BUCKET") {
            config.s3.bucket = v;
        }
        if let Ok(v) = std::env::var("S3_REGION") {
            config.s3.region = v;
        }

        if let Ok(v) = std::env::var("LFS_THRESHOLD_BYTES") {
            if let Ok(n) = v.parse() {
                config.lfs.threshold_bytes = n;
            }
        }
        if let Ok(v) = std::env::var("LFS_KEEP_VERSIONS") {
            if let Ok(n) = v.parse() {
                config.lfs.keep_versions = n;
            }
        }
        if let Ok(v) = std::env::var("LFS_AUTO_GC") {
            config.lfs.auto_gc = v.parse().unwrap_or(false);
        }

        if let Ok(v) = std::env::var("FALLBACK_ENABLED") {
            config.fallback.enabled = v.parse().unwrap_or(false);
        }
        if let Ok(v) = std::env::var("FALLBACK_CACHE_TTL") {
            if let Ok(n) = v.parse() {
                config.fallback.cache_ttl_secs = n;
            }
        }
        if let Ok(v) = std::env::var("FALLBACK_TIMEOUT") {
            if let Ok(n) = v.parse() {
                config.fallback.timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("FALLBACK_MAX_CONCURRENT") {
            if let Ok(n) = v.parse() {
                config.fallback.max_concurrent = n;
            }
        }

        config
    }

    /// File values win over defaults; environment variables win over both,
    /// since they are the layer operators reach for in containers.
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };
        config.merge_env_overrides();
        Ok(config)
    }

    fn merge_env_overrides(&mut self) {
        let env = Self::from_env();
        if std::env::var("KOHAKUHUB_HTTP_ADDR").is_ok() {
            self.server.listen_addr = env.server.listen_addr;
        }
        if std::env::var("KOHAKUHUB_DB_PATH").is_ok() {
            self.storage.db_path = env.storage.db_path;
        }
        if std::env::var("KOHAKUHUB_AUTH_DISABLED").is_ok() {
            self.auth.disabled = env.auth.disabled;
        }
        if std::env::var("S3_ENDPOINT").is_ok() {
            self.s3.endpoint = env.s3.endpoint;
        }
        if std::env::var("S3_PUBLIC_ENDPOINT").is_ok() {
            self.s3.public_endpoint = env.s3.public_endpoint;
        }
        if std::env::var("S3_ACCESS_KEY").is_ok() {
            self.s3.access_key = env.s3.access_key;
        }
        if std::env::var("S3_SECRET_KEY").is_ok() {
            self.s3.secret_key = env.s3.secret_key;
        }
        if std::env::var("S3_BUCKET").is_ok() {
            self.s3.bucket = env.s3.bucket;
        }
        if std::env::var("LFS_THRESHOLD_BYTES").is_ok() {
            self.lfs.threshold_bytes = env.lfs.threshold_bytes;
        }
        if std::env::var("LFS_KEEP_VERSIONS").is_ok() {
            self.lfs.keep_versions = env.lfs.keep_versions;
        }
        if std::env::var("LFS_AUTO_GC").is_ok() {
            self.lfs.auto_gc = env.lfs.auto_gc;
        }
        if std::env::var("FALLBACK_ENABLED").is_ok() {
            self.fallback.enabled = env.fallback.enabled;
        }
        if std::env::var("FALLBACK_CACHE_TTL").is_ok() {
            self.fallback.cache_ttl_secs = env.fallback.cache_ttl_secs;
        }
        if std::env::var("FALLBACK_TIMEOUT").is_ok() {
            self.fallback.timeout_secs = env.fallback.timeout_secs;
        }
        if std::env::var("FALLBACK_MAX_CONCURRENT").is_ok() {
            self.fallback.max_concurrent = env.fallback.max_concurrent;
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.listen_addr.parse()?)
    }

    pub fn is_localhost(&self) -> bool {
        self.socket_addr()
            .map(|a| a.ip().is_loopback())
            .unwrap_or(false)
    }

    pub fn public_s3_endpoint(&self) -> &str {
        self.s3.public_endpoint.as_deref().unwrap_or(&self.s3.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_listens_on_loopback() {
        let config = ServerConfig::default();
        assert!(config.is_localhost());
        assert!(!config.auth.disabled);
    }

    #[test]
    fn env_overrides_apply_on_load() {
        std::env::set_var("KOHAKUHUB_HTTP_ADDR", "0.0.0.0:9999");
        std::env::set_var("KOHAKUHUB_AUTH_DISABLED", "true");
        let config = ServerConfig::load(None).unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:9999");
        assert!(config.auth.disabled);
        std::env::remove_var("KOHAKUHUB_HTTP_ADDR");
        std::env::remove_var("KOHAKUHUB_AUTH_DISABLED");
    }
}
