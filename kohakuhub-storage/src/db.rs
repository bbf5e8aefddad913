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

//! Metadata store: namespaces, repositories, memberships, commit log,
//! LFS object history, invitations, SSH keys, fallback sources, and API
//! credentials (spec §3, §4.6 "credential store"). Backed by `rusqlite`
//! in WAL mode; every write that touches more than one table runs inside
//! a transaction so a crash never leaves a repo without its namespace row
//! or a commit without its log entry.

use kohakuhub_core::error::{KohakuError, Result};
use kohakuhub_core::fallback::{FallbackSource, SourceType};
use kohakuhub_core::invitation::{Invitation, InvitationAction};
use kohakuhub_core::namespace::{Namespace, NamespaceKey, Role};
use kohakuhub_core::quota::QuotaLimit;
use kohakuhub_core::repo::{RepoId, RepoType, Repository};
use kohakuhub_core::ssh_key::{SshAlgorithm, SshKey};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

pub struct MetadataStore {
    conn: Mutex<Connection>,
}

impl MetadataStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(map_sqlite_err)?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(map_sqlite_err)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(map_sqlite_err)?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(map_sqlite_err)?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS namespaces (
                name TEXT NOT NULL,
                is_org INTEGER NOT NULL,
                private_quota_bytes INTEGER,
                public_quota_bytes INTEGER,
                private_used_bytes INTEGER NOT NULL DEFAULT 0,
                public_used_bytes INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (name, is_org)
            );

            CREATE TABLE IF NOT EXISTS memberships (
                namespace TEXT NOT NULL,
                user TEXT NOT NULL,
                role TEXT NOT NULL,
                PRIMARY KEY (namespace, user)
            );

            CREATE TABLE IF NOT EXISTS repositories (
                repo_type TEXT NOT NULL,
                namespace TEXT NOT NULL,
                name TEXT NOT NULL,
                private INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (repo_type, namespace, name)
            );

            CREATE TABLE IF NOT EXISTS commit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                repo TEXT NOT NULL,
                revision TEXT NOT NULL,
                author_user TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                message TEXT NOT NULL,
                parent TEXT
            );

            CREATE TABLE IF NOT EXISTS lfs_object_history (
                oid TEXT NOT NULL,
                repo_type TEXT NOT NULL,
                namespace TEXT NOT NULL,
                name TEXT NOT NULL,
                size INTEGER NOT NULL,
                first_seen TEXT NOT NULL,
                PRIMARY KEY (oid, repo_type, namespace, name)
            );

            CREATE TABLE IF NOT EXISTS invitations (
                token TEXT PRIMARY KEY,
                action_json TEXT NOT NULL,
                created_by TEXT NOT NULL,
                max_usage INTEGER NOT NULL,
                usage_count INTEGER NOT NULL DEFAULT 0,
                expires_at TEXT NOT NULL,
                email TEXT
            );

            CREATE TABLE IF NOT EXISTS ssh_keys (
                user TEXT NOT NULL,
                fingerprint_sha256 TEXT NOT NULL,
                algorithm TEXT NOT NULL,
                public_key_body TEXT NOT NULL,
                comment TEXT,
                created_at TEXT NOT NULL,
                PRIMARY KEY (user, fingerprint_sha256)
            );

            CREATE TABLE IF NOT EXISTS fallback_sources (
                name TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                source_type TEXT NOT NULL,
                priority INTEGER NOT NULL,
                token TEXT,
                namespace TEXT,
                enabled INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS api_tokens (
                token_hash TEXT PRIMARY KEY,
                user TEXT NOT NULL,
                platform_admin INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                last_used_at TEXT
            );
            "#,
        )
        .map_err(map_sqlite_err)
    }

    // --- Namespaces ---------------------------------------------------

    pub fn upsert_namespace(&self, namespace: &Namespace) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO namespaces (name, is_org, private_quota_bytes, public_quota_bytes, private_used_bytes, public_used_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name, is_org) DO UPDATE SET
                private_quota_bytes = excluded.private_quota_bytes,
                public_quota_bytes = excluded.public_quota_bytes",
            params![
                namespace.key.name,
                namespace.key.is_org,
                quota_to_sql(namespace.private_quota_bytes),
                quota_to_sql(namespace.public_quota_bytes),
                namespace.private_used_bytes,
                namespace.public_used_bytes,
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    pub fn get_namespace(&self, key: &NamespaceKey) -> Result<Option<Namespace>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT private_quota_bytes, public_quota_bytes, private_used_bytes, public_used_bytes
             FROM namespaces WHERE name = ?1 AND is_org = ?2",
            params![key.name, key.is_org],
            |row| {
                Ok(Namespace {
                    key: key.clone(),
                    private_quota_bytes: quota_from_sql(row.get(0)?),
                    public_quota_bytes: quota_from_sql(row.get(1)?),
                    private_used_bytes: row.get(2)?,
                    public_used_bytes: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(map_sqlite_err)
    }

    pub fn upsert_membership(&self, namespace: &str, user: &str, role: Role) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO memberships (namespace, user, role) VALUES (?1, ?2, ?3)
             ON CONFLICT(namespace, user) DO UPDATE SET role = excluded.role",
            params![namespace, user, role_to_sql(role)],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    pub fn get_role(&self, namespace: &str, user: &str) -> Result<Option<Role>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT role FROM memberships WHERE namespace = ?1 AND user = ?2",
            params![namespace, user],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(map_sqlite_err)?
        .map(|s| role_from_sql(&s))
        .transpose()
    }

    // --- Repositories ---------------------------------------------------

    pub fn insert_repository(&self, repo: &Repository) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO repositories (repo_type, namespace, name, private, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                repo.id.repo_type.as_str(),
                repo.id.namespace,
                repo.id.name,
                repo.private,
                repo.created_at.to_rfc3339(),
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    pub fn get_repository(&self, id: &RepoId) -> Result<Option<Repository>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT private, created_at FROM repositories WHERE repo_type = ?1 AND namespace = ?2 AND name = ?3",
            params![id.repo_type.as_str(), id.namespace, id.name],
            |row| {
                let created_at: String = row.get(1)?;
                Ok(Repository {
                    id: id.clone(),
                    private: row.get(0)?,
                    created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                        .map(|dt| dt.with_timezone(&chrono::Utc))
                        .unwrap_or_else(|_| chrono::Utc::now()),
                })
            },
        )
        .optional()
        .map_err(map_sqlite_err)
    }

    pub fn set_repository_visibility(&self, id: &RepoId, private: bool) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE repositories SET private = ?1 WHERE repo_type = ?2 AND namespace = ?3 AND name = ?4",
                params![private, id.repo_type.as_str(), id.namespace, id.name],
            )
            .map_err(map_sqlite_err)?;
        if changed == 0 {
            return Err(KohakuError::not_found(format!("repository {id}")));
        }
        Ok(())
    }

    pub fn delete_repository(&self, id: &RepoId) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM repositories WHERE repo_type = ?1 AND namespace = ?2 AND name = ?3",
            params![id.repo_type.as_str(), id.namespace, id.name],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    /// All repositories of `repo_type` owned by `namespace`, used by quota
    /// `recompute` to re-sum ground truth from scratch (spec §4.7).
    pub fn list_repositories_in_namespace(&self, namespace: &str, repo_type: RepoType) -> Result<Vec<Repository>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT name, private, created_at FROM repositories WHERE repo_type = ?1 AND namespace = ?2")
            .map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(params![repo_type.as_str(), namespace], |row| {
                let name: String = row.get(0)?;
                let private: bool = row.get(1)?;
                let created_at: String = row.get(2)?;
                Ok((name, private, created_at))
            })
            .map_err(map_sqlite_err)?;

        let mut repos = Vec::new();
        for row in rows {
            let (name, private, created_at) = row.map_err(map_sqlite_err)?;
            repos.push(Repository {
                id: RepoId::new(repo_type, namespace, name),
                private,
                created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&chrono::Utc))
                    .unwrap_or_else(|_| chrono::Utc::now()),
            });
        }
        Ok(repos)
    }

    // --- Commit log -----------------------------------------------------

    pub fn insert_commit_log(&self, entry: &kohakuhub_core::commit_log::CommitLogEntry) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO commit_log (repo, revision, author_user, timestamp, message, parent)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.repo,
                entry.revision,
                entry.author,
                entry.timestamp.to_rfc3339(),
                entry.message,
                entry.parent,
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    pub fn list_commit_log(&self, repo: &str) -> Result<Vec<kohakuhub_core::commit_log::CommitLogEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT revision, author_user, timestamp, message, parent FROM commit_log
                 WHERE repo = ?1 ORDER BY id DESC",
            )
            .map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(params![repo], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })
            .map_err(map_sqlite_err)?;

        let mut entries = Vec::new();
        for row in rows {
            let (revision, author, timestamp, message, parent) = row.map_err(map_sqlite_err)?;
            entries.push(kohakuhub_core::commit_log::CommitLogEntry {
                repo: repo.to_string(),
                revision,
                author,
                timestamp: chrono::DateTime::parse_from_rfc3339(&timestamp)
                    .map(|dt| dt.with_timezone(&chrono::Utc))
                    .unwrap_or_else(|_| chrono::Utc::now()),
                message,
                parent,
            });
        }
        Ok(entries)
    }

    // --- LFS object history ----------------------------------------------

    pub fn record_lfs_usage(&self, oid: &str, repo: &RepoId, size: u64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO lfs_object_history (oid, repo_type, namespace, name, size, first_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(oid, repo_type, namespace, name) DO NOTHING",
            params![
                oid,
                repo.repo_type.as_str(),
                repo.namespace,
                repo.name,
                size as i64,
                chrono::Utc::now().to_rfc3339(),
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    /// Whether any repository other than `except` still references `oid`
    /// (used by GC to decide whether a blob can be deleted, spec §4.5).
    pub fn lfs_object_has_other_referrers(&self, oid: &str, except: &RepoId) -> Result<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM lfs_object_history
                 WHERE oid = ?1 AND NOT (repo_type = ?2 AND namespace = ?3 AND name = ?4)",
                params![oid, except.repo_type.as_str(), except.namespace, except.name],
                |row| row.get(0),
            )
            .map_err(map_sqlite_err)?;
        Ok(count > 0)
    }

    // --- Invitations ------------------------------------------------------

    pub fn insert_invitation(&self, invitation: &Invitation) -> Result<()> {
        let conn = self.conn.lock();
        let action_json = serde_json::to_string(&invitation.action)?;
        conn.execute(
            "INSERT INTO invitations (token, action_json, created_by, max_usage, usage_count, expires_at, email)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                invitation.token,
                action_json,
                invitation.created_by,
                invitation.max_usage,
                invitation.usage_count,
                invitation.expires_at.to_rfc3339(),
                invitation.email,
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    pub fn get_invitation(&self, token: &str) -> Result<Option<Invitation>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT action_json, created_by, max_usage, usage_count, expires_at, email FROM invitations WHERE token = ?1",
            params![token],
            |row| {
                let action_json: String = row.get(0)?;
                let expires_at: String = row.get(4)?;
                Ok((action_json, row.get::<_, String>(1)?, row.get::<_, i64>(2)?, row.get::<_, i64>(3)?, expires_at, row.get::<_, Option<String>>(5)?))
            },
        )
        .optional()
        .map_err(map_sqlite_err)?
        .map(|(action_json, created_by, max_usage, usage_count, expires_at, email)| {
            let action: InvitationAction = serde_json::from_str(&action_json)?;
            Ok(Invitation {
                token: token.to_string(),
                action,
                created_by,
                max_usage,
                usage_count,
                expires_at: chrono::DateTime::parse_from_rfc3339(&expires_at)
                    .map(|dt| dt.with_timezone(&chrono::Utc))
                    .map_err(|e| KohakuError::internal(format!("corrupt invitation timestamp: {e}")))?,
                email,
            })
        })
        .transpose()
    }

    /// Increments usage atomically and returns whether the invitation was
    /// still available at the moment of increment (spec §3, §4.11). `-1`
    /// in `max_usage` means unlimited.
    pub fn try_redeem_invitation(&self, token: &str, now: chrono::DateTime<chrono::Utc>) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE invitations SET usage_count = usage_count + 1
                 WHERE token = ?1 AND expires_at > ?2 AND (max_usage = -1 OR usage_count < max_usage)",
                params![token, now.to_rfc3339()],
            )
            .map_err(map_sqlite_err)?;
        Ok(changed > 0)
    }

    /// Deletes an invitation outright, making it unavailable immediately
    /// regardless of remaining usage or expiry (spec §4.11).
    pub fn delete_invitation(&self, token: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn
            .execute("DELETE FROM invitations WHERE token = ?1", params![token])
            .map_err(map_sqlite_err)?;
        Ok(changed > 0)
    }

    // --- SSH keys -----------------------------------------------------------

    pub fn insert_ssh_key(&self, key: &SshKey) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO ssh_keys (user, fingerprint_sha256, algorithm, public_key_body, comment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key.user,
                key.fingerprint_sha256,
                algorithm_to_sql(key.algorithm),
                key.public_key_body,
                key.comment,
                key.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation => {
                KohakuError::conflict(format!("key already registered for user {}", key.user))
            }
            other => map_sqlite_err(other),
        })?;
        Ok(())
    }

    pub fn list_ssh_keys(&self, user: &str) -> Result<Vec<SshKey>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT fingerprint_sha256, algorithm, public_key_body, comment, created_at FROM ssh_keys WHERE user = ?1")
            .map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(params![user], |row| {
                let algorithm: String = row.get(1)?;
                let created_at: String = row.get(4)?;
                Ok((
                    row.get::<_, String>(0)?,
                    algorithm,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    created_at,
                ))
            })
            .map_err(map_sqlite_err)?;

        let mut keys = Vec::new();
        for row in rows {
            let (fingerprint_sha256, algorithm, public_key_body, comment, created_at) = row.map_err(map_sqlite_err)?;
            keys.push(SshKey {
                user: user.to_string(),
                algorithm: algorithm_from_sql(&algorithm)?,
                public_key_body,
                fingerprint_sha256,
                comment,
                created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&chrono::Utc))
                    .unwrap_or_else(|_| chrono::Utc::now()),
            });
        }
        Ok(keys)
    }

    /// Removes a key by its fingerprint, scoped to `user` so one user
    /// cannot revoke another's key by guessing a fingerprint.
    pub fn delete_ssh_key(&self, user: &str, fingerprint_sha256: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "DELETE FROM ssh_keys WHERE user = ?1 AND fingerprint_sha256 = ?2",
                params![user, fingerprint_sha256],
            )
            .map_err(map_sqlite_err)?;
        Ok(changed > 0)
    }

    // --- Fallback sources -------------------------------------------------

    pub fn upsert_fallback_source(&self, source: &FallbackSource) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO fallback_sources (name, url, source_type, priority, token, namespace, enabled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(name) DO UPDATE SET
                url = excluded.url, source_type = excluded.source_type, priority = excluded.priority,
                token = excluded.token, namespace = excluded.namespace, enabled = excluded.enabled",
            params![
                source.name,
                source.url,
                source_type_to_sql(source.source_type),
                source.priority,
                source.token,
                source.namespace,
                source.enabled,
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    pub fn list_fallback_sources(&self) -> Result<Vec<FallbackSource>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT name, url, source_type, priority, token, namespace, enabled FROM fallback_sources ORDER BY priority ASC")
            .map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, bool>(6)?,
                ))
            })
            .map_err(map_sqlite_err)?;

        let mut sources = Vec::new();
        for row in rows {
            let (name, url, source_type, priority, token, namespace, enabled) = row.map_err(map_sqlite_err)?;
            sources.push(FallbackSource {
                name,
                url,
                source_type: source_type_from_sql(&source_type)?,
                priority,
                token,
                namespace,
                enabled,
            });
        }
        Ok(sources)
    }

    // --- API credentials --------------------------------------------------

    /// Registers a new token. Callers pass the hash, never the raw secret —
    /// the raw token is shown to the user exactly once at creation time.
    pub fn create_token(&self, token_hash: &str, user: &str, platform_admin: bool) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO api_tokens (token_hash, user, platform_admin, created_at, last_used_at)
             VALUES (?1, ?2, ?3, ?4, NULL)",
            params![token_hash, user, platform_admin, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    /// Validates `token_hash` against the credential store and, on success,
    /// updates `last_used_at` (spec §4.6: "its `lastUsed` is updated").
    pub fn validate_token(&self, token_hash: &str, now: chrono::DateTime<chrono::Utc>) -> Result<Option<(String, bool)>> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT user, platform_admin FROM api_tokens WHERE token_hash = ?1",
                params![token_hash],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)),
            )
            .optional()
            .map_err(map_sqlite_err)?;
        if found.is_some() {
            conn.execute(
                "UPDATE api_tokens SET last_used_at = ?1 WHERE token_hash = ?2",
                params![now.to_rfc3339(), token_hash],
            )
            .map_err(map_sqlite_err)?;
        }
        Ok(found)
    }

    pub fn revoke_token(&self, token_hash: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM api_tokens WHERE token_hash = ?1", params![token_hash])
            .map_err(map_sqlite_err)?;
        Ok(())
    }
}

fn quota_to_sql(limit: QuotaLimit) -> Option<i64> {
    match limit {
        QuotaLimit::Unlimited => None,
        QuotaLimit::Bytes(n) => Some(n),
    }
}

fn quota_from_sql(value: Option<i64>) -> QuotaLimit {
    match value {
        Some(n) => QuotaLimit::Bytes(n),
        None => QuotaLimit::Unlimited,
    }
}

fn role_to_sql(role: Role) -> &'static str {
    match role {
        Role::Visitor => "visitor",
        Role::Member => "member",
        Role::Admin => "admin",
        Role::SuperAdmin => "super_admin",
    }
}

fn role_from_sql(s: &str) -> Result<Role> {
    match s {
        "visitor" => Ok(Role::Visitor),
        "member" => Ok(Role::Member),
        "admin" => Ok(Role::Admin),
        "super_admin" => Ok(Role::SuperAdmin),
        other => Err(KohakuError::internal(format!("corrupt role in database: {other}"))),
    }
}

fn algorithm_to_sql(algorithm: SshAlgorithm) -> &'static str {
    algorithm.wire_name()
}

fn algorithm_from_sql(s: &str) -> Result<SshAlgorithm> {
    SshAlgorithm::from_wire_name(s).ok_or_else(|| KohakuError::internal(format!("corrupt ssh algorithm in database: {s}")))
}

fn source_type_to_sql(source_type: SourceType) -> &'static str {
    match source_type {
        SourceType::Huggingface => "huggingface",
        SourceType::Kohakuhub => "kohakuhub",
    }
}

fn source_type_from_sql(s: &str) -> Result<SourceType> {
    match s {
        "huggingface" => Ok(SourceType::Huggingface),
        "kohakuhub" => Ok(SourceType::Kohakuhub),
        other => Err(KohakuError::internal(format!("corrupt source type in database: {other}"))),
    }
}

fn map_sqlite_err(e: rusqlite::Error) -> KohakuError {
    KohakuError::TransientBackend(format!("sqlite: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kohakuhub_core::namespace::NamespaceKey;
    use kohakuhub_core::quota::QuotaLimit;

    fn ns_key() -> NamespaceKey {
        NamespaceKey { name: "alice".into(), is_org: false }
    }

    #[test]
    fn namespace_round_trips() {
        let store = MetadataStore::open_in_memory().unwrap();
        let ns = Namespace {
            key: ns_key(),
            private_quota_bytes: QuotaLimit::Bytes(1000),
            public_quota_bytes: QuotaLimit::Unlimited,
            private_used_bytes: 0,
            public_used_bytes: 0,
        };
        store.upsert_namespace(&ns).unwrap();
        let fetched = store.get_namespace(&ns_key()).unwrap().unwrap();
        assert_eq!(fetched.private_quota_bytes, QuotaLimit::Bytes(1000));
        assert_eq!(fetched.public_quota_bytes, QuotaLimit::Unlimited);
    }

    #[test]
    fn membership_round_trips() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.upsert_membership("acme", "alice", Role::Admin).unwrap();
        assert_eq!(store.get_role("acme", "alice").unwrap(), Some(Role::Admin));
        assert_eq!(store.get_role("acme", "bob").unwrap(), None);
    }

    #[test]
    fn repository_insert_and_visibility_flip() {
        let store = MetadataStore::open_in_memory().unwrap();
        let id = RepoId { repo_type: RepoType::Model, namespace: "alice".into(), name: "demo".into() };
        store
            .insert_repository(&Repository { id: id.clone(), private: false, created_at: chrono::Utc::now() })
            .unwrap();
        store.set_repository_visibility(&id, true).unwrap();
        assert!(store.get_repository(&id).unwrap().unwrap().private);
    }

    #[test]
    fn lists_repositories_scoped_to_namespace_and_type() {
        let store = MetadataStore::open_in_memory().unwrap();
        for (ns, name, ty) in [
            ("alice", "m1", RepoType::Model),
            ("alice", "m2", RepoType::Model),
            ("alice", "d1", RepoType::Dataset),
            ("bob", "m3", RepoType::Model),
        ] {
            store
                .insert_repository(&Repository {
                    id: RepoId { repo_type: ty, namespace: ns.into(), name: name.into() },
                    private: false,
                    created_at: chrono::Utc::now(),
                })
                .unwrap();
        }
        let models = store.list_repositories_in_namespace("alice", RepoType::Model).unwrap();
        assert_eq!(models.len(), 2);
        let datasets = store.list_repositories_in_namespace("alice", RepoType::Dataset).unwrap();
        assert_eq!(datasets.len(), 1);
        let bobs = store.list_repositories_in_namespace("bob", RepoType::Model).unwrap();
        assert_eq!(bobs.len(), 1);
    }

    #[test]
    fn invitation_redemption_respects_max_usage() {
        let store = MetadataStore::open_in_memory().unwrap();
        let invitation = Invitation {
            token: "tok-1".into(),
            action: InvitationAction::RegisterAccount { org_id: None, role: Some(Role::Member) },
            created_by: "admin".into(),
            max_usage: 1,
            usage_count: 0,
            expires_at: chrono::Utc::now() + chrono::Duration::days(1),
            email: None,
        };
        store.insert_invitation(&invitation).unwrap();
        let now = chrono::Utc::now();
        assert!(store.try_redeem_invitation("tok-1", now).unwrap());
        assert!(!store.try_redeem_invitation("tok-1", now).unwrap());
    }

    #[test]
    fn ssh_key_uniqueness_per_user() {
        let store = MetadataStore::open_in_memory().unwrap();
        let key = SshKey {
            user: "alice".into(),
            algorithm: SshAlgorithm::SshEd25519,
            public_key_body: "AAAA".into(),
            fingerprint_sha256: "fp1".into(),
            comment: None,
            created_at: chrono::Utc::now(),
        };
        store.insert_ssh_key(&key).unwrap();
        assert!(store.insert_ssh_key(&key).is_err());
        assert_eq!(store.list_ssh_keys("alice").unwrap().len(), 1);
    }

    #[test]
    fn fallback_sources_ordered_by_priority() {
        let store = MetadataStore::open_in_memory().unwrap();
        store
            .upsert_fallback_source(&FallbackSource {
                name: "hf".into(),
                url: "https://huggingface.co".into(),
                source_type: SourceType::Huggingface,
                priority: 2,
                token: None,
                namespace: None,
                enabled: true,
            })
            .unwrap();
        store
            .upsert_fallback_source(&FallbackSource {
                name: "mirror".into(),
                url: "https://mirror.local".into(),
                source_type: SourceType::Kohakuhub,
                priority: 1,
                token: None,
                namespace: None,
                enabled: true,
            })
            .unwrap();
        let sources = store.list_fallback_sources().unwrap();
        assert_eq!(sources[0].name, "mirror");
    }

    #[test]
    fn token_validation_updates_last_used() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.create_token("hash-1", "alice", false).unwrap();
        let now = chrono::Utc::now();
        let (user, platform_admin) = store.validate_token("hash-1", now).unwrap().unwrap();
        assert_eq!(user, "alice");
        assert!(!platform_admin);
        assert!(store.validate_token("unknown-hash", now).unwrap().is_none());
    }

    #[test]
    fn revoked_token_no_longer_validates() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.create_token("hash-2", "bob", true).unwrap();
        store.revoke_token("hash-2").unwrap();
        assert!(store.validate_token("hash-2", chrono::Utc::now()).unwrap().is_none());
    }
}
