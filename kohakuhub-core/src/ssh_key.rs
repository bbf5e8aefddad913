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

//! SSH public key registry (C10, spec §4.10).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SshAlgorithm {
    SshRsa,
    SshDss,
    EcdsaSha2NistP256,
    EcdsaSha2NistP384,
    EcdsaSha2NistP521,
    SshEd25519,
}

impl SshAlgorithm {
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "ssh-rsa" => Some(Self::SshRsa),
            "ssh-dss" => Some(Self::SshDss),
            "ecdsa-sha2-nistp256" => Some(Self::EcdsaSha2NistP256),
            "ecdsa-sha2-nistp384" => Some(Self::EcdsaSha2NistP384),
            "ecdsa-sha2-nistp521" => Some(Self::EcdsaSha2NistP521),
            "ssh-ed25519" => Some(Self::SshEd25519),
            _ => None,
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            Self::SshRsa => "ssh-rsa",
            Self::SshDss => "ssh-dss",
            Self::EcdsaSha2NistP256 => "ecdsa-sha2-nistp256",
            Self::EcdsaSha2NistP384 => "ecdsa-sha2-nistp384",
            Self::EcdsaSha2NistP521 => "ecdsa-sha2-nistp521",
            Self::SshEd25519 => "ssh-ed25519",
        }
    }

    /// Minimum plausible decoded-body length for this algorithm, used as a
    /// cheap sanity check (the wire format embeds its own type string, so a
    /// body shorter than this cannot be well-formed).
    fn min_body_len(self) -> usize {
        match self {
            Self::SshEd25519 => 51,  // "ssh-ed25519" + 32-byte key, length-prefixed
            Self::SshRsa => 50,
            Self::SshDss => 50,
            Self::EcdsaSha2NistP256 | Self::EcdsaSha2NistP384 | Self::EcdsaSha2NistP521 => 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKey {
    pub user: String,
    pub algorithm: SshAlgorithm,
    pub public_key_body: String, // base64, as submitted
    pub fingerprint_sha256: String, // base64(SHA256(decoded_body))
    pub comment: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SshKeyError {
    #[error("malformed SSH public key: expected '<algorithm> <base64> [comment]'")]
    Malformed,
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("invalid base64 body: {0}")]
    InvalidBase64(String),
    #[error("key body too short for algorithm {0}")]
    TooShort(&'static str),
    #[error("key claims algorithm {claimed} but the key body is encoded as {embedded}")]
    AlgorithmMismatch { claimed: &'static str, embedded: String },
}

/// Reads the wire format's leading length-prefixed type string (the same
/// field `ssh-keygen`/OpenSSH embed at the start of every public key
/// body), so a claimed algorithm can be checked against what the body
/// actually encodes rather than trusted at face value.
fn embedded_type(decoded: &[u8]) -> Option<&str> {
    if decoded.len() < 4 {
        return None;
    }
    let len = u32::from_be_bytes([decoded[0], decoded[1], decoded[2], decoded[3]]) as usize;
    if decoded.len() < 4 + len {
        return None;
    }
    std::str::from_utf8(&decoded[4..4 + len]).ok()
}

/// Parses `"ssh-ed25519 AAAA... comment"`, decodes and sanity-checks the
/// body for the claimed algorithm, and computes the SHA256 fingerprint
/// (base64) (spec §4.10).
pub fn parse_public_key(user: &str, line: &str) -> Result<SshKey, SshKeyError> {
    let line = line.trim();
    let mut parts = line.splitn(3, ' ');
    let algo_str = parts.next().ok_or(SshKeyError::Malformed)?;
    let body = parts.next().ok_or(SshKeyError::Malformed)?;
    let comment = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    let algorithm = SshAlgorithm::from_wire_name(algo_str)
        .ok_or_else(|| SshKeyError::UnsupportedAlgorithm(algo_str.to_string()))?;

    let decoded = STANDARD
        .decode(body)
        .map_err(|e| SshKeyError::InvalidBase64(e.to_string()))?;

    if decoded.len() < algorithm.min_body_len() {
        return Err(SshKeyError::TooShort(algorithm.wire_name()));
    }

    let embedded = embedded_type(&decoded).ok_or(SshKeyError::TooShort(algorithm.wire_name()))?;
    if embedded != algorithm.wire_name() {
        return Err(SshKeyError::AlgorithmMismatch {
            claimed: algorithm.wire_name(),
            embedded: embedded.to_string(),
        });
    }

    let mut hasher = Sha256::new();
    hasher.update(&decoded);
    let fingerprint_sha256 = STANDARD.encode(hasher.finalize());

    Ok(SshKey {
        user: user.to_string(),
        algorithm,
        public_key_body: body.to_string(),
        fingerprint_sha256,
        comment,
        created_at: chrono::Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_ed25519_line() -> String {
        // 4-byte length + "ssh-ed25519" + 4-byte length + 32 zero bytes,
        // long enough to pass the sanity-length check.
        let mut body = Vec::new();
        body.extend_from_slice(&11u32.to_be_bytes());
        body.extend_from_slice(b"ssh-ed25519");
        body.extend_from_slice(&32u32.to_be_bytes());
        body.extend_from_slice(&[0u8; 32]);
        format!("ssh-ed25519 {} test@host", STANDARD.encode(&body))
    }

    #[test]
    fn parses_well_formed_ed25519_key() {
        let key = parse_public_key("alice", &fake_ed25519_line()).unwrap();
        assert_eq!(key.algorithm, SshAlgorithm::SshEd25519);
        assert_eq!(key.comment.as_deref(), Some("test@host"));
        assert!(!key.fingerprint_sha256.is_empty());
    }

    #[test]
    fn rejects_unknown_algorithm() {
        let err = parse_public_key("alice", "ssh-made-up AAAA==").unwrap_err();
        assert!(matches!(err, SshKeyError::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(matches!(
            parse_public_key("alice", "just-one-token"),
            Err(SshKeyError::Malformed)
        ));
    }

    #[test]
    fn rejects_algorithm_mismatch_between_claim_and_body() {
        // claims ssh-ed25519 but the embedded type string says ssh-rsa
        let mut body = Vec::new();
        body.extend_from_slice(&7u32.to_be_bytes());
        body.extend_from_slice(b"ssh-rsa");
        body.extend_from_slice(&32u32.to_be_bytes());
        body.extend_from_slice(&[0u8; 32]);
        let line = format!("ssh-ed25519 {} test@host", STANDARD.encode(&body));

        let err = parse_public_key("alice", &line).unwrap_err();
        assert!(matches!(err, SshKeyError::AlgorithmMismatch { .. }));
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let line = fake_ed25519_line();
        let a = parse_public_key("alice", &line).unwrap();
        let b = parse_public_key("alice", &line).unwrap();
        assert_eq!(a.fingerprint_sha256, b.fingerprint_sha256);
    }
}
