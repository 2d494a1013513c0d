use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::snapshot::BoardSnapshot;

/// SHA-256 over the serialized snapshot, used as the combined-load ETag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotFingerprint(pub String);

impl SnapshotFingerprint {
    pub fn of(snapshot: &BoardSnapshot) -> Self {
        let mut hasher = Sha256::new();
        // Struct field order is fixed, so the encoding is deterministic.
        match serde_json::to_vec(snapshot) {
            Ok(bytes) => hasher.update(&bytes),
            Err(e) => {
                log::warn!(target: "corkboard.fingerprint", "Failed to encode snapshot: {}", e);
                hasher.update(snapshot.board.id.0.to_le_bytes());
                hasher.update(snapshot.board.updated_at.to_le_bytes());
            }
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Quoted form for the `ETag` / `If-None-Match` headers.
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Parse an `ETag` header value, accepting weak validators.
    pub fn from_etag(value: &str) -> Option<Self> {
        let value = value.trim();
        let value = value.strip_prefix("W/").unwrap_or(value);
        let inner = value.strip_prefix('"')?.strip_suffix('"')?;
        if inner.is_empty() {
            return None;
        }
        Some(Self(inner.to_string()))
    }
}
