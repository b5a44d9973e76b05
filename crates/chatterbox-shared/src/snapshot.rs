//! Remembered-login snapshot.
//!
//! After a successful login the server can hand the browser a sealed
//! [`CredentialSnapshot`]. It holds only the username and the time it was
//! issued, encrypted under a key derived from the server's session secret.
//! Because the key is derived rather than generated, snapshots survive a
//! restart as long as the secret does.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::KDF_CONTEXT_REMEMBER_KEY;
use crate::crypto::{decrypt, derive_key_from_secret, encrypt, SymmetricKey};
use crate::error::{ChatterboxError, CryptoError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialSnapshot {
    pub username: String,
    pub issued_at: DateTime<Utc>,
}

impl CredentialSnapshot {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            issued_at: Utc::now(),
        }
    }
}

/// Seals and opens snapshots with one stable key.
#[derive(Clone)]
pub struct SnapshotSealer {
    key: SymmetricKey,
    max_age: Duration,
}

impl SnapshotSealer {
    pub fn new(secret: &[u8], max_age: Duration) -> Self {
        Self {
            key: derive_key_from_secret(secret, KDF_CONTEXT_REMEMBER_KEY),
            max_age,
        }
    }

    /// Encrypt a snapshot; the result is hex(nonce || ciphertext).
    pub fn seal(&self, snapshot: &CredentialSnapshot) -> Result<String, ChatterboxError> {
        let plaintext = serde_json::to_vec(snapshot)?;
        let sealed = encrypt(&self.key, &plaintext)?;
        Ok(hex::encode(sealed))
    }

    /// Decrypt a sealed snapshot and reject it once it is older than the
    /// configured maximum age.
    pub fn open(&self, sealed: &str) -> Result<CredentialSnapshot, ChatterboxError> {
        let bytes = hex::decode(sealed.trim()).map_err(CryptoError::from)?;
        let plaintext = decrypt(&self.key, &bytes)?;
        let snapshot: CredentialSnapshot = serde_json::from_slice(&plaintext)?;

        if Utc::now() - snapshot.issued_at > self.max_age {
            return Err(CryptoError::Expired.into());
        }
        Ok(snapshot)
    }
}
