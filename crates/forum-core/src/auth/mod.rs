//! Session token codec.
//!
//! The plaintext token is the bearer credential held by the client in its
//! cookie. Only the SHA-256 digest of it is ever persisted or compared, so a
//! storage dump cannot be replayed as credentials.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Random bytes per token (256 bits)
pub const TOKEN_BYTES: usize = 32;

/// Plaintext bearer token as handed to the client.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a new token from the operating system's entropy source.
    pub fn generate() -> Result<Self> {
        let mut raw = [0u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut raw)
            .map_err(|e| Error::Entropy(e.to_string()))?;
        Ok(Self(URL_SAFE_NO_PAD.encode(raw)))
    }

    /// Wrap a token received from a client.
    pub fn from_plain(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The plaintext value, for the cookie only.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// One-way lookup digest of this token.
    pub fn hash(&self) -> TokenHash {
        hash_token(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Never print the credential.
impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// Hex-encoded SHA-256 digest of a plaintext token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenHash(String);

impl TokenHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rehydrate a digest read back from storage.
    pub fn from_stored(hex_digest: impl Into<String>) -> Self {
        Self(hex_digest.into())
    }
}

impl std::fmt::Display for TokenHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short prefix is enough to correlate log lines.
        f.write_str(&self.0[..self.0.len().min(8)])
    }
}

/// Hash a plaintext token using SHA-256 and return it as hex
pub fn hash_token(plain: &str) -> TokenHash {
    let mut hasher = Sha256::new();
    hasher.update(plain.as_bytes());
    TokenHash(hex::encode(hasher.finalize()))
}
