use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Errors produced by the common-crypto helpers.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid HMAC key length")]
    InvalidMacKey,
}

/// A configured secret (API key secret, webhook secret, bot token) that is
/// wiped on drop and never printed.
#[derive(Clone, Default)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString(***redacted***)")
    }
}

/// Hex-encoded HMAC-SHA256 of `payload` under `secret`.
pub fn sign_hex(secret: &[u8], payload: &[u8]) -> Result<String, CryptoError> {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(secret).map_err(|_| CryptoError::InvalidMacKey)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time comparison of a provided hex signature against the expected
/// HMAC of `payload`. Case of the provided hex is ignored.
pub fn verify_hex_signature(secret: &[u8], payload: &[u8], provided: &str) -> bool {
    let expected = match sign_hex(secret, payload) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    let provided = provided.trim().to_ascii_lowercase();
    expected.as_bytes().ct_eq(provided.as_bytes()).unwrap_u8() == 1
}

/// SHA-256 hex digest, used to compare API keys against configured hashes.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// `len` lowercase hex characters from the OS RNG.
pub fn random_suffix(len: usize) -> String {
    let mut bytes = vec![0u8; len.div_ceil(2)];
    OsRng.fill_bytes(&mut bytes);
    let mut out = hex::encode(bytes);
    out.truncate(len);
    out
}
