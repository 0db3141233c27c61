use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::{AuthError, AuthResult};

/// Decoded length of a well-formed API key: one version byte plus the
/// opaque payload minted by provisioning tooling.
pub const API_KEY_LEN: usize = 36;

/// Only key format version currently issued.
pub const API_KEY_VERSION: u8 = 1;

/// Syntactic validation of client API keys.
///
/// The gate only establishes that a key is present and well-formed;
/// cryptographic verification of the key's signature belongs to the
/// identity subsystem behind [`Authenticator`].
///
/// [`Authenticator`]: crate::Authenticator
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiKeyScheme;

impl ApiKeyScheme {
    pub fn new() -> Self {
        Self
    }

    /// Accepts a key iff it is present, base64url without padding, the
    /// right decoded length, and a known format version.
    pub fn check(&self, key: Option<&str>) -> AuthResult<()> {
        let key = key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(AuthError::ApiKeyRequired)?;

        let decoded = URL_SAFE_NO_PAD
            .decode(key)
            .map_err(|_| AuthError::ApiKeyRequired)?;
        if decoded.len() != API_KEY_LEN || decoded[0] != API_KEY_VERSION {
            return Err(AuthError::ApiKeyRequired);
        }
        Ok(())
    }
}

/// Encode a well-formed key from raw payload bytes.
///
/// Used by provisioning tooling and tests; the gateway itself only ever
/// validates.
pub fn encode_key(payload: &[u8; API_KEY_LEN - 1]) -> String {
    let mut raw = Vec::with_capacity(API_KEY_LEN);
    raw.push(API_KEY_VERSION);
    raw.extend_from_slice(payload);
    URL_SAFE_NO_PAD.encode(raw)
}
