use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hex::encode as hex_encode;
use sha2::{Digest, Sha256};

// path codec
//
// absolute paths appear in urls in two distinct forms with different
// requirements:
//
//   - a reversible token, used to route thumbnail and linked-media requests
//     back to the file they refer to
//   - a bounded, filesystem-safe key used only to name cache entries
//
// the token must carry the entire path losslessly, so it is an encoding and
// not a digest; the cache key must have a fixed maximum length, so it is a
// truncated strong hash and deliberately not reversible

// hex chars kept from the sha-256 digest; 128 bits is far past the point
// where accidental collisions matter for a personal library
const CACHE_KEY_LEN: usize = 32;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TokenError {
    Invalid,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Invalid => write!(f, "malformed path token"),
        }
    }
}

impl std::error::Error for TokenError {}

pub fn encode_path(path: &Path) -> String {
    URL_SAFE_NO_PAD.encode(path.to_string_lossy().as_bytes())
}

pub fn decode_path(token: &str) -> Result<PathBuf, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.as_bytes())
        .map_err(|_| TokenError::Invalid)?;

    let path = String::from_utf8(bytes).map_err(|_| TokenError::Invalid)?;

    if path.is_empty() {
        return Err(TokenError::Invalid);
    }

    Ok(PathBuf::from(path))
}

pub fn cache_key(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());

    let mut digest = hex_encode(hasher.finalize());
    digest.truncate(CACHE_KEY_LEN);
    digest
}
