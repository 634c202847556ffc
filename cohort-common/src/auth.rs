//! Password hashing and bearer-token primitives
//!
//! No JWT dependency: tokens are signed the same way the rest of the stack
//! hashes things, with SHA-256 over the serialized payload plus the server
//! secret. Token format: `base64url(claims_json) "." hex(sha256(claims_json
//! || secret))`. Verification checks the signature, then the expiry.

use crate::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Token lifetime: one week.
pub const TOKEN_TTL_SECS: i64 = 60 * 60 * 24 * 7;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash a password with a fresh random salt. Stored as `salt$digest`.
pub fn hash_password(password: &str) -> String {
    let salt_bytes: [u8; 16] = rand::thread_rng().gen();
    let salt = URL_SAFE_NO_PAD.encode(salt_bytes);
    let digest = sha256_hex(&format!("{salt}{password}"));
    format!("{salt}${digest}")
}

/// Verify a password against a stored `salt$digest` hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, digest)) = stored.split_once('$') else {
        return false;
    };
    sha256_hex(&format!("{salt}{password}")) == digest
}

/// Issue a signed bearer token for `username`, expiring in
/// [`TOKEN_TTL_SECS`].
pub fn issue_token(username: &str, secret: &str) -> Result<String> {
    issue_token_at(username, secret, chrono::Utc::now().timestamp())
}

/// Issue a token with an explicit issue time. Split out so expiry behavior
/// is testable without a clock.
pub fn issue_token_at(username: &str, secret: &str, issued_at: i64) -> Result<String> {
    let claims = Claims {
        sub: username.to_string(),
        exp: issued_at + TOKEN_TTL_SECS,
    };
    let payload =
        serde_json::to_string(&claims).map_err(|e| Error::Internal(e.to_string()))?;
    let signature = sha256_hex(&format!("{payload}{secret}"));
    Ok(format!("{}.{signature}", URL_SAFE_NO_PAD.encode(&payload)))
}

/// Verify a bearer token and return its subject. `None` on any failure:
/// malformed, bad signature, or expired.
pub fn verify_token(token: &str, secret: &str) -> Option<String> {
    let (payload_b64, signature) = token.split_once('.')?;
    let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let payload = String::from_utf8(payload).ok()?;
    if sha256_hex(&format!("{payload}{secret}")) != signature {
        return None;
    }
    let claims: Claims = serde_json::from_str(&payload).ok()?;
    if claims.exp < chrono::Utc::now().timestamp() {
        return None;
    }
    Some(claims.sub)
}
