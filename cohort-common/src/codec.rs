//! Opaque identifier and payload codecs
//!
//! Reversible byte-wise XOR against fixed embedded keys, emitted as URL-safe
//! base64 without padding. This is obfuscation, not cryptography: the keys
//! ship in the binary and the transform is reversible by design. The point
//! is keeping raw student identifiers and response shapes out of casual
//! devtools inspection, nothing stronger.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;

// Fixed keys, kept bit-exact for compatibility with existing clients.
const ID_KEY: &[u8] = b"ID_OBFUSCATION_SALT_2026";
const PAYLOAD_KEY: &[u8] = b"PAYLOAD_OBFUSCATION_KEY_2026";

/// Marker that distinguishes obfuscated identifier tokens from real ones.
const ID_PREFIX: &str = "T_";

fn xor_cycle(data: &[u8], key: &[u8]) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, b)| b ^ key[i % key.len()])
        .collect()
}

/// Mask a real student identifier into an opaque `T_`-prefixed token.
/// Deterministic: the same input always yields the same token.
pub fn obfuscate_id(real_id: &str) -> String {
    let token = URL_SAFE_NO_PAD.encode(xor_cycle(real_id.as_bytes(), ID_KEY));
    format!("{ID_PREFIX}{token}")
}

/// Resolve an opaque token back to the real identifier.
///
/// Inputs without the marker prefix are treated as already-real and returned
/// unchanged, as is anything that fails to decode. Fails closed, never
/// errors.
pub fn resolve_id(opaque: &str) -> String {
    let Some(token) = opaque.strip_prefix(ID_PREFIX) else {
        return opaque.to_string();
    };
    match URL_SAFE_NO_PAD.decode(token) {
        Ok(bytes) => match String::from_utf8(xor_cycle(&bytes, ID_KEY)) {
            Ok(plain) => plain,
            Err(_) => opaque.to_string(),
        },
        Err(_) => opaque.to_string(),
    }
}

/// Serialize a response value to compact JSON and wrap it in the payload
/// transform. Returns `None` when serialization fails, so the boundary can
/// fall back to the unwrapped body.
pub fn obfuscate_payload<T: Serialize>(value: &T) -> Option<String> {
    let json = serde_json::to_string(value).ok()?;
    Some(URL_SAFE_NO_PAD.encode(xor_cycle(json.as_bytes(), PAYLOAD_KEY)))
}

/// Unwrap a payload token back to its JSON value. Used by tests and by any
/// internal caller that needs to inspect a shielded body.
pub fn deobfuscate_payload(token: &str) -> Option<serde_json::Value> {
    let bytes = URL_SAFE_NO_PAD.decode(token).ok()?;
    let json = String::from_utf8(xor_cycle(&bytes, PAYLOAD_KEY)).ok()?;
    serde_json::from_str(&json).ok()
}
