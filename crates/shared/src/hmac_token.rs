//! C6: legacy signed token codec. Format is
//! `base64url(payloadJson) "." base64url(HMAC-SHA256(signingKey, payloadBase64Url))`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::models::LegacyTokenPayload;

type HmacSha256 = Hmac<Sha256>;

pub fn sign(payload: &LegacyTokenPayload, signing_key: &str) -> Option<String> {
    let payload_json = serde_json::to_vec(payload).ok()?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json);

    let mut mac = HmacSha256::new_from_slice(signing_key.as_bytes()).ok()?;
    mac.update(payload_b64.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Some(format!("{payload_b64}.{signature_b64}"))
}

/// Verifies and decodes a token. Every failure mode — malformed split,
/// bad base64, signature mismatch, unparsable payload, or an expired or
/// structurally invalid payload — returns `None` rather than an error,
/// matching the codec's documented failure policy.
pub fn verify(token: &str, signing_key: &str) -> Option<LegacyTokenPayload> {
    let split_at = token.rfind('.')?;
    if split_at == 0 {
        return None;
    }
    let (payload_b64, rest) = token.split_at(split_at);
    let signature_b64 = &rest[1..];

    let mut mac = HmacSha256::new_from_slice(signing_key.as_bytes()).ok()?;
    mac.update(payload_b64.as_bytes());
    let expected_signature = mac.finalize().into_bytes();

    let provided_signature = URL_SAFE_NO_PAD.decode(signature_b64).ok()?;
    if !constant_time_eq(&expected_signature, &provided_signature) {
        return None;
    }

    let payload_json = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let payload: LegacyTokenPayload = serde_json::from_slice(&payload_json).ok()?;

    if payload.advisor_id.trim().is_empty() {
        return None;
    }
    if payload.expires_at_ms <= payload.issued_at_ms {
        return None;
    }

    let now_ms = Utc::now().timestamp_millis();
    if payload.expires_at_ms <= now_ms {
        return None;
    }

    Some(payload)
}

/// Equal-length buffers only: unequal lengths are treated as a mismatch
/// without comparing further, matching the codec's constant-time policy
/// for same-length signature buffers.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
