//! SHA-256 hashing and HMAC verification, grounded on the source's `sha256`
//! crate (a thin wrapper over `ring::digest`). Used for idempotency key /
//! request fingerprint hashing (`spec.md` §3, §4.9) and webhook signature
//! verification (`spec.md` §4.7).

use ring::hmac;

/// SHA-256 digest of `input`, returned as a lowercase hex string.
pub fn sha256_hex(input: &[u8]) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, input);
    hex::encode(digest.as_ref())
}

/// Canonicalizes `value` to a stable JSON string (sorted object keys) and
/// hashes it. Used for the idempotency request fingerprint (`spec.md` §3:
/// "SHA-256 of canonical JSON of request").
pub fn canonical_json_sha256(value: &serde_json::Value) -> String {
    let canonical = canonicalize(value);
    sha256_hex(canonical.to_string().as_bytes())
}

/// Recursively sorts object keys so that two semantically-equal JSON values
/// serialize identically regardless of field order.
fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

/// Verifies an HMAC-SHA256 signature over `message` against a hex or base64
/// encoded `signature`, as used by payment provider webhooks (`spec.md`
/// §4.7: "verify HMAC signature (provider-specific canonical string)").
pub fn verify_hmac_sha256_hex(secret: &[u8], message: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    hmac::verify(&key, message, &signature).is_ok()
}

/// Computes an HMAC-SHA256 signature over `message`, hex-encoded. Exposed so
/// tests (and the stub provider adapter) can construct valid webhook
/// payloads without a real provider.
pub fn hmac_sha256_hex(secret: &[u8], message: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    let tag = hmac::sign(&key, message);
    hex::encode(tag.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }

    #[test]
    fn canonical_json_is_order_independent() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(canonical_json_sha256(&a), canonical_json_sha256(&b));

        let c = serde_json::json!({"a": 3, "b": 1});
        assert_ne!(canonical_json_sha256(&a), canonical_json_sha256(&c));
    }

    #[test]
    fn hmac_round_trips() {
        let secret = b"webhook-secret";
        let message = b"{\"event_id\":\"abc\"}";
        let sig = hmac_sha256_hex(secret, message);
        assert!(verify_hmac_sha256_hex(secret, message, &sig));
        assert!(!verify_hmac_sha256_hex(secret, message, "deadbeef"));
    }
}
