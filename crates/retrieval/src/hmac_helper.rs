//! Deterministic HMAC-SHA256 signing/verification of canonical JSON
//! payloads. A black-box helper — sign(payload,secret)→digest,
//! verify(payload,secret,digest)→bool — implemented here since shared
//! export/import is its only caller.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Canonical JSON: recursively sort object keys, then serialize with no
/// extra whitespace, so the same logical payload always signs identically.
pub fn canonical_json(value: &serde_json::Value) -> String {
    fn sorted(value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut sorted_map = serde_json::Map::new();
                for (k, v) in entries {
                    sorted_map.insert(k.clone(), sorted(v));
                }
                serde_json::Value::Object(sorted_map)
            }
            serde_json::Value::Array(arr) => serde_json::Value::Array(arr.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    serde_json::to_string(&sorted(value)).expect("serde_json::Value always serializes")
}

pub fn sign(payload: &serde_json::Value, secret: &str) -> String {
    let canonical = canonical_json(payload);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(canonical.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time signature comparison to avoid timing side-channels.
pub fn verify(payload: &serde_json::Value, secret: &str, signature: &str) -> bool {
    let expected = sign(payload, secret);
    let Ok(expected_bytes) = hex::decode(&expected) else {
        return false;
    };
    let Ok(actual_bytes) = hex::decode(signature) else {
        return false;
    };
    if expected_bytes.len() != actual_bytes.len() {
        return false;
    }
    expected_bytes.ct_eq(&actual_bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let payload = serde_json::json!({ "b": 2, "a": 1 });
        let signature = sign(&payload, "secret");
        assert!(verify(&payload, "secret", &signature));
    }

    #[test]
    fn key_order_does_not_affect_signature() {
        let a = serde_json::json!({ "a": 1, "b": 2 });
        let b = serde_json::json!({ "b": 2, "a": 1 });
        assert_eq!(sign(&a, "secret"), sign(&b, "secret"));
    }

    #[test]
    fn single_byte_payload_mutation_fails_verification() {
        let payload = serde_json::json!({ "a": 1 });
        let signature = sign(&payload, "secret");
        let mutated = serde_json::json!({ "a": 2 });
        assert!(!verify(&mutated, "secret", &signature));
    }

    #[test]
    fn single_byte_signature_mutation_fails_verification() {
        let payload = serde_json::json!({ "a": 1 });
        let mut signature = sign(&payload, "secret");
        let last = signature.pop().unwrap();
        let flipped = if last == '0' { '1' } else { '0' };
        signature.push(flipped);
        assert!(!verify(&payload, "secret", &signature));
    }
}
