use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Manifest envelope version.
const MANIFEST_SPL_VERSION: &str = "1.0";

/// Compute SHA-256 etag from compact JSON representation.
pub fn compute_etag(ir: &Value) -> String {
    let canonical = ir.to_string();
    let hash = Sha256::digest(canonical.as_bytes());
    format!("{:x}", hash)
}

/// Wrap a policy-set IR in a manifest envelope.
///
/// `serde_json::Map` is backed by `BTreeMap` (the default when the
/// `preserve_order` feature is not enabled), so keys come out sorted and
/// the etag of a given IR is stable.
pub fn build_manifest(ir: Value) -> Value {
    let etag = compute_etag(&ir);
    let mut map = Map::new();
    map.insert("etag".to_string(), Value::String(etag));
    map.insert("ir".to_string(), ir);
    map.insert(
        "spl".to_string(),
        Value::String(MANIFEST_SPL_VERSION.to_string()),
    );
    Value::Object(map)
}

/// Envelope-level problems with a manifest: missing fields, an unknown
/// envelope version, or an etag that does not match the IR it wraps.
pub fn check_manifest(doc: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    let Some(ir) = doc.get("ir") else {
        errors.push("manifest missing required field: 'ir'".to_string());
        return errors;
    };
    match doc.get("spl").and_then(Value::as_str) {
        Some(MANIFEST_SPL_VERSION) => {}
        Some(other) => errors.push(format!("unsupported manifest version: '{}'", other)),
        None => errors.push("manifest missing required field: 'spl'".to_string()),
    }
    let expected = compute_etag(ir);
    match doc.get("etag").and_then(Value::as_str) {
        Some(etag) if etag == expected => {}
        Some(etag) => errors.push(format!(
            "etag mismatch: manifest says {}, content hashes to {}",
            etag, expected
        )),
        None => errors.push("manifest etag must be a string".to_string()),
    }
    errors
}
