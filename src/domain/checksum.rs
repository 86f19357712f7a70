use crate::domain::encoding::encode_uri_component;
use crate::error::{GatewayError, Result};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Field under which the signature travels with the payload.
pub const CHECK_MAC_FIELD: &str = "CheckMacValue";

/// A flat, form-encodable payload of field name to rendered scalar value.
pub type FormPayload = BTreeMap<String, String>;

/// Flattens a serializable payload into a [`FormPayload`].
///
/// Strings are taken verbatim, numbers and booleans are rendered in their
/// plain textual form and `null` fields are dropped. Nested arrays or
/// objects cannot be form-encoded and are rejected.
pub fn to_form_payload<T: Serialize>(payload: &T) -> Result<FormPayload> {
    let Value::Object(fields) = serde_json::to_value(payload)? else {
        return Err(GatewayError::InvalidPayload(
            "payload must serialize to an object".to_string(),
        ));
    };

    let mut form = FormPayload::new();
    for (key, value) in fields {
        let rendered = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(_) | Value::Object(_) => {
                let message = format!("field {key} is not a scalar");
                return Err(GatewayError::InvalidPayload(message));
            }
        };
        form.insert(key, rendered);
    }
    Ok(form)
}

/// Builds the canonical string the provider hashes.
///
/// Entries are ordered case-insensitively and framed by `HashKey` and
/// `HashIV`, then escaped and lowercased with the provider's substitutions.
fn canonicalize(hash_key: &str, hash_iv: &str, payload: &FormPayload) -> String {
    let mut entries: Vec<(&str, &str)> = payload
        .iter()
        .filter(|(key, _)| key.as_str() != CHECK_MAC_FIELD)
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();
    entries.sort_by(|(a, _), (b, _)| {
        a.to_lowercase().cmp(&b.to_lowercase()).then(a.cmp(b))
    });

    let joined = std::iter::once(("HashKey", hash_key))
        .chain(entries)
        .chain(std::iter::once(("HashIV", hash_iv)))
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    encode_uri_component(&joined)
        .to_lowercase()
        .replace('\'', "%27")
        .replace('~', "%7e")
        .replace("%20", "+")
}

/// Computes the CheckMacValue for `payload`.
///
/// Any existing `CheckMacValue` entry is ignored, so re-signing a signed
/// payload yields the same value.
pub fn check_mac_value(hash_key: &str, hash_iv: &str, payload: &FormPayload) -> String {
    let canonical = canonicalize(hash_key, hash_iv, payload);
    hex::encode_upper(Sha256::digest(canonical.as_bytes()))
}

/// Returns a copy of `payload` with its CheckMacValue attached.
pub fn sign(hash_key: &str, hash_iv: &str, payload: &FormPayload) -> FormPayload {
    let mut signed = payload.clone();
    signed.insert(
        CHECK_MAC_FIELD.to_string(),
        check_mac_value(hash_key, hash_iv, payload),
    );
    signed
}
