//! Small encoding helpers shared by the request builder and the payment flow.

use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::constants::{PRODUCT, VERSION};
use crate::error::ClientError;

/// Base64-encode the JSON serialization of a value.
pub fn encode64<T: Serialize>(value: &T) -> Result<String, ClientError> {
    let json = serde_json::to_vec(value)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(&json))
}

/// Build the `Formspree-Client` header value.
///
/// A caller-supplied label is prepended to `@formspree/core@<version>`.
pub fn client_header(label: Option<&str>) -> String {
    let product = format!("{PRODUCT}@{VERSION}");
    match label.filter(|l| !l.is_empty()) {
        Some(label) => format!("{label} {product}"),
        None => product,
    }
}

/// Convert a snake-case or kebab-case string to camel case.
///
/// Only separators followed by an ASCII letter are folded, so `"a_1"` is left
/// untouched.
pub fn to_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '-' || c == '_' {
            if let Some(next) = chars.peek().copied().filter(char::is_ascii_alphabetic) {
                out.push(next.to_ascii_uppercase());
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Camelize the top-level keys of a JSON object, returning a new map.
pub fn camelize_top_keys(obj: &Map<String, Value>) -> Map<String, Value> {
    obj.iter()
        .map(|(key, value)| (to_camel(key), value.clone()))
        .collect()
}

/// Milliseconds since the Unix epoch.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
