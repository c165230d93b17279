//! Narrow schema for chain responses.
//!
//! Chain clients answer with heterogeneous JSON: nested `tx_response`
//! envelopes, int64 values encoded as strings, booleans wrapped in objects,
//! log noise printed before the document. Everything here maps those shapes
//! onto `Option` fields. Nothing in this module returns an error.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Fields the dispatcher cares about in a broadcast answer, whatever the wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainResponse {
    /// Application-level response code (`0` = accepted)
    pub code: Option<i64>,

    /// Transaction hash
    pub txhash: Option<String>,

    /// Chain log message accompanying a rejection
    pub raw_log: Option<String>,
}

const CODE_KEYS: &[&str] = &["code"];
const TXHASH_KEYS: &[&str] = &["txhash", "tx_hash"];
const LOG_KEYS: &[&str] = &["raw_log", "log"];

impl ChainResponse {
    /// Map a broadcast result document.
    pub fn from_tx_json(value: &JsonValue) -> Self {
        Self {
            code: find_i64(value, CODE_KEYS),
            txhash: find_string(value, TXHASH_KEYS).filter(|h| !h.trim().is_empty()),
            raw_log: find_string(value, LOG_KEYS).filter(|l| !l.is_empty()),
        }
    }

    /// Parse broadcast output text.
    ///
    /// Returns `None` when the text holds no JSON document, or a document
    /// with neither a response code nor a transaction hash. Callers treat
    /// that as a malformed response rather than a chain answer.
    pub fn parse_tx(text: &str) -> Option<Self> {
        let value = extract_json(text)?;
        let response = Self::from_tx_json(&value);
        if response.code.is_none() && response.txhash.is_none() {
            return None;
        }
        Some(response)
    }

    /// Whether the chain accepted the transaction.
    pub fn accepted(&self) -> bool {
        self.code.unwrap_or(0) == 0 && self.txhash.is_some()
    }
}

/// Find the JSON document in command output.
///
/// Tries the whole text first, then each line, then the widest `{...}` span.
pub fn extract_json(text: &str) -> Option<JsonValue> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<JsonValue>(trimmed) {
        return Some(value);
    }
    for line in trimmed.lines().rev() {
        let line = line.trim();
        if line.starts_with('{') || line.starts_with('[') {
            if let Ok(value) = serde_json::from_str::<JsonValue>(line) {
                return Some(value);
            }
        }
    }
    let open = trimmed.find('{')?;
    let close = trimmed.rfind('}')?;
    if close <= open {
        return None;
    }
    serde_json::from_str(&trimmed[open..=close]).ok()
}

/// Read an integer encoded as a JSON number or a numeric string.
pub fn value_as_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok())),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_bool(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Depth-first search for the first key in `keys` holding an integer.
///
/// An object's own keys are checked (in `keys` order) before its children.
pub fn find_i64(value: &JsonValue, keys: &[&str]) -> Option<i64> {
    find_by(value, keys, &value_as_i64)
}

/// Depth-first search for the first key in `keys` holding a boolean.
///
/// A bare boolean document answers for itself.
pub fn find_bool(value: &JsonValue, keys: &[&str]) -> Option<bool> {
    if let JsonValue::Bool(b) = value {
        return Some(*b);
    }
    find_by(value, keys, &value_as_bool)
}

/// Depth-first search for the first key in `keys` holding a string.
pub fn find_string(value: &JsonValue, keys: &[&str]) -> Option<String> {
    find_by(value, keys, &|v: &JsonValue| v.as_str().map(str::to_string))
}

fn find_by<T>(value: &JsonValue, keys: &[&str], read: &dyn Fn(&JsonValue) -> Option<T>) -> Option<T> {
    match value {
        JsonValue::Object(map) => {
            for key in keys {
                if let Some(found) = map.get(*key).and_then(read) {
                    return Some(found);
                }
            }
            map.values().find_map(|child| find_by(child, keys, read))
        }
        JsonValue::Array(items) => items.iter().find_map(|child| find_by(child, keys, read)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tx_flat() {
        let r = ChainResponse::parse_tx(r#"{"code":0,"txhash":"ABC123"}"#).unwrap();
        assert_eq!(r.code, Some(0));
        assert_eq!(r.txhash.as_deref(), Some("ABC123"));
        assert!(r.accepted());
    }

    #[test]
    fn test_parse_tx_with_log_prefix() {
        let out = "gas estimate: 181234\n{\"height\":\"0\",\"txhash\":\"DEF\",\"code\":0,\"raw_log\":\"\"}\n";
        let r = ChainResponse::parse_tx(out).unwrap();
        assert_eq!(r.txhash.as_deref(), Some("DEF"));
        assert_eq!(r.raw_log, None);
    }

    #[test]
    fn test_parse_tx_nested_envelope() {
        let out = r#"{"tx_response":{"code":5,"txhash":"XYZ","raw_log":"insufficient funds"}}"#;
        let r = ChainResponse::parse_tx(out).unwrap();
        assert_eq!(r.code, Some(5));
        assert_eq!(r.raw_log.as_deref(), Some("insufficient funds"));
        assert!(!r.accepted());
    }

    #[test]
    fn test_parse_tx_code_without_hash() {
        let r = ChainResponse::parse_tx(r#"{"code":5}"#).unwrap();
        assert_eq!(r.txhash, None);
        assert!(!r.accepted());
    }

    #[test]
    fn test_parse_tx_rejects_noise() {
        assert!(ChainResponse::parse_tx("Error: connection refused").is_none());
        assert!(ChainResponse::parse_tx("").is_none());
        assert!(ChainResponse::parse_tx(r#"{"message":"hello"}"#).is_none());
    }

    #[test]
    fn test_empty_txhash_is_absent() {
        let r = ChainResponse::parse_tx(r#"{"code":0,"txhash":""}"#).unwrap();
        assert_eq!(r.txhash, None);
    }

    #[test]
    fn test_find_i64_string_encoded() {
        let v = json!({"nonce": {"block_height": "4211"}});
        assert_eq!(find_i64(&v, &["nonce", "block_height"]), Some(4211));
    }

    #[test]
    fn test_find_bool_variants() {
        assert_eq!(find_bool(&json!(true), &["is_active"]), Some(true));
        assert_eq!(find_bool(&json!({"is_active": "false"}), &["is_active"]), Some(false));
        assert_eq!(find_bool(&json!({"other": 1}), &["is_active"]), None);
    }

    #[test]
    fn test_null_maps_to_none() {
        let v = json!({"nonce": null});
        assert_eq!(find_i64(&v, &["nonce"]), None);
    }
}
