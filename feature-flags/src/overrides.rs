use serde_json::{Map, Value};

use crate::engine::FeatureMap;

/// Client-owned overrides carried in a cookie. Advisory only: anyone can edit their cookie.
pub type OverrideMapping = FeatureMap;

/// Prefix used by Express style cookie serialization for JSON values.
const JSON_COOKIE_PREFIX: &str = "j:";

/// Decodes an override cookie value. Never fails: malformed input means no overrides.
pub fn decode(raw: &str) -> OverrideMapping {
    let payload = raw.strip_prefix(JSON_COOKIE_PREFIX).unwrap_or(raw);

    let object: Map<String, Value> = match serde_json::from_str(payload) {
        Ok(object) => object,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed override cookie");
            return OverrideMapping::new();
        }
    };

    object
        .into_iter()
        .filter_map(|(id, value)| match value {
            Value::Bool(enabled) => Some((id, enabled)),
            other => {
                tracing::debug!(flag = %id, value = %other, "ignoring non boolean override");
                None
            }
        })
        .collect()
}

pub fn encode(overrides: &OverrideMapping) -> String {
    // Serializing a map of strings to bools cannot fail.
    let json = serde_json::to_string(overrides).unwrap_or_else(|_| "{}".to_string());
    format!("{JSON_COOKIE_PREFIX}{json}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_prefixed_and_bare_json() {
        let expected = OverrideMapping::from([("fClosed".to_string(), true)]);
        assert_eq!(decode(r#"j:{"fClosed":true}"#), expected);
        assert_eq!(decode(r#"{"fClosed":true}"#), expected);
    }

    #[test]
    fn test_decode_malformed_is_empty() {
        assert!(decode("").is_empty());
        assert!(decode("j:").is_empty());
        assert!(decode("not json").is_empty());
        assert!(decode("j:[true]").is_empty());
        assert!(decode("j:true").is_empty());
    }

    #[test]
    fn test_decode_drops_non_boolean_entries() {
        let decoded = decode(r#"j:{"fOpen":false,"fEval":"yes","fEvalOr":1}"#);
        assert_eq!(decoded, OverrideMapping::from([("fOpen".to_string(), false)]));
    }

    #[test]
    fn test_encode() {
        let overrides = OverrideMapping::from([
            ("fOpen".to_string(), false),
            ("fClosed".to_string(), true),
        ]);
        let encoded = encode(&overrides);
        assert_eq!(encoded, r#"j:{"fClosed":true,"fOpen":false}"#);
        assert_eq!(decode(&encoded), overrides);
        assert_eq!(encode(&OverrideMapping::new()), "j:{}");
    }
}
