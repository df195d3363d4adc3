//! Config redaction: produce safe-to-share config snapshots by masking secrets.

use serde_json::Value;

static SENSITIVE_KEYS: &[&str] = &["apiKey", "api_key", "apikey", "token", "secret", "password"];

fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

/// Redact a config JSON value, masking every sensitive field.
///
/// The first four characters are kept as a hint when the secret is long
/// enough; shorter secrets become `"***"`.
pub fn redact(value: &Value) -> Value {
    redact_recursive(value, "")
}

fn redact_recursive(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) if is_sensitive_key(key) && !s.is_empty() => {
            let hint = if s.chars().count() > 8 {
                format!("{}***", s.chars().take(4).collect::<String>())
            } else {
                "***".to_string()
            };
            Value::String(hint)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(|v| redact_recursive(v, key)).collect()),
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                result.insert(k.clone(), redact_recursive(v, k));
            }
            Value::Object(result)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_api_key() {
        let redacted = redact(&json!({ "apiKey": "AIzaSyExampleExample", "model": "gemini" }));
        assert_eq!(redacted["apiKey"], "AIza***");
        assert_eq!(redacted["model"], "gemini");
    }

    #[test]
    fn short_secret_fully_masked() {
        let redacted = redact(&json!({ "nested": { "token": "abc" } }));
        assert_eq!(redacted["nested"]["token"], "***");
    }

    #[test]
    fn null_key_passes_through() {
        let redacted = redact(&json!({ "apiKey": null }));
        assert!(redacted["apiKey"].is_null());
    }
}
