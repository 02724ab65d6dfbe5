// fathom-pipeline/src/redact.rs
// ============================================================================
// Module: Fathom Redaction Stage
// Description: Tree walk over the event payload removing sensitive data.
// Purpose: First pipeline stage (`spec.md` §4.4, item 1).
// Dependencies: fathom-config, serde_json
// ============================================================================

//! ## Overview
//! [`redact`] walks a payload's JSON tree. Object keys matching
//! `redact_keys` exactly have their value replaced with the redaction
//! marker without descending into the original value. Every remaining
//! string is tested against `redact_patterns` in order; a pattern only
//! redacts a string it matches in full, not merely a substring of it.
//! Arrays are traversed element-wise; non-string scalars pass through
//! untouched.

use fathom_config::Config;
use fathom_config::REDACTION_MARKER;
use serde_json::Value;

use crate::error::RedactionError;

/// Maximum JSON nesting depth this stage will traverse. A payload
/// deeper than this is rejected rather than risking a stack overflow on
/// the recursive walk.
const MAX_DEPTH: usize = 64;

/// Returns a redacted copy of `payload` per `config`'s `redact_keys` and
/// `redact_patterns`.
///
/// # Errors
///
/// Returns [`RedactionError::TooDeep`] if `payload` nests more than
/// [`MAX_DEPTH`] levels. Per `spec.md` §4.4, the caller must drop the
/// event on a redaction failure rather than store it unredacted.
pub fn redact(payload: &Value, config: &Config) -> Result<Value, RedactionError> {
    redact_value(payload, config, 0)
}

fn redact_value(value: &Value, config: &Config, depth: usize) -> Result<Value, RedactionError> {
    if depth > MAX_DEPTH {
        return Err(RedactionError::TooDeep { max: MAX_DEPTH });
    }
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, child) in map {
                if config.redact_keys.iter().any(|redacted| redacted == key) {
                    out.insert(key.clone(), Value::String(REDACTION_MARKER.to_owned()));
                } else {
                    out.insert(key.clone(), redact_value(child, config, depth + 1)?);
                }
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(redact_value(item, config, depth + 1)?);
            }
            Ok(Value::Array(out))
        }
        Value::String(text) => Ok(
            if config.redact_patterns.iter().any(|pattern| fully_matches(pattern, text)) {
                Value::String(REDACTION_MARKER.to_owned())
            } else {
                Value::String(text.clone())
            },
        ),
        other => Ok(other.clone()),
    }
}

/// Returns whether `pattern` matches `text` in its entirety, not just a
/// substring of it (`spec.md` §4.1/§4.4/§8 invariant 5).
fn fully_matches(pattern: &regex::Regex, text: &str) -> bool {
    pattern.find(text).is_some_and(|found| found.start() == 0 && found.end() == text.len())
}

#[cfg(test)]
mod tests {
    use super::redact;
    use fathom_config::Config;
    use fathom_config::ConfigOverrides;
    use fathom_config::Preset;
    use serde_json::json;

    fn config_with(redact_keys: Vec<&str>, redact_patterns: Vec<&str>) -> Config {
        let overrides = ConfigOverrides {
            redact_keys: Some(redact_keys.into_iter().map(String::from).collect()),
            redact_patterns: Some(redact_patterns.into_iter().map(String::from).collect()),
            ..ConfigOverrides::default()
        };
        Config::load(Preset::Debug, None, overrides).expect("load")
    }

    #[test]
    fn redacted_key_does_not_recurse_into_its_value() {
        let config = config_with(vec!["secret"], vec![]);
        let payload = json!({"secret": {"nested": "still here"}, "ok": "visible"});
        let redacted = redact(&payload, &config).expect("redact");
        assert_eq!(redacted["secret"], json!("***REDACTED***"));
        assert_eq!(redacted["ok"], json!("visible"));
    }

    #[test]
    fn pattern_replaces_a_fully_matching_string() {
        let config = config_with(vec![], vec![r"\d{3}-\d{2}-\d{4}"]);
        let payload = json!({"note": "123-45-6789"});
        let redacted = redact(&payload, &config).expect("redact");
        assert_eq!(redacted["note"], json!("***REDACTED***"));
    }

    #[test]
    fn pattern_does_not_redact_a_mere_substring_match() {
        let config = config_with(vec![], vec![r"\d{3}-\d{2}-\d{4}"]);
        let payload = json!({"note": "ssn is 123-45-6789 on file"});
        let redacted = redact(&payload, &config).expect("redact");
        assert_eq!(redacted["note"], json!("ssn is 123-45-6789 on file"));
    }

    #[test]
    fn arrays_are_traversed_element_wise() {
        let config = config_with(vec!["token"], vec![]);
        let payload = json!({"items": [{"token": "abc"}, {"other": "abc"}]});
        let redacted = redact(&payload, &config).expect("redact");
        assert_eq!(redacted["items"][0]["token"], json!("***REDACTED***"));
        assert_eq!(redacted["items"][1]["other"], json!("abc"));
    }

    #[test]
    fn non_string_scalars_pass_through() {
        let config = config_with(vec![], vec![]);
        let payload = json!({"count": 3, "ok": true, "ratio": 0.5, "nothing": null});
        let redacted = redact(&payload, &config).expect("redact");
        assert_eq!(redacted, payload);
    }

    #[test]
    fn excessive_nesting_is_rejected() {
        let config = config_with(vec![], vec![]);
        let mut payload = json!("leaf");
        for _ in 0..(super::MAX_DEPTH + 2) {
            payload = json!({"next": payload});
        }
        assert!(redact(&payload, &config).is_err());
    }
}
