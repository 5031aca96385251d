use super::{DecodeError, DecodeStrategy, MAX_DEPTH};
use serde_json::Value;

/// First-priority strategy: strict JSON
///
/// Uses simd-json for the scan and deserializes straight into `serde_json::Value`,
/// so object keys keep their document order.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonStrategy;

impl DecodeStrategy for JsonStrategy {
    fn name(&self) -> &'static str {
        "json"
    }

    fn decode(&self, text: &str) -> Result<Value, DecodeError> {
        // The deserializer recurses per container and has no limit of its own
        check_depth(text)?;

        // simd-json parses in place
        let mut buffer = text.as_bytes().to_vec();
        simd_json::serde::from_slice::<Value>(&mut buffer)
            .map_err(|e| DecodeError::new(e.to_string()))
    }
}

/// Reject documents whose containers nest deeper than `MAX_DEPTH`
///
/// Brackets inside string literals are skipped. Unbalanced input is left for
/// the parser to reject.
fn check_depth(text: &str) -> Result<(), DecodeError> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in text.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                if depth > MAX_DEPTH {
                    return Err(DecodeError::at("nesting too deep", offset));
                }
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_object_in_order() {
        let value = JsonStrategy
            .decode(r#"{"zip": "89501", "city": "Reno", "geo": {"lat": 39.5}}"#)
            .unwrap();
        assert_eq!(value, json!({"zip": "89501", "city": "Reno", "geo": {"lat": 39.5}}));
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zip", "city", "geo"]);
    }

    #[test]
    fn test_decodes_scalars() {
        assert_eq!(JsonStrategy.decode("42").unwrap(), json!(42));
        assert_eq!(JsonStrategy.decode(r#""Reno""#).unwrap(), json!("Reno"));
    }

    #[test]
    fn test_rejects_single_quotes() {
        assert!(JsonStrategy.decode("{'city': 'Reno'}").is_err());
    }

    #[test]
    fn test_rejects_free_text() {
        assert!(JsonStrategy.decode("not a structure at all").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let at_limit = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(JsonStrategy.decode(&at_limit).is_ok());

        let too_deep = format!("{}{}", "[".repeat(100_000), "]".repeat(100_000));
        let err = JsonStrategy.decode(&too_deep).unwrap_err();
        assert_eq!(err, DecodeError::at("nesting too deep", MAX_DEPTH));
    }

    #[test]
    fn test_brackets_in_strings_do_not_count() {
        let text = format!(r#"{{"note": "{}\"{}", "ok": true}}"#, "[".repeat(500), "{".repeat(500));
        assert_eq!(JsonStrategy.decode(&text).unwrap()["ok"], json!(true));
    }
}
