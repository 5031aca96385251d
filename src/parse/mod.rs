//! Tolerant structure parsing
//!
//! A blob is decoded by an ordered list of [`DecodeStrategy`] implementations.
//! The first strategy that succeeds wins; when every strategy fails the row
//! degrades to the empty structure instead of failing the batch.
//!
//! New formats are supported by appending a strategy with
//! [`StructureParser::with_strategy`].

pub mod json;
pub mod literal;

pub use json::JsonStrategy;
pub use literal::LiteralStrategy;

use crate::types::Structure;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// Deepest container nesting any strategy will decode
pub const MAX_DEPTH: usize = 128;

/// Why a strategy rejected a blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub message: String,
    pub offset: Option<usize>,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        DecodeError {
            message: message.into(),
            offset: None,
        }
    }

    pub fn at(message: impl Into<String>, offset: usize) -> Self {
        DecodeError {
            message: message.into(),
            offset: Some(offset),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{} at byte {}", self.message, offset),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for DecodeError {}

/// A pure decoder from blob text to a generic value
pub trait DecodeStrategy: Send + Sync {
    /// Short name used in logs and reports
    fn name(&self) -> &'static str;

    fn decode(&self, text: &str) -> Result<Value, DecodeError>;
}

/// Result of parsing one blob. Never an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub structure: Structure,

    /// Name of the strategy that produced the structure, `None` for
    /// empty input or total failure
    pub decoded_by: Option<&'static str>,

    /// Combined reasons when every strategy failed
    pub failure: Option<String>,
}

impl ParseOutcome {
    fn empty() -> Self {
        ParseOutcome {
            structure: Structure::new(),
            decoded_by: None,
            failure: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Decodes blobs with an ordered strategy list
pub struct StructureParser {
    strategies: Vec<Box<dyn DecodeStrategy>>,
    scalar_key: String,
}

impl StructureParser {
    /// Parser with no strategies; every non-empty blob fails
    pub fn empty(scalar_key: impl Into<String>) -> Self {
        StructureParser {
            strategies: Vec::new(),
            scalar_key: scalar_key.into(),
        }
    }

    /// JSON first, then literal expressions
    pub fn new(scalar_key: impl Into<String>) -> Self {
        Self::empty(scalar_key)
            .with_strategy(JsonStrategy)
            .with_strategy(LiteralStrategy)
    }

    /// Append a strategy at the lowest priority
    pub fn with_strategy(mut self, strategy: impl DecodeStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Parse a normalized blob
    pub fn parse(&self, text: Option<&str>) -> ParseOutcome {
        let text = match text.map(str::trim) {
            None | Some("") => return ParseOutcome::empty(),
            Some(t) => t,
        };

        let mut reasons = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            match strategy.decode(text) {
                Ok(value) => {
                    return ParseOutcome {
                        structure: self.into_structure(value),
                        decoded_by: Some(strategy.name()),
                        failure: None,
                    };
                }
                Err(e) => {
                    debug!(strategy = strategy.name(), error = %e, "strategy rejected blob");
                    reasons.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        let reason = if reasons.is_empty() {
            String::from("no decode strategies configured")
        } else {
            reasons.join("; ")
        };
        warn!(raw = %text, error = %reason, "Error parsing blob, row keeps no flattened values");

        ParseOutcome {
            structure: Structure::new(),
            decoded_by: None,
            failure: Some(reason),
        }
    }

    /// Wrap decoded values that are not mappings under the scalar key
    fn into_structure(&self, value: Value) -> Structure {
        match value {
            Value::Object(map) => map,
            Value::Null => Structure::new(),
            other => {
                let mut map = Structure::new();
                map.insert(self.scalar_key.clone(), other);
                map
            }
        }
    }
}

impl Default for StructureParser {
    fn default() -> Self {
        Self::new("value")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn structure(value: Value) -> Structure {
        serde_json::from_value(value).unwrap()
    }

    /// Counts calls so precedence can be asserted
    struct Probe(Arc<AtomicUsize>);

    impl DecodeStrategy for Probe {
        fn name(&self) -> &'static str {
            "probe"
        }

        fn decode(&self, _text: &str) -> Result<Value, DecodeError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"probe": true}))
        }
    }

    #[test]
    fn test_json_blob() {
        let outcome =
            StructureParser::default().parse(Some(r#"{"city": "Reno", "zip": "89501"}"#));
        assert_eq!(outcome.structure, structure(json!({"city": "Reno", "zip": "89501"})));
        assert_eq!(outcome.decoded_by, Some("json"));
        assert!(!outcome.is_failure());
    }

    #[test]
    fn test_literal_blob_falls_back() {
        let outcome = StructureParser::default().parse(Some("{'city': 'Reno', 'zip': '89501'}"));
        assert_eq!(outcome.structure, structure(json!({"city": "Reno", "zip": "89501"})));
        assert_eq!(outcome.decoded_by, Some("literal"));
    }

    #[test]
    fn test_garbage_degrades_to_empty() {
        let outcome = StructureParser::default().parse(Some("not a structure at all"));
        assert!(outcome.structure.is_empty());
        assert_eq!(outcome.decoded_by, None);
        let failure = outcome.failure.unwrap();
        assert!(failure.contains("json:"));
        assert!(failure.contains("literal:"));
    }

    #[test]
    fn test_null_and_empty_are_not_failures() {
        let parser = StructureParser::default();
        for input in [None, Some(""), Some("   ")] {
            let outcome = parser.parse(input);
            assert!(outcome.structure.is_empty());
            assert!(!outcome.is_failure());
        }
    }

    #[test]
    fn test_non_mapping_uses_scalar_key() {
        let parser = StructureParser::new("address_value");
        assert_eq!(
            parser.parse(Some("\"Reno\"")).structure,
            structure(json!({"address_value": "Reno"}))
        );
        assert_eq!(
            parser.parse(Some("89501")).structure,
            structure(json!({"address_value": 89501}))
        );
        assert_eq!(
            parser.parse(Some("['a', 'b']")).structure,
            structure(json!({"address_value": ["a", "b"]}))
        );
        assert!(parser.parse(Some("null")).structure.is_empty());
    }

    #[test]
    fn test_later_strategy_not_consulted_when_json_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let parser = StructureParser::new("value").with_strategy(Probe(calls.clone()));

        let outcome = parser.parse(Some(r#"{"a": 1}"#));
        assert_eq!(outcome.structure, structure(json!({"a": 1})));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let outcome = parser.parse(Some("<a>1</a>"));
        assert_eq!(outcome.decoded_by, Some("probe"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_json_equivalence_for_json_inputs() {
        let parser = StructureParser::default();
        let inputs = [
            r#"{"street_address": "1 Main St", "postal_code": "89501", "country": "US"}"#,
            r#"{"a": null, "b": [1, 2], "c": {"d": true}}"#,
            r#"{}"#,
        ];
        for input in inputs {
            let expected = JsonStrategy.decode(input).unwrap();
            let outcome = parser.parse(Some(input));
            assert_eq!(Value::Object(outcome.structure), expected);
        }
    }

    #[test]
    fn test_no_strategies() {
        let outcome = StructureParser::empty("value").parse(Some("{}"));
        assert!(outcome.structure.is_empty());
        assert_eq!(outcome.failure.as_deref(), Some("no decode strategies configured"));
    }

    #[test]
    fn test_deep_nesting_degrades_to_empty() {
        let parser = StructureParser::default();
        for (open, close) in [("[", "]"), ("{\"a\": ", "}")] {
            let blob = format!("{}1{}", open.repeat(10_000), close.repeat(10_000));
            let outcome = parser.parse(Some(&blob));
            assert!(outcome.structure.is_empty());
            assert!(outcome.is_failure());
            assert!(outcome.failure.unwrap().contains("nesting too deep"));
        }
    }
}
