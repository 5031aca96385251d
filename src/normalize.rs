//! Blob normalization - strips structural whitespace noise before parsing

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Trim a blob and collapse every whitespace run (newlines included) to one space.
///
/// `None` stays `None`. Applying this twice gives the same result as applying it once.
pub fn normalize_blob(raw: Option<&str>) -> Option<String> {
    raw.map(|text| match WHITESPACE_RUN.replace_all(text.trim(), " ") {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(s) => s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_passes_through() {
        assert_eq!(normalize_blob(None), None);
    }

    #[test]
    fn test_collapses_multiline_blob() {
        let raw = "  {\"city\":\n    \"Reno\",\r\n\t\"zip\":   \"89501\"}\n";
        assert_eq!(
            normalize_blob(Some(raw)).as_deref(),
            Some("{\"city\": \"Reno\", \"zip\": \"89501\"}")
        );
    }

    #[test]
    fn test_whitespace_only_becomes_empty() {
        assert_eq!(normalize_blob(Some(" \n\t ")).as_deref(), Some(""));
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "",
            "plain",
            "  a \n b  ",
            "{'street_address': '1 Main St',\n 'locality':\t'Reno'}",
            "\u{a0}non-breaking\u{2003}spaces ",
        ];
        for input in inputs {
            let once = normalize_blob(Some(input));
            let twice = normalize_blob(once.as_deref());
            assert_eq!(once, twice, "not idempotent for {:?}", input);
        }
    }
}
