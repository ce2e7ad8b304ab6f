//! Tolerant decoding of structured model replies.
//!
//! Models wrap JSON in code fences or surround it with prose often enough that
//! a strict `serde_json::from_str` on the raw reply is not useful. Parsing
//! tries the reply as-is, then with fences stripped, then the outermost
//! `{...}` or `[...]` span.

use crate::types::{Recommendation, RootCause};
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse<T> {
    Parsed(T),
    /// The raw reply, kept for fallbacks.
    Degraded(String),
}

impl<T> ParsedResponse<T> {
    #[must_use]
    pub const fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    pub fn parsed(self) -> Option<T> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Degraded(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParsedResponse<U> {
        match self {
            Self::Parsed(value) => ParsedResponse::Parsed(f(value)),
            Self::Degraded(raw) => ParsedResponse::Degraded(raw),
        }
    }
}

pub fn parse_structured<T: DeserializeOwned>(content: &str) -> ParsedResponse<T> {
    let trimmed = content.trim();
    let unfenced = strip_code_fence(trimmed);
    let candidates = [Some(trimmed), Some(unfenced), json_span(unfenced)];
    for candidate in candidates.into_iter().flatten() {
        if let Ok(value) = serde_json::from_str::<T>(candidate) {
            return ParsedResponse::Parsed(value);
        }
    }
    log::debug!(
        "Structured reply did not parse ({} chars)",
        content.chars().count()
    );
    ParsedResponse::Degraded(content.to_string())
}

fn strip_code_fence(text: &str) -> &str {
    let Some(start) = text.find("```") else {
        return text;
    };
    let after = &text[start + 3..];
    // Skip the info string (`json`, `JSON`, ...) up to the end of the line.
    let body_start = after.find('\n').map_or(0, |i| i + 1);
    let body = &after[body_start..];
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

fn json_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Root causes as either a bare array or `{"root_causes": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RootCauseList {
    Bare(Vec<RootCause>),
    Wrapped { root_causes: Vec<RootCause> },
}

impl RootCauseList {
    pub(crate) fn into_vec(self) -> Vec<RootCause> {
        match self {
            Self::Bare(items) | Self::Wrapped { root_causes: items } => items,
        }
    }
}

/// Recommendations as either a bare array or `{"recommendations": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RecommendationList {
    Bare(Vec<Recommendation>),
    Wrapped { recommendations: Vec<Recommendation> },
}

impl RecommendationList {
    pub(crate) fn into_vec(self) -> Vec<Recommendation> {
        match self {
            Self::Bare(items) | Self::Wrapped { recommendations: items } => items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorAnalysis, Priority};
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_plain_json() {
        let parsed: ParsedResponse<ErrorAnalysis> =
            parse_structured(r#"{"summary": "disk full", "severity": "high"}"#);
        let analysis = parsed.parsed().unwrap();
        assert_eq!(analysis.summary, "disk full");
        assert_eq!(analysis.severity, "high");
    }

    #[test]
    fn parses_fenced_json_with_prose() {
        let reply = "Here is the analysis:\n```json\n{\"summary\": \"oom\"}\n```\nLet me know.";
        let parsed: ParsedResponse<ErrorAnalysis> = parse_structured(reply);
        assert!(parsed.is_parsed());
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let reply = "Sure! [{\"title\": \"Raise pool size\", \"priority\": \"high\"}] Hope it helps.";
        let parsed: ParsedResponse<RecommendationList> = parse_structured(reply);
        let items = parsed.parsed().unwrap().into_vec();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].priority, Priority::High);
    }

    #[test]
    fn accepts_wrapped_lists() {
        let reply = r#"{"root_causes": [{"description": "bad dns", "confidence": 0.9}]}"#;
        let parsed: ParsedResponse<RootCauseList> = parse_structured(reply);
        let causes = parsed.parsed().unwrap().into_vec();
        assert_eq!(causes[0].description, "bad dns");
    }

    #[test]
    fn degrades_on_unparseable_reply() {
        let parsed: ParsedResponse<ErrorAnalysis> = parse_structured("Mostly timeouts.");
        assert_eq!(parsed, ParsedResponse::Degraded("Mostly timeouts.".to_string()));
    }

    #[test]
    fn map_preserves_degraded_text() {
        let parsed: ParsedResponse<RootCauseList> = parse_structured("nope");
        assert_eq!(
            parsed.map(RootCauseList::into_vec),
            ParsedResponse::Degraded("nope".to_string())
        );
    }
}
