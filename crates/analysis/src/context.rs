//! Bounded documentation context assembled from correlation results.
//!
//! Pattern and direct-error correlations are merged, ranked by score, and cut
//! to a document count and an estimated token budget. Tokens are estimated at
//! [`CHARS_PER_TOKEN`] characters each, never measured.

use crate::correlation::{CorrelationResult, DocumentMatch};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;

pub const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimits {
    pub max_documents: usize,
    pub max_tokens: usize,
    pub max_excerpt_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextSource {
    Pattern { pattern: String },
    DirectError { error_type: String, error_context: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDocument {
    pub title: String,
    pub path: String,
    pub keywords: Vec<String>,
    pub score: f32,
    pub excerpt: String,
    pub source: ContextSource,
}

impl ContextDocument {
    fn from_match(doc: &DocumentMatch, source: ContextSource, max_excerpt_chars: usize) -> Self {
        Self {
            title: doc.title.clone(),
            path: doc.path.clone(),
            keywords: doc.matched_keywords.clone(),
            score: doc.score,
            excerpt: truncate_chars(&doc.highlighted_excerpt, max_excerpt_chars),
            source,
        }
    }

    #[must_use]
    pub fn estimated_tokens(&self) -> usize {
        let mut chars = self.title.chars().count()
            + self.path.chars().count()
            + self.excerpt.chars().count()
            + self.keywords.iter().map(|k| k.chars().count() + 2).sum::<usize>();
        if let ContextSource::DirectError { error_context, .. } = &self.source {
            chars += error_context.chars().count();
        }
        chars.div_ceil(CHARS_PER_TOKEN)
    }
}

/// A citation-shaped view of a [`ContextDocument`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub title: String,
    pub path: String,
    pub score: f32,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentContext {
    pub documents: Vec<ContextDocument>,
    pub estimated_tokens: usize,
    /// Candidates considered before ranking and budgeting.
    pub total_candidates: usize,
}

impl DocumentContext {
    /// Returns `None` when nothing survives ranking and budgeting.
    #[must_use]
    pub fn from_correlation(result: &CorrelationResult, limits: &ContextLimits) -> Option<Self> {
        let mut candidates: Vec<ContextDocument> = Vec::with_capacity(result.document_count());

        for correlation in &result.pattern_correlations {
            for doc in &correlation.documents {
                let source = ContextSource::Pattern {
                    pattern: correlation.pattern.clone(),
                };
                candidates.push(ContextDocument::from_match(doc, source, limits.max_excerpt_chars));
            }
        }
        for correlation in &result.error_correlations {
            let error_context = format!(
                "{} (seen {}x, confidence {:.2}): {}",
                correlation.error_type,
                correlation.match_count,
                correlation.confidence,
                truncate_chars(&correlation.sample_error, limits.max_excerpt_chars)
            );
            for doc in &correlation.documents {
                let source = ContextSource::DirectError {
                    error_type: correlation.error_type.clone(),
                    error_context: error_context.clone(),
                };
                candidates.push(ContextDocument::from_match(doc, source, limits.max_excerpt_chars));
            }
        }

        let total_candidates = candidates.len();
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut seen_paths = HashSet::new();
        let mut documents = Vec::new();
        let mut estimated_tokens = 0usize;
        for doc in candidates {
            if documents.len() >= limits.max_documents {
                break;
            }
            // The same document can be reached through several correlations.
            if !seen_paths.insert(doc.path.clone()) {
                continue;
            }
            let cost = doc.estimated_tokens();
            if estimated_tokens + cost > limits.max_tokens {
                break;
            }
            estimated_tokens += cost;
            documents.push(doc);
        }

        if documents.is_empty() {
            return None;
        }
        log::debug!(
            "Document context: kept {} of {} candidates (~{} tokens)",
            documents.len(),
            total_candidates,
            estimated_tokens
        );
        Some(Self {
            documents,
            estimated_tokens,
            total_candidates,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    #[must_use]
    pub fn citations(&self, max_excerpt_chars: usize) -> Vec<SourceCitation> {
        self.documents
            .iter()
            .map(|doc| SourceCitation {
                title: doc.title.clone(),
                path: doc.path.clone(),
                score: doc.score,
                excerpt: truncate_chars(&doc.excerpt, max_excerpt_chars),
            })
            .collect()
    }

    /// Prompt-ready listing of the top `limit` documents.
    #[must_use]
    pub fn render(&self, limit: usize) -> String {
        let mut out = String::new();
        for (i, doc) in self.documents.iter().take(limit).enumerate() {
            let _ = writeln!(
                out,
                "[{}] {} ({}) relevance {:.2}",
                i + 1,
                doc.title,
                doc.path,
                doc.score
            );
            if !doc.keywords.is_empty() {
                let _ = writeln!(out, "    keywords: {}", doc.keywords.join(", "));
            }
            if let ContextSource::DirectError { error_context, .. } = &doc.source {
                let _ = writeln!(out, "    matched error: {error_context}");
            }
            if !doc.excerpt.is_empty() {
                let _ = writeln!(out, "    excerpt: {}", doc.excerpt);
            }
        }
        out
    }
}

/// Cuts `text` to at most `max_chars` characters, marking the cut with "..." when it fits.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars < 3 {
        return text.chars().take(max_chars).collect();
    }
    let keep = max_chars - 3;
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::{ErrorCorrelation, PatternCorrelation};
    use pretty_assertions::assert_eq;

    fn doc(path: &str, score: f32, excerpt: &str) -> DocumentMatch {
        DocumentMatch {
            title: format!("Title {path}"),
            path: path.to_string(),
            matched_keywords: vec!["timeout".to_string()],
            score,
            highlighted_excerpt: excerpt.to_string(),
        }
    }

    fn limits() -> ContextLimits {
        ContextLimits {
            max_documents: 5,
            max_tokens: 2_000,
            max_excerpt_chars: 40,
        }
    }

    fn sample() -> CorrelationResult {
        CorrelationResult {
            pattern_correlations: vec![PatternCorrelation {
                pattern: "db-timeout".to_string(),
                documents: vec![doc("a.md", 0.4, "short"), doc("b.md", 0.9, "pool sizing")],
            }],
            error_correlations: vec![ErrorCorrelation {
                error_type: "ConnectionRefused".to_string(),
                match_count: 7,
                confidence: 0.8,
                keywords: vec!["refused".to_string()],
                sample_error: "connect ECONNREFUSED 10.0.0.1:5432".to_string(),
                documents: vec![doc("c.md", 0.7, "check the listener")],
            }],
        }
    }

    #[test]
    fn merges_and_sorts_by_score() {
        let ctx = DocumentContext::from_correlation(&sample(), &limits()).unwrap();
        let paths: Vec<&str> = ctx.documents.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["b.md", "c.md", "a.md"]);
        assert_eq!(ctx.total_candidates, 3);
        assert!(matches!(
            ctx.documents[1].source,
            ContextSource::DirectError { ref error_context, .. } if error_context.contains("seen 7x")
        ));
    }

    #[test]
    fn respects_document_and_token_limits() {
        let two = ContextLimits {
            max_documents: 2,
            ..limits()
        };
        assert_eq!(DocumentContext::from_correlation(&sample(), &two).unwrap().len(), 2);

        let tiny = ContextLimits {
            max_tokens: 1,
            ..limits()
        };
        assert!(DocumentContext::from_correlation(&sample(), &tiny).is_none());
    }

    #[test]
    fn excerpts_and_citations_are_truncated() {
        let mut result = sample();
        result.pattern_correlations[0].documents[1].highlighted_excerpt = "x".repeat(200);
        let ctx = DocumentContext::from_correlation(&result, &limits()).unwrap();
        assert_eq!(ctx.documents[0].excerpt.chars().count(), 40);

        let citations = ctx.citations(10);
        assert_eq!(citations.len(), 3);
        assert_eq!(citations[0].excerpt, "xxxxxxx...");
    }

    #[test]
    fn duplicate_paths_keep_best_score() {
        let mut result = sample();
        result.error_correlations[0].documents.push(doc("b.md", 0.1, "dup"));
        let ctx = DocumentContext::from_correlation(&result, &limits()).unwrap();
        assert_eq!(ctx.len(), 3);
        assert!((ctx.documents[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn empty_correlation_has_no_context() {
        assert!(DocumentContext::from_correlation(&CorrelationResult::default(), &limits()).is_none());
    }

    #[test]
    fn truncate_chars_is_char_boundary_safe() {
        assert_eq!(truncate_chars("héllo wörld", 8), "héllo...");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn truncate_chars_never_exceeds_limit() {
        assert_eq!(truncate_chars("abcdef", 0), "");
        assert_eq!(truncate_chars("abcdef", 1), "a");
        assert_eq!(truncate_chars("abcdef", 2), "ab");
        assert_eq!(truncate_chars("abcdef", 3), "...");
        for max in 0..8 {
            assert!(truncate_chars("héllo wörld", max).chars().count() <= max);
        }
    }

    #[test]
    fn render_lists_documents() {
        let ctx = DocumentContext::from_correlation(&sample(), &limits()).unwrap();
        let text = ctx.render(2);
        assert!(text.contains("[1] Title b.md"));
        assert!(text.contains("[2] Title c.md"));
        assert!(!text.contains("a.md"));
    }
}
