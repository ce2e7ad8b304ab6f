use crate::types::BaseAnalysis;
use async_trait::async_trait;
use loglens_vector_store::VectorStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One documentation hit produced by the correlator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMatch {
    pub title: String,
    pub path: String,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    pub score: f32,
    #[serde(default)]
    pub highlighted_excerpt: String,
}

/// Documents matched against a named log pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCorrelation {
    pub pattern: String,
    pub documents: Vec<DocumentMatch>,
}

/// Documents matched directly against a class of errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCorrelation {
    pub error_type: String,
    pub match_count: usize,
    pub confidence: f32,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub sample_error: String,
    pub documents: Vec<DocumentMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    #[serde(default)]
    pub pattern_correlations: Vec<PatternCorrelation>,
    #[serde(default)]
    pub error_correlations: Vec<ErrorCorrelation>,
}

impl CorrelationResult {
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.pattern_correlations
            .iter()
            .map(|c| c.documents.len())
            .chain(self.error_correlations.iter().map(|c| c.documents.len()))
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.document_count() == 0
    }
}

/// Maps analysis findings to relevant stored documents.
#[async_trait]
pub trait Correlator: Send + Sync {
    async fn correlate(
        &self,
        cancel: &CancellationToken,
        analysis: &BaseAnalysis,
    ) -> anyhow::Result<CorrelationResult>;

    /// Points the correlator at the store it should search.
    fn set_document_store(&self, store: Arc<VectorStore>);
}
