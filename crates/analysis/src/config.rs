use crate::context::ContextLimits;
use crate::error::{AnalysisError, Result};
use serde::Deserialize;
use std::path::Path;

pub const MAX_CONCURRENT_REQUESTS: usize = 32;

/// Knobs for [`AiAnalyzer`](crate::AiAnalyzer).
///
/// Every field is optional in TOML; missing fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub enable_error_analysis: bool,
    pub enable_root_cause: bool,
    pub enable_recommendations: bool,
    pub enable_document_context: bool,
    /// Global cap on in-flight completion calls for one analyzer instance.
    pub max_concurrent_requests: usize,
    /// Root causes below this confidence are dropped.
    pub min_confidence: f32,
    pub max_context_documents: usize,
    pub max_context_tokens: usize,
    pub max_excerpt_chars: usize,
    pub citation_excerpt_chars: usize,
    pub max_tokens: u32,
    pub summary_max_tokens: u32,
    pub temperature: f32,
    pub max_error_samples: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            enable_error_analysis: true,
            enable_root_cause: true,
            enable_recommendations: true,
            enable_document_context: true,
            max_concurrent_requests: 3,
            min_confidence: 0.5,
            max_context_documents: 5,
            max_context_tokens: 2_000,
            max_excerpt_chars: 500,
            citation_excerpt_chars: 150,
            max_tokens: 1_024,
            summary_max_tokens: 256,
            temperature: 0.3,
            max_error_samples: 3,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut cfg: Self = toml::from_str(raw)?;
        cfg.max_concurrent_requests = cfg.max_concurrent_requests.clamp(1, MAX_CONCURRENT_REQUESTS);
        cfg.validate()?;
        Ok(cfg)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        log::debug!("Loaded analyzer config from {path:?}");
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_requests == 0 {
            return Err(AnalysisError::Config(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(AnalysisError::Config(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AnalysisError::Config(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 || self.summary_max_tokens == 0 {
            return Err(AnalysisError::Config(
                "max_tokens and summary_max_tokens must be positive".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub const fn context_limits(&self) -> ContextLimits {
        ContextLimits {
            max_documents: self.max_context_documents,
            max_tokens: self.max_context_tokens,
            max_excerpt_chars: self.max_excerpt_chars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_toml_yields_defaults() {
        assert_eq!(
            AnalyzerConfig::from_toml_str("").unwrap(),
            AnalyzerConfig::default()
        );
    }

    #[test]
    fn partial_toml_overrides_selected_fields() {
        let cfg = AnalyzerConfig::from_toml_str(
            r#"
enable_root_cause = false
max_concurrent_requests = 999
min_confidence = 0.75
"#,
        )
        .unwrap();
        assert!(!cfg.enable_root_cause);
        assert!(cfg.enable_error_analysis);
        assert_eq!(cfg.max_concurrent_requests, MAX_CONCURRENT_REQUESTS);
        assert!((cfg.min_confidence - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            AnalyzerConfig::from_toml_str("min_confidence = 1.5"),
            Err(AnalysisError::Config(_))
        ));
        assert!(matches!(
            AnalyzerConfig::from_toml_str("max_tokens = \"lots\""),
            Err(AnalysisError::ConfigParse(_))
        ));
    }

    #[tokio::test]
    async fn load_reads_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("analyzer.toml");
        tokio::fs::write(&path, "max_context_documents = 2\n")
            .await
            .unwrap();
        let cfg = AnalyzerConfig::load(&path).await.unwrap();
        assert_eq!(cfg.max_context_documents, 2);
    }
}
