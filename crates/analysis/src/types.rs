use crate::context::{DocumentContext, SourceCitation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl LogLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub timestamp: Option<String>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub line_number: usize,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            level,
            message: message.into(),
            source: None,
            line_number: 0,
        }
    }
}

/// A recurring pattern recognised by the base analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub name: String,
    pub count: usize,
    #[serde(default)]
    pub description: String,
}

/// Output of the (external) rule-based log analyzer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseAnalysis {
    pub total_entries: usize,
    pub errors: Vec<LogEntry>,
    pub warnings: Vec<LogEntry>,
    #[serde(default)]
    pub patterns: Vec<PatternMatch>,
    #[serde(default)]
    pub summary: String,
}

impl BaseAnalysis {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Entry counts per level across errors and warnings.
    #[must_use]
    pub fn severity_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.errors.iter().chain(self.warnings.iter()) {
            *counts.entry(entry.level.as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

/// The rule-based analysis step that precedes AI enrichment.
pub trait LogAnalyzer: Send + Sync {
    fn analyze(&self, entries: &[LogEntry]) -> anyhow::Result<BaseAnalysis>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn add(&mut self, other: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCategory {
    pub name: String,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    pub summary: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub categories: Vec<ErrorCategory>,
    #[serde(default)]
    pub critical_errors: Vec<String>,
    #[serde(default)]
    pub severity_counts: BTreeMap<String, usize>,
    #[serde(default)]
    pub citations: Vec<SourceCitation>,
}

impl ErrorAnalysis {
    /// Best-effort analysis when the model reply could not be parsed.
    #[must_use]
    pub fn fallback(raw: &str, base: &BaseAnalysis) -> Self {
        let trimmed = raw.trim();
        let summary = if trimmed.is_empty() {
            base.summary.clone()
        } else {
            crate::context::truncate_chars(trimmed, 1_000)
        };
        Self {
            summary,
            severity: String::new(),
            categories: Vec::new(),
            critical_errors: Vec::new(),
            severity_counts: base.severity_counts(),
            citations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCause {
    pub description: String,
    pub confidence: f32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub citations: Vec<SourceCitation>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default)]
    pub citations: Vec<SourceCitation>,
}

/// The optional, concurrently generated parts of an [`AiAnalysis`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSection {
    ErrorAnalysis,
    RootCause,
    Recommendations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    /// Parsed structured output was attached.
    Completed,
    /// The reply was unparseable; a fallback (possibly empty) was attached.
    Degraded,
    /// The completion call failed.
    Failed,
    /// Cancelled while waiting for admission.
    Aborted,
    /// Disabled by config or not applicable to the input.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct AiAnalysis {
    pub base: BaseAnalysis,
    pub summary: String,
    pub error_analysis: Option<ErrorAnalysis>,
    pub root_causes: Vec<RootCause>,
    pub recommendations: Vec<Recommendation>,
    pub document_context: Option<DocumentContext>,
    pub usage: TokenUsage,
    pub section_status: BTreeMap<AnalysisSection, SectionStatus>,
}

impl AiAnalysis {
    #[must_use]
    pub fn status(&self, section: AnalysisSection) -> Option<SectionStatus> {
        self.section_status.get(&section).copied()
    }
}
