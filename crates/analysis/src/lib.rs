//! # Loglens Analysis
//!
//! AI enrichment of rule-based log analysis, grounded in retrieved
//! documentation.
//!
//! ## Pipeline
//!
//! ```text
//! &[LogEntry]
//!     │
//!     ├──> LogAnalyzer          (base analysis, fatal on error)
//!     ├──> Correlator           (optional, degrades to no context)
//!     │      └─> DocumentContext (ranked, token-budgeted)
//!     ├──> summary completion   (fatal on error)
//!     │
//!     └──> concurrent sections under the shared limiter
//!            ├─> error analysis
//!            ├─> root causes (confidence-filtered)
//!            └─> recommendations
//! ```
//!
//! A section that fails leaves its field empty or degraded instead of failing
//! the request; [`AiAnalysis::section_status`] records what happened.

mod config;
mod context;
mod correlation;
mod error;
mod orchestrator;
pub mod prompts;
mod provider;
mod response;
mod types;

pub use config::{AnalyzerConfig, MAX_CONCURRENT_REQUESTS};
pub use context::{
    truncate_chars, ContextDocument, ContextLimits, ContextSource, DocumentContext,
    SourceCitation, CHARS_PER_TOKEN,
};
pub use correlation::{
    CorrelationResult, Correlator, DocumentMatch, ErrorCorrelation, PatternCorrelation,
};
pub use error::{AnalysisError, Result};
pub use orchestrator::AiAnalyzer;
pub use provider::{CompletionProvider, CompletionRequest, CompletionResponse};
pub use response::{parse_structured, ParsedResponse};
pub use types::{
    AiAnalysis, AnalysisSection, BaseAnalysis, ErrorAnalysis, ErrorCategory, LogAnalyzer,
    LogEntry, LogLevel, PatternMatch, Priority, Recommendation, RootCause, SectionStatus,
    TokenUsage,
};

pub use tokio_util::sync::CancellationToken;
