//! Prompt construction for the summary and the three analysis sections.

use crate::context::{truncate_chars, DocumentContext};
use crate::types::BaseAnalysis;
use std::fmt::Write as _;

pub const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a log analysis assistant. Summarize the state of the system in two or three sentences.";

pub const ERROR_ANALYSIS_SYSTEM_PROMPT: &str =
    "You are a log analysis assistant. Classify the errors and assess their severity. Reply with JSON only.";

pub const ROOT_CAUSE_SYSTEM_PROMPT: &str =
    "You are a site reliability engineer. Identify the most likely root causes of the errors. Reply with JSON only.";

pub const RECOMMENDATIONS_SYSTEM_PROMPT: &str =
    "You are a site reliability engineer. Recommend concrete remediation steps. Reply with JSON only.";

const SUMMARY_CONTEXT_DOCUMENTS: usize = 3;
const SAMPLE_MESSAGE_CHARS: usize = 300;

const ERROR_ANALYSIS_SCHEMA: &str = r#"Respond with a JSON object:
{"summary": string, "severity": "low"|"medium"|"high"|"critical",
 "categories": [{"name": string, "count": number, "description": string}],
 "critical_errors": [string]}"#;

const ROOT_CAUSE_SCHEMA: &str = r#"Respond with a JSON array:
[{"description": string, "confidence": number between 0 and 1,
  "category": string, "evidence": [string]}]"#;

const RECOMMENDATIONS_SCHEMA: &str = r#"Respond with a JSON array:
[{"title": string, "description": string,
  "priority": "low"|"medium"|"high"|"critical", "action_items": [string]}]"#;

pub(crate) fn summary_prompt(
    base: &BaseAnalysis,
    context: Option<&DocumentContext>,
    max_error_samples: usize,
) -> String {
    let mut prompt = String::new();
    write_overview(&mut prompt, base);
    write_error_samples(&mut prompt, base, max_error_samples);
    if let Some(ctx) = context {
        let _ = writeln!(prompt, "\nRelated documentation:");
        prompt.push_str(&ctx.render(SUMMARY_CONTEXT_DOCUMENTS));
    }
    prompt.push_str("\nWrite a short summary for an on-call engineer.");
    prompt
}

pub(crate) fn error_analysis_prompt(
    base: &BaseAnalysis,
    context: Option<&DocumentContext>,
    max_error_samples: usize,
) -> String {
    let mut prompt = String::new();
    write_overview(&mut prompt, base);
    write_error_samples(&mut prompt, base, max_error_samples);
    write_context(&mut prompt, context);
    let _ = write!(prompt, "\n{ERROR_ANALYSIS_SCHEMA}");
    prompt
}

pub(crate) fn root_cause_prompt(
    base: &BaseAnalysis,
    context: Option<&DocumentContext>,
    max_error_samples: usize,
) -> String {
    let mut prompt = String::new();
    write_overview(&mut prompt, base);
    write_error_samples(&mut prompt, base, max_error_samples);
    write_patterns(&mut prompt, base);
    write_context(&mut prompt, context);
    let _ = write!(prompt, "\n{ROOT_CAUSE_SCHEMA}");
    prompt
}

pub(crate) fn recommendations_prompt(
    base: &BaseAnalysis,
    context: Option<&DocumentContext>,
    max_error_samples: usize,
) -> String {
    let mut prompt = String::new();
    write_overview(&mut prompt, base);
    write_error_samples(&mut prompt, base, max_error_samples);
    write_patterns(&mut prompt, base);
    write_context(&mut prompt, context);
    let _ = write!(prompt, "\n{RECOMMENDATIONS_SCHEMA}");
    prompt
}

fn write_overview(out: &mut String, base: &BaseAnalysis) {
    let _ = writeln!(
        out,
        "Log overview: {} entries, {} errors, {} warnings.",
        base.total_entries,
        base.errors.len(),
        base.warnings.len()
    );
    if !base.summary.is_empty() {
        let _ = writeln!(out, "Analyzer summary: {}", base.summary);
    }
}

fn write_error_samples(out: &mut String, base: &BaseAnalysis, limit: usize) {
    if base.errors.is_empty() || limit == 0 {
        return;
    }
    let _ = writeln!(out, "\nSample errors:");
    for entry in base.errors.iter().take(limit) {
        let source = entry.source.as_deref().unwrap_or("-");
        let _ = writeln!(
            out,
            "- [{}] {}: {}",
            entry.level.as_str(),
            source,
            truncate_chars(&entry.message, SAMPLE_MESSAGE_CHARS)
        );
    }
}

fn write_patterns(out: &mut String, base: &BaseAnalysis) {
    if base.patterns.is_empty() {
        return;
    }
    let _ = writeln!(out, "\nDetected patterns:");
    for pattern in &base.patterns {
        let _ = writeln!(out, "- {} (x{}) {}", pattern.name, pattern.count, pattern.description);
    }
}

fn write_context(out: &mut String, context: Option<&DocumentContext>) {
    let Some(ctx) = context else {
        return;
    };
    let _ = writeln!(out, "\nRelevant documentation:");
    out.push_str(&ctx.render(ctx.len()));
}
