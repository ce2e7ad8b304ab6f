use crate::config::AnalyzerConfig;
use crate::context::{DocumentContext, SourceCitation};
use crate::correlation::Correlator;
use crate::error::{AnalysisError, Result};
use crate::prompts;
use crate::provider::{CompletionProvider, CompletionRequest};
use crate::response::{parse_structured, ParsedResponse, RecommendationList, RootCauseList};
use crate::types::{
    AiAnalysis, AnalysisSection, BaseAnalysis, ErrorAnalysis, LogAnalyzer, LogEntry,
    Recommendation, RootCause, SectionStatus, TokenUsage,
};
use loglens_vector_store::VectorStore;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// AI enrichment on top of a rule-based [`LogAnalyzer`].
///
/// Base analysis, document context and the summary run in order and the
/// request fails if the base analysis or summary fails. The error analysis,
/// root cause and recommendation sections then run concurrently; each one
/// degrades on its own without failing the request.
///
/// Every outbound completion call holds a permit from one semaphore shared by
/// all requests on this instance, so overlapping calls to
/// [`analyze_with_ai`](Self::analyze_with_ai) stay under
/// `max_concurrent_requests` together.
pub struct AiAnalyzer {
    analyzer: Arc<dyn LogAnalyzer>,
    provider: Arc<dyn CompletionProvider>,
    correlator: Option<Arc<dyn Correlator>>,
    config: Arc<AnalyzerConfig>,
    limiter: Arc<Semaphore>,
}

type PromptBuilder = fn(&BaseAnalysis, Option<&DocumentContext>, usize) -> String;

/// Section results gathered by the concurrent phase.
#[derive(Default)]
struct SectionOutputs {
    error_analysis: Option<ErrorAnalysis>,
    root_causes: Vec<RootCause>,
    recommendations: Vec<Recommendation>,
    usage: TokenUsage,
    status: BTreeMap<AnalysisSection, SectionStatus>,
}

enum SectionOutput {
    ErrorAnalysis(ErrorAnalysis),
    RootCauses(Vec<RootCause>),
    Recommendations(Vec<Recommendation>),
}

/// Everything a spawned section task needs, owned.
struct SectionJob {
    section: AnalysisSection,
    request: CompletionRequest,
    provider: Arc<dyn CompletionProvider>,
    limiter: Arc<Semaphore>,
    cancel: CancellationToken,
    base: Arc<BaseAnalysis>,
    citations: Arc<Vec<SourceCitation>>,
    min_confidence: f32,
    outputs: Arc<Mutex<SectionOutputs>>,
}

impl AiAnalyzer {
    pub fn new(
        analyzer: Arc<dyn LogAnalyzer>,
        provider: Arc<dyn CompletionProvider>,
        config: AnalyzerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_requests));
        log::debug!(
            "AI analyzer using provider '{}' with {} concurrent requests",
            provider.name(),
            config.max_concurrent_requests
        );
        Ok(Self {
            analyzer,
            provider,
            correlator: None,
            config: Arc::new(config),
            limiter,
        })
    }

    #[must_use]
    pub fn with_correlator(mut self, correlator: Arc<dyn Correlator>) -> Self {
        self.correlator = Some(correlator);
        self
    }

    /// Hands the document store to the correlator, if one is configured.
    pub fn set_document_store(&self, store: Arc<VectorStore>) {
        match &self.correlator {
            Some(correlator) => correlator.set_document_store(store),
            None => log::debug!("No correlator configured; ignoring document store"),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Permits currently free in the shared limiter.
    #[must_use]
    pub fn limiter_available(&self) -> usize {
        self.limiter.available_permits()
    }

    pub async fn analyze_with_ai(
        &self,
        cancel: &CancellationToken,
        entries: &[LogEntry],
    ) -> Result<AiAnalysis> {
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let base = self
            .analyzer
            .analyze(entries)
            .map_err(|e| AnalysisError::BaseAnalysis(format!("{e:#}")))?;
        log::debug!(
            "Base analysis: {} entries, {} errors, {} warnings",
            base.total_entries,
            base.errors.len(),
            base.warnings.len()
        );

        let document_context = self.document_context(cancel, &base).await;
        if let Some(ctx) = &document_context {
            log::debug!("Using {} context documents", ctx.len());
        }

        let mut usage = TokenUsage::default();
        let summary = self
            .summarize(cancel, &base, document_context.as_ref(), &mut usage)
            .await?;

        let citations = document_context
            .as_ref()
            .map(|ctx| ctx.citations(self.config.citation_excerpt_chars))
            .unwrap_or_default();
        let outputs = self
            .run_sections(cancel, base.clone(), document_context.as_ref(), citations)
            .await;

        usage.add(outputs.usage);
        log::info!(
            "AI analysis complete: {} root causes, {} recommendations, {} tokens",
            outputs.root_causes.len(),
            outputs.recommendations.len(),
            usage.total_tokens
        );
        Ok(AiAnalysis {
            base,
            summary,
            error_analysis: outputs.error_analysis,
            root_causes: outputs.root_causes,
            recommendations: outputs.recommendations,
            document_context,
            usage,
            section_status: outputs.status,
        })
    }

    async fn document_context(
        &self,
        cancel: &CancellationToken,
        base: &BaseAnalysis,
    ) -> Option<DocumentContext> {
        if !self.config.enable_document_context {
            return None;
        }
        let correlator = self.correlator.as_ref()?;
        let result = match correlator.correlate(cancel, base).await {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Correlation failed, continuing without document context: {e:#}");
                return None;
            }
        };
        if result.is_empty() {
            log::debug!("Correlator returned no documents");
            return None;
        }
        DocumentContext::from_correlation(&result, &self.config.context_limits())
    }

    async fn summarize(
        &self,
        cancel: &CancellationToken,
        base: &BaseAnalysis,
        context: Option<&DocumentContext>,
        usage: &mut TokenUsage,
    ) -> Result<String> {
        let request = CompletionRequest::new(prompts::summary_prompt(
            base,
            context,
            self.config.max_error_samples,
        ))
        .system_prompt(prompts::SUMMARY_SYSTEM_PROMPT)
        .max_tokens(self.config.summary_max_tokens)
        .temperature(self.config.temperature);

        let Some(_permit) = acquire_permit(&self.limiter, cancel).await else {
            return Err(AnalysisError::Cancelled);
        };
        let response = self
            .provider
            .complete(cancel, request)
            .await
            .map_err(|e| AnalysisError::Summary(format!("{e:#}")))?;
        usage.add(response.usage);
        Ok(response.content.trim().to_string())
    }

    async fn run_sections(
        &self,
        cancel: &CancellationToken,
        base: BaseAnalysis,
        context: Option<&DocumentContext>,
        citations: Vec<SourceCitation>,
    ) -> SectionOutputs {
        let outputs = Arc::new(Mutex::new(SectionOutputs::default()));
        let base = Arc::new(base);
        let citations = Arc::new(citations);
        let has_errors = base.has_errors();
        let samples = self.config.max_error_samples;

        let plan: [(AnalysisSection, bool, &str, PromptBuilder); 3] = [
            (
                AnalysisSection::ErrorAnalysis,
                self.config.enable_error_analysis && has_errors,
                prompts::ERROR_ANALYSIS_SYSTEM_PROMPT,
                prompts::error_analysis_prompt,
            ),
            (
                AnalysisSection::RootCause,
                self.config.enable_root_cause && has_errors,
                prompts::ROOT_CAUSE_SYSTEM_PROMPT,
                prompts::root_cause_prompt,
            ),
            (
                AnalysisSection::Recommendations,
                self.config.enable_recommendations,
                prompts::RECOMMENDATIONS_SYSTEM_PROMPT,
                prompts::recommendations_prompt,
            ),
        ];

        let mut tasks = JoinSet::new();
        for (section, enabled, system_prompt, build_prompt) in plan {
            if !enabled {
                lock(&outputs).status.insert(section, SectionStatus::Skipped);
                continue;
            }
            let request = CompletionRequest::new(build_prompt(&base, context, samples))
                .system_prompt(system_prompt)
                .max_tokens(self.config.max_tokens)
                .temperature(self.config.temperature);
            tasks.spawn(run_section(SectionJob {
                section,
                request,
                provider: Arc::clone(&self.provider),
                limiter: Arc::clone(&self.limiter),
                cancel: cancel.clone(),
                base: Arc::clone(&base),
                citations: Arc::clone(&citations),
                min_confidence: self.config.min_confidence,
                outputs: Arc::clone(&outputs),
            }));
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                log::warn!("Analysis section task did not finish: {e}");
            }
        }

        let mut guard = lock(&outputs);
        std::mem::take(&mut *guard)
    }
}

async fn run_section(job: SectionJob) {
    let SectionJob {
        section,
        request,
        provider,
        limiter,
        cancel,
        base,
        citations,
        min_confidence,
        outputs,
    } = job;

    let Some(permit) = acquire_permit(&limiter, &cancel).await else {
        log::info!("{section:?} aborted: request cancelled while waiting for a slot");
        lock(&outputs).status.insert(section, SectionStatus::Aborted);
        return;
    };
    let reply = provider.complete(&cancel, request).await;
    drop(permit);

    let response = match reply {
        Ok(response) => response,
        Err(e) => {
            log::warn!("{section:?} failed: {e:#}");
            lock(&outputs).status.insert(section, SectionStatus::Failed);
            return;
        }
    };

    let (status, output) =
        interpret_reply(section, &response.content, &base, &citations, min_confidence);
    if status == SectionStatus::Degraded {
        log::warn!("{section:?} reply was not valid JSON; using fallback");
    }

    let mut guard = lock(&outputs);
    guard.usage.add(response.usage);
    guard.status.insert(section, status);
    match output {
        SectionOutput::ErrorAnalysis(analysis) => guard.error_analysis = Some(analysis),
        SectionOutput::RootCauses(causes) => guard.root_causes = causes,
        SectionOutput::Recommendations(recs) => guard.recommendations = recs,
    }
}

fn interpret_reply(
    section: AnalysisSection,
    content: &str,
    base: &BaseAnalysis,
    citations: &[SourceCitation],
    min_confidence: f32,
) -> (SectionStatus, SectionOutput) {
    match section {
        AnalysisSection::ErrorAnalysis => match parse_structured::<ErrorAnalysis>(content) {
            ParsedResponse::Parsed(mut analysis) => {
                if analysis.severity_counts.is_empty() {
                    analysis.severity_counts = base.severity_counts();
                }
                analysis.citations = citations.to_vec();
                (SectionStatus::Completed, SectionOutput::ErrorAnalysis(analysis))
            }
            ParsedResponse::Degraded(raw) => (
                SectionStatus::Degraded,
                SectionOutput::ErrorAnalysis(ErrorAnalysis::fallback(&raw, base)),
            ),
        },
        AnalysisSection::RootCause => match parse_structured::<RootCauseList>(content) {
            ParsedResponse::Parsed(list) => {
                let causes = list
                    .into_vec()
                    .into_iter()
                    .filter(|cause| cause.confidence >= min_confidence)
                    .map(|mut cause| {
                        cause.citations = citations.to_vec();
                        cause
                    })
                    .collect();
                (SectionStatus::Completed, SectionOutput::RootCauses(causes))
            }
            ParsedResponse::Degraded(_) => {
                (SectionStatus::Degraded, SectionOutput::RootCauses(Vec::new()))
            }
        },
        AnalysisSection::Recommendations => {
            match parse_structured::<RecommendationList>(content) {
                ParsedResponse::Parsed(list) => {
                    let recs = list
                        .into_vec()
                        .into_iter()
                        .map(|mut rec| {
                            rec.citations = citations.to_vec();
                            rec
                        })
                        .collect();
                    (SectionStatus::Completed, SectionOutput::Recommendations(recs))
                }
                ParsedResponse::Degraded(_) => (
                    SectionStatus::Degraded,
                    SectionOutput::Recommendations(Vec::new()),
                ),
            }
        }
    }
}

/// Waits for a limiter permit unless `cancel` fires first.
async fn acquire_permit(
    limiter: &Arc<Semaphore>,
    cancel: &CancellationToken,
) -> Option<OwnedSemaphorePermit> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        permit = Arc::clone(limiter).acquire_owned() => permit.ok(),
    }
}

fn lock(outputs: &Mutex<SectionOutputs>) -> std::sync::MutexGuard<'_, SectionOutputs> {
    outputs.lock().unwrap_or_else(PoisonError::into_inner)
}
