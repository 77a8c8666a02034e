//! Document status state machine.
//!
//! `pending -> processing -> {completed, error}`, with `error` (and stalled
//! `processing`) re-entering `processing` when analysis is requested. Every
//! mutation replaces the whole record through the [`DocumentStore`].

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::{JobQueue, ProcessingError};
use crate::analysis::{CleaningAnalyzer, StructuredAnalysis, ANALYSIS_VERSION};
use crate::domain::documents::{
    AnalysisPendingResponse, AnalysisReadyResponse, AnalysisSource, ConversationEntry, Document,
    DocumentStatus, FixAnalysisFailure, FixAnalysisResponse,
};
use crate::repository::DocumentStore;
use crate::services::{AiFallback, TextExtractor};
use crate::storage::StorageRegistry;

/// Tunables for the state machine.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// A document in `processing` longer than this is considered stalled.
    pub stall_threshold: Duration,
    /// Hard limit on a single extraction call.
    pub parse_timeout: Duration,
    /// Heuristic results with fewer elements go to the AI fallback.
    pub ai_fallback_min_elements: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            stall_threshold: Duration::from_secs(120),
            parse_timeout: Duration::from_secs(600),
            ai_fallback_min_elements: 1,
        }
    }
}

/// Result of one background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { elements: usize },
    AlreadyCompleted,
}

/// Answer to an analysis request.
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    Ready(AnalysisReadyResponse),
    Pending(AnalysisPendingResponse),
}

#[derive(Debug, Clone)]
pub enum FixOutcome {
    Fixed(FixAnalysisResponse),
    Failed(FixAnalysisFailure),
}

/// Report text for an analysis and whether the model wrote it.
struct Report {
    text: String,
    from_model: bool,
}

pub struct DocumentProcessor {
    store: Arc<dyn DocumentStore>,
    storage: Arc<StorageRegistry>,
    extractor: Arc<dyn TextExtractor>,
    analyzer: Arc<CleaningAnalyzer>,
    fallback: AiFallback,
    queue: JobQueue,
    settings: PipelineSettings,
}

fn pending(status: &str, analysis: &str, estimated_time: &str) -> AnalysisOutcome {
    AnalysisOutcome::Pending(AnalysisPendingResponse {
        analysis: analysis.to_string(),
        status: status.to_string(),
        estimated_time: estimated_time.to_string(),
    })
}

fn ready(document: &Document, source: AnalysisSource) -> AnalysisOutcome {
    let (elements, summary) = match &document.structured_analysis {
        Some(analysis) => (analysis.elements.clone(), analysis.summary.clone()),
        None => Default::default(),
    };
    AnalysisOutcome::Ready(AnalysisReadyResponse {
        document_id: document.id,
        title: document.title.clone(),
        status: document.status,
        analysis: document.ai_analysis_text.clone().unwrap_or_default(),
        elements,
        summary,
        source,
    })
}

impl DocumentProcessor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        storage: Arc<StorageRegistry>,
        extractor: Arc<dyn TextExtractor>,
        analyzer: Arc<CleaningAnalyzer>,
        fallback: AiFallback,
        queue: JobQueue,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            storage,
            extractor,
            analyzer,
            fallback,
            queue,
            settings,
        }
    }

    pub fn analyzer(&self) -> &Arc<CleaningAnalyzer> {
        &self.analyzer
    }

    pub fn fallback(&self) -> &AiFallback {
        &self.fallback
    }

    /// Queue background processing for a document.
    pub fn schedule(&self, document_id: Uuid) -> bool {
        self.queue.enqueue(document_id)
    }

    pub fn accepts_jobs(&self) -> bool {
        !self.queue.is_closed()
    }

    // =========================================================================
    // Background job
    // =========================================================================

    /// Job boundary: failures are recorded on the document, never propagated.
    pub async fn run_job(&self, document_id: Uuid) {
        match self.process_document(document_id).await {
            Ok(JobOutcome::Completed { elements }) => {
                info!(document_id = %document_id, elements, "Document processed");
            }
            Ok(JobOutcome::AlreadyCompleted) => {
                debug!(document_id = %document_id, "Document already completed, job skipped");
            }
            Err(ProcessingError::NotFound(_)) => {
                warn!(document_id = %document_id, "Document disappeared before processing");
            }
            Err(e) => {
                error!(document_id = %document_id, error = %e, "Document processing failed");
                self.record_failure(document_id, &e).await;
            }
        }
    }

    async fn record_failure(&self, document_id: Uuid, failure: &ProcessingError) {
        let mut document = match self.store.get(document_id).await {
            Ok(document) => document,
            Err(e) => {
                error!(document_id = %document_id, error = %e, "Could not load document to record failure");
                return;
            }
        };

        document.status = DocumentStatus::Error;
        document.processing_error = Some(failure.to_string());
        document.processing_completed = None;
        document.touch();

        if let Err(e) = self.store.save(&document).await {
            error!(document_id = %document_id, error = %e, "Could not record processing failure");
        }
    }

    /// Extract, analyze and persist one document.
    #[instrument(skip(self))]
    pub async fn process_document(&self, document_id: Uuid) -> Result<JobOutcome, ProcessingError> {
        let mut document = self.store.get(document_id).await?;

        // Advisory only: two jobs started before either write can both run.
        if document.status == DocumentStatus::Completed {
            return Ok(JobOutcome::AlreadyCompleted);
        }

        document.status = DocumentStatus::Processing;
        document.processing_started = Some(Utc::now());
        document.processing_completed = None;
        document.processing_error = None;
        document.touch();
        self.store.save(&document).await?;
        info!(status = %document.status, "Processing started");

        let data = self
            .storage
            .get(document.storage_type, &document.storage_ref)
            .await?;

        let text = tokio::time::timeout(
            self.settings.parse_timeout,
            self.extractor.extract(data, &document.filename),
        )
        .await
        .map_err(|_| ProcessingError::ExtractionTimeout(self.settings.parse_timeout.as_secs()))??;

        if text.trim().is_empty() {
            return Err(ProcessingError::EmptyExtraction);
        }
        debug!(chars = text.len(), extractor = self.extractor.name(), "Text extracted");

        let analysis = self.analyzer.analyze(&text, false).await;
        let report = self.build_report(&text, &analysis).await;
        let elements = analysis.elements.len();

        document.extracted_text = text;
        document.structured_analysis = Some(analysis);
        document.ai_analysis_text = Some(report.text);
        document.analysis_version = ANALYSIS_VERSION;
        document.status = DocumentStatus::Completed;
        document.processing_completed = Some(Utc::now());
        document.touch();
        self.store.save(&document).await?;

        Ok(JobOutcome::Completed { elements })
    }

    /// Heuristic report, or the model's text when the heuristics found too
    /// little. Model failures fall back to the heuristic report.
    async fn build_report(&self, text: &str, analysis: &StructuredAnalysis) -> Report {
        if analysis.elements.len() < self.settings.ai_fallback_min_elements
            && self.fallback.is_enabled()
        {
            match self.fallback.analyze(text).await {
                Ok(text) => {
                    return Report {
                        text,
                        from_model: true,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "AI fallback failed, keeping heuristic result");
                }
            }
        }

        Report {
            text: analysis.report(),
            from_model: false,
        }
    }

    // =========================================================================
    // Analysis retrieval
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn get_analysis(
        &self,
        document_id: Uuid,
        force_refresh: bool,
    ) -> Result<AnalysisOutcome, ProcessingError> {
        let mut document = self.store.get(document_id).await?;

        if !force_refresh && document.analysis_is_current() {
            debug!(source = "stored", "Serving stored analysis");
            return Ok(ready(&document, AnalysisSource::Stored));
        }

        match document.status {
            DocumentStatus::Processing => {
                let elapsed = document
                    .processing_started
                    .and_then(|started| (Utc::now() - started).to_std().ok())
                    .unwrap_or(Duration::MAX);

                if elapsed > self.settings.stall_threshold {
                    warn!(
                        elapsed_seconds = elapsed.as_secs(),
                        "Processing stalled, restarting"
                    );
                    document.processing_started = Some(Utc::now());
                    document.touch();
                    self.store.save(&document).await?;
                    self.schedule(document.id);
                    return Ok(pending(
                        "reprocessing",
                        "El procesamiento anterior se detuvo y se reinició el análisis.",
                        "30-60 segundos",
                    ));
                }

                Ok(pending(
                    "processing",
                    "El documento se está procesando. Intente nuevamente en 5-10 segundos.",
                    "5-10 segundos",
                ))
            }
            DocumentStatus::Pending | DocumentStatus::Error => {
                self.restart(&mut document).await?;
                Ok(pending(
                    "processing",
                    "El procesamiento del documento ha comenzado.",
                    "30-60 segundos",
                ))
            }
            DocumentStatus::Completed if document.extracted_text.trim().is_empty() => {
                self.restart(&mut document).await?;
                Ok(pending(
                    "processing",
                    "El documento no tiene texto extraído; se está procesando nuevamente.",
                    "30-60 segundos",
                ))
            }
            DocumentStatus::Completed => {
                let source = self.regenerate(&mut document, force_refresh).await?;
                Ok(ready(&document, source))
            }
        }
    }

    async fn restart(&self, document: &mut Document) -> Result<(), ProcessingError> {
        info!(document_id = %document.id, from = %document.status, "Scheduling processing");
        document.status = DocumentStatus::Processing;
        document.processing_started = Some(Utc::now());
        document.processing_completed = None;
        document.processing_error = None;
        document.touch();
        self.store.save(document).await?;
        self.schedule(document.id);
        Ok(())
    }

    async fn regenerate(
        &self,
        document: &mut Document,
        force_refresh: bool,
    ) -> Result<AnalysisSource, ProcessingError> {
        let analysis = self
            .analyzer
            .analyze(&document.extracted_text, force_refresh)
            .await;
        let report = self.build_report(&document.extracted_text, &analysis).await;
        let elements = analysis.elements.len();

        document.structured_analysis = Some(analysis);
        document.ai_analysis_text = Some(report.text);
        document.analysis_version = ANALYSIS_VERSION;
        document.touch();
        self.store.save(document).await?;

        let source = if report.from_model {
            AnalysisSource::Gemini
        } else {
            AnalysisSource::Regenerated
        };
        info!(document_id = %document.id, elements, source = ?source, "Analysis regenerated");
        Ok(source)
    }

    // =========================================================================
    // Operator actions
    // =========================================================================

    /// Discard stored analysis and rebuild it from the extracted text, bypassing the cache.
    #[instrument(skip(self))]
    pub async fn fix_analysis(&self, document_id: Uuid) -> Result<FixOutcome, ProcessingError> {
        let mut document = self.store.get(document_id).await?;

        if document.extracted_text.trim().is_empty() {
            return Ok(FixOutcome::Failed(FixAnalysisFailure {
                error: "no_text".to_string(),
                message: "El documento no tiene texto extraído todavía.".to_string(),
            }));
        }

        document.clear_analysis();
        let analysis = self.analyzer.analyze(&document.extracted_text, true).await;
        let summary = analysis.summary.clone();
        let elements_found = analysis.elements.len();

        let report = if analysis.is_empty() {
            match self.fallback.analyze(&document.extracted_text).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!(error = %e, "AI fallback failed during fix");
                    None
                }
            }
        } else {
            Some(analysis.report())
        };

        document.structured_analysis = Some(analysis);
        document.touch();

        let Some(text) = report else {
            self.store.save(&document).await?;
            return Ok(FixOutcome::Failed(FixAnalysisFailure {
                error: "no_elements".to_string(),
                message: "No se pudieron detectar elementos de inspección en el documento."
                    .to_string(),
            }));
        };

        document.ai_analysis_text = Some(text.clone());
        document.analysis_version = ANALYSIS_VERSION;
        self.store.save(&document).await?;
        info!(elements = elements_found, "Analysis fixed");

        Ok(FixOutcome::Fixed(FixAnalysisResponse {
            success: true,
            elements_found,
            analysis: text,
            summary,
        }))
    }

    /// Answer a question about a completed document and log both turns.
    #[instrument(skip(self, message))]
    pub async fn chat(&self, document_id: Uuid, message: &str) -> Result<String, ProcessingError> {
        let document = self.store.get(document_id).await?;
        if document.status != DocumentStatus::Completed {
            return Err(ProcessingError::NotReady(document.status));
        }

        let reply = self.fallback.chat(&document, message).await?;

        self.store
            .append_conversation(
                document_id,
                &[
                    ConversationEntry::user(message),
                    ConversationEntry::assistant(reply.clone()),
                ],
            )
            .await?;

        Ok(reply)
    }
}
