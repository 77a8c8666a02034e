//! Client-side polling of a document's analysis.
//!
//! Polls `analyze` while the server reports work in progress, forces a
//! reload when loading takes too long, and gives up after a fixed number of
//! failed attempts with a terminal [`PollOutcome::Failed`].

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::documents::{AnalysisPendingResponse, AnalysisReadyResponse};

#[derive(Debug, Error)]
pub enum PollError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
}

/// Server answer to an analyze call.
#[derive(Debug, Clone)]
pub enum AnalyzeReply {
    Ready(Box<AnalysisReadyResponse>),
    Pending(AnalysisPendingResponse),
}

#[async_trait]
pub trait AnalysisEndpoint: Send + Sync {
    async fn analyze(&self, document_id: Uuid, refresh: bool) -> Result<AnalyzeReply, PollError>;

    /// Returns whether the server managed to rebuild the analysis.
    async fn fix_analysis(&self, document_id: Uuid) -> Result<bool, PollError>;
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    /// Continuous loading longer than this triggers a force reload.
    pub force_reload_after: Duration,
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            force_reload_after: Duration::from_secs(60),
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PollOutcome {
    Ready(Box<AnalysisReadyResponse>),
    /// Terminal; the poller sends no further requests.
    Failed { attempts: u32, reason: String },
}

pub struct AnalysisPoller<E> {
    endpoint: E,
    config: PollerConfig,
}

impl<E: AnalysisEndpoint> AnalysisPoller<E> {
    pub fn new(endpoint: E, config: PollerConfig) -> Self {
        Self { endpoint, config }
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub async fn wait_for_analysis(&self, document_id: Uuid) -> PollOutcome {
        let mut attempts = 0u32;
        let mut loading_since = Instant::now();

        loop {
            match self.endpoint.analyze(document_id, false).await {
                Ok(AnalyzeReply::Ready(analysis)) => return PollOutcome::Ready(analysis),
                Ok(AnalyzeReply::Pending(pending)) => {
                    debug!(document_id = %document_id, status = %pending.status, "Analysis not ready");

                    if loading_since.elapsed() >= self.config.force_reload_after {
                        attempts += 1;
                        if attempts >= self.config.max_attempts {
                            return PollOutcome::Failed {
                                attempts,
                                reason: "analysis kept loading after force reloads".to_string(),
                            };
                        }

                        match self.endpoint.fix_analysis(document_id).await {
                            Ok(true) => debug!(document_id = %document_id, "Force reload succeeded"),
                            Ok(false) => warn!(document_id = %document_id, "Force reload found nothing"),
                            Err(e) => warn!(document_id = %document_id, error = %e, "Force reload failed"),
                        }
                        loading_since = Instant::now();
                    }
                }
                Err(e) => {
                    attempts += 1;
                    warn!(document_id = %document_id, attempts, error = %e, "Analysis request failed");
                    if attempts >= self.config.max_attempts {
                        return PollOutcome::Failed {
                            attempts,
                            reason: e.to_string(),
                        };
                    }
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

/// [`AnalysisEndpoint`] over the service's HTTP API.
#[derive(Clone)]
pub struct HttpAnalysisEndpoint {
    client: Client,
    base_url: String,
}

impl HttpAnalysisEndpoint {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PollError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn status_error(response: reqwest::Response) -> PollError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        PollError::Status { status, message }
    }
}

#[async_trait]
impl AnalysisEndpoint for HttpAnalysisEndpoint {
    async fn analyze(&self, document_id: Uuid, refresh: bool) -> Result<AnalyzeReply, PollError> {
        let response = self
            .client
            .post(format!("{}/documents/{}/analyze", self.base_url, document_id))
            .query(&[("refresh", refresh)])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(AnalyzeReply::Ready(Box::new(response.json().await?))),
            StatusCode::ACCEPTED => Ok(AnalyzeReply::Pending(response.json().await?)),
            _ => Err(Self::status_error(response).await),
        }
    }

    async fn fix_analysis(&self, document_id: Uuid) -> Result<bool, PollError> {
        let response = self
            .client
            .post(format!("{}/documents/{}/fix-analysis", self.base_url, document_id))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::UNPROCESSABLE_ENTITY => Ok(false),
            _ => Err(Self::status_error(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::CleaningSummary;
    use crate::domain::documents::{AnalysisSource, DocumentStatus};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    enum Step {
        Ready,
        Pending,
        Fail,
    }

    struct ScriptedEndpoint {
        steps: Mutex<VecDeque<Step>>,
        analyze_calls: AtomicU32,
        fix_calls: AtomicU32,
    }

    impl ScriptedEndpoint {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                analyze_calls: AtomicU32::new(0),
                fix_calls: AtomicU32::new(0),
            }
        }
    }

    fn ready_response(document_id: Uuid) -> AnalysisReadyResponse {
        AnalysisReadyResponse {
            document_id,
            title: "Informe".into(),
            status: DocumentStatus::Completed,
            analysis: "El estado del \"Techos\" es Bueno".into(),
            elements: Vec::new(),
            summary: CleaningSummary::default(),
            source: AnalysisSource::Stored,
        }
    }

    #[async_trait]
    impl AnalysisEndpoint for ScriptedEndpoint {
        async fn analyze(&self, document_id: Uuid, _refresh: bool) -> Result<AnalyzeReply, PollError> {
            self.analyze_calls.fetch_add(1, Ordering::SeqCst);
            // An exhausted script keeps answering "processing".
            match self.steps.lock().pop_front().unwrap_or(Step::Pending) {
                Step::Ready => Ok(AnalyzeReply::Ready(Box::new(ready_response(document_id)))),
                Step::Pending => Ok(AnalyzeReply::Pending(AnalysisPendingResponse {
                    analysis: "procesando".into(),
                    status: "processing".into(),
                    estimated_time: "5-10 segundos".into(),
                })),
                Step::Fail => Err(PollError::Status {
                    status: 500,
                    message: "boom".into(),
                }),
            }
        }

        async fn fix_analysis(&self, _document_id: Uuid) -> Result<bool, PollError> {
            self.fix_calls.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }
    }

    fn fast_config() -> PollerConfig {
        PollerConfig {
            poll_interval: Duration::from_millis(1),
            force_reload_after: Duration::from_millis(20),
            max_attempts: 3,
        }
    }

    #[tokio::test]
    async fn test_polls_until_ready() {
        let endpoint = ScriptedEndpoint::new(vec![Step::Pending, Step::Pending, Step::Ready]);
        let poller = AnalysisPoller::new(endpoint, fast_config());

        let outcome = poller.wait_for_analysis(Uuid::new_v4()).await;
        assert!(matches!(outcome, PollOutcome::Ready(_)));
        assert_eq!(poller.endpoint().analyze_calls.load(Ordering::SeqCst), 3);
        assert_eq!(poller.endpoint().fix_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let endpoint = ScriptedEndpoint::new(vec![Step::Fail, Step::Ready]);
        let poller = AnalysisPoller::new(endpoint, fast_config());

        let outcome = poller.wait_for_analysis(Uuid::new_v4()).await;
        assert!(matches!(outcome, PollOutcome::Ready(_)));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_failures() {
        let endpoint = ScriptedEndpoint::new(vec![Step::Fail, Step::Fail, Step::Fail, Step::Ready]);
        let poller = AnalysisPoller::new(endpoint, fast_config());

        let outcome = poller.wait_for_analysis(Uuid::new_v4()).await;
        match outcome {
            PollOutcome::Failed { attempts, .. } => assert_eq!(attempts, 3),
            PollOutcome::Ready(_) => panic!("expected terminal failure"),
        }
        assert_eq!(poller.endpoint().analyze_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_endless_loading_forces_reloads_then_fails() {
        let endpoint = ScriptedEndpoint::new(Vec::new());
        let poller = AnalysisPoller::new(endpoint, fast_config());

        let outcome = poller.wait_for_analysis(Uuid::new_v4()).await;
        assert!(matches!(outcome, PollOutcome::Failed { attempts: 3, .. }));
        assert_eq!(poller.endpoint().fix_calls.load(Ordering::SeqCst), 2);
    }
}
