//! Text extraction from uploaded PDFs.
//!
//! The remote parse service is asynchronous: upload the file, poll the job
//! until it settles, then fetch the text result. Without a parse service the
//! text layer is read locally with `pdf-extract`.

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{multipart, Client};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("parse service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("parse service returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("parse job {job_id} ended with status {status}")]
    JobFailed { job_id: String, status: String },

    #[error("parse job {0} did not finish in time")]
    Timeout(String),

    #[error("PDF text extraction failed: {0}")]
    Pdf(String),

    #[error("extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, data: Vec<u8>, filename: &str) -> Result<String, ExtractionError>;

    fn name(&self) -> &'static str;
}

// =========================================================================
// Remote parse service
// =========================================================================

#[derive(Clone)]
pub struct HttpParseExtractor {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    poll_interval: Duration,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct TextResponse {
    text: String,
}

impl HttpParseExtractor {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        info!(base_url = base_url, "Parse service client initialized");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            poll_interval,
            timeout,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, ExtractionError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(ExtractionError::Remote { status, message })
    }

    async fn upload(&self, data: Vec<u8>, filename: &str) -> Result<String, ExtractionError> {
        let part = multipart::Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str("application/pdf")?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .authorize(self.client.post(format!("{}/upload", self.base_url)))
            .multipart(form)
            .send()
            .await?;

        let body: UploadResponse = Self::checked(response).await?.json().await?;
        Ok(body.id)
    }

    async fn poll_job(&self, url: &str, job_id: &str) -> Result<(), backoff::Error<ExtractionError>> {
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| backoff::Error::transient(ExtractionError::Http(e)))?;
        let job: JobResponse = Self::checked(response)
            .await
            .map_err(backoff::Error::transient)?
            .json()
            .await
            .map_err(|e| backoff::Error::transient(ExtractionError::Http(e)))?;

        match job.status.to_ascii_uppercase().as_str() {
            "SUCCESS" | "COMPLETED" | "DONE" => Ok(()),
            "ERROR" | "FAILED" | "CANCELED" | "CANCELLED" => {
                Err(backoff::Error::permanent(ExtractionError::JobFailed {
                    job_id: job_id.to_string(),
                    status: job.status,
                }))
            }
            _ => {
                debug!(job_id, status = %job.status, "Parse job still running");
                Err(backoff::Error::transient(ExtractionError::Timeout(
                    job_id.to_string(),
                )))
            }
        }
    }

    /// Poll until the job succeeds. Pending jobs and transport errors are
    /// retried with exponential backoff until the timeout elapses.
    async fn wait_for_job(&self, job_id: &str) -> Result<(), ExtractionError> {
        let policy = ExponentialBackoff {
            initial_interval: self.poll_interval,
            max_interval: self.poll_interval * 5,
            max_elapsed_time: Some(self.timeout),
            ..ExponentialBackoff::default()
        };
        let url = format!("{}/job/{}", self.base_url, job_id);

        retry(policy, || self.poll_job(&url, job_id)).await
    }

    async fn fetch_text(&self, job_id: &str) -> Result<String, ExtractionError> {
        let response = self
            .authorize(
                self.client
                    .get(format!("{}/job/{}/result/text", self.base_url, job_id)),
            )
            .send()
            .await?;
        let body: TextResponse = Self::checked(response).await?.json().await?;
        Ok(body.text)
    }
}

#[async_trait]
impl TextExtractor for HttpParseExtractor {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn extract(&self, data: Vec<u8>, filename: &str) -> Result<String, ExtractionError> {
        let job_id = self.upload(data, filename).await?;
        info!(job_id = %job_id, "Parse job submitted");

        self.wait_for_job(&job_id).await?;
        let text = self.fetch_text(&job_id).await?;

        info!(job_id = %job_id, chars = text.len(), "Parse job finished");
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "parse_service"
    }
}

// =========================================================================
// Local text layer
// =========================================================================

/// Reads the embedded text layer; scanned PDFs yield empty text.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalPdfExtractor;

#[async_trait]
impl TextExtractor for LocalPdfExtractor {
    async fn extract(&self, data: Vec<u8>, _filename: &str) -> Result<String, ExtractionError> {
        tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&data)
                .map_err(|e| ExtractionError::Pdf(e.to_string()))
        })
        .await?
    }

    fn name(&self) -> &'static str {
        "pdf_extract"
    }
}
