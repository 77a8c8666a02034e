use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::analysis::{CleaningSummary, InspectionElement, StructuredAnalysis, ANALYSIS_VERSION};
use crate::api::PaginationMeta;

/// Processing status of an uploaded document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Error => "error",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    /// Accepts the one-letter codes written by older deployments.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" | "p" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" | "c" => Ok(Self::Completed),
            "error" | "e" => Ok(Self::Error),
            other => Err(format!("unknown document status: {other}")),
        }
    }
}

/// Which blob backend holds the original file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    Local,
    BlobService,
    Database,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Local => "local",
            StorageType::BlobService => "blob_service",
            StorageType::Database => "database",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "file" => Ok(Self::Local),
            "blob_service" | "blob" => Ok(Self::BlobService),
            "database" | "db" => Ok(Self::Database),
            other => Err(format!("unknown storage type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    pub message: String,
    pub from_user: bool,
    pub timestamp: DateTime<Utc>,
}

impl ConversationEntry {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            from_user: true,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            from_user: false,
            timestamp: Utc::now(),
        }
    }
}

/// Document entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub filename: String,
    pub storage_ref: String,
    pub storage_type: StorageType,
    pub file_size: i64,
    pub status: DocumentStatus,
    pub extracted_text: String,
    pub structured_analysis: Option<StructuredAnalysis>,
    pub ai_analysis_text: Option<String>,
    pub analysis_version: i32,
    pub processing_started: Option<DateTime<Utc>>,
    pub processing_completed: Option<DateTime<Utc>>,
    /// Diagnostic for the last failed run; never mixed into `extracted_text`.
    pub processing_error: Option<String>,
    pub conversation: Vec<ConversationEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        title: String,
        description: Option<String>,
        filename: String,
        storage_ref: String,
        storage_type: StorageType,
        file_size: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            filename,
            storage_ref,
            storage_type,
            file_size,
            status: DocumentStatus::Pending,
            extracted_text: String::new(),
            structured_analysis: None,
            ai_analysis_text: None,
            analysis_version: 0,
            processing_started: None,
            processing_completed: None,
            processing_error: None,
            conversation: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_analysis(&self) -> bool {
        self.structured_analysis.is_some()
            && self
                .ai_analysis_text
                .as_deref()
                .is_some_and(|text| !text.trim().is_empty())
    }

    /// Stored analysis can be served as-is.
    pub fn analysis_is_current(&self) -> bool {
        self.status == DocumentStatus::Completed
            && self.analysis_version == ANALYSIS_VERSION
            && self.has_analysis()
    }

    pub fn processing_time_seconds(&self) -> Option<i64> {
        match (self.processing_started, self.processing_completed) {
            (Some(start), Some(end)) if end >= start => Some((end - start).num_seconds()),
            _ => None,
        }
    }

    pub fn clear_analysis(&mut self) {
        self.structured_analysis = None;
        self.ai_analysis_text = None;
        self.analysis_version = 0;
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Where the returned analysis came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Stored,
    Regenerated,
    Gemini,
}

/// Response DTO for an accepted upload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: Uuid,
    pub title: String,
    pub status: DocumentStatus,
    pub message: String,
    pub estimated_time: String,
}

/// List item
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummaryResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub filename: String,
    pub status: DocumentStatus,
    pub has_analysis: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Document> for DocumentSummaryResponse {
    fn from(d: &Document) -> Self {
        Self {
            id: d.id,
            title: d.title.clone(),
            description: d.description.clone(),
            filename: d.filename.clone(),
            status: d.status,
            has_analysis: d.has_analysis(),
            processing_time: d.processing_time_seconds(),
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentSummaryResponse>,
    pub pagination: PaginationMeta,
}

/// Full projection of a document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDetailResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub filename: String,
    pub storage_type: StorageType,
    pub file_size: i64,
    pub status: DocumentStatus,
    pub extracted_text: String,
    pub analysis: Option<StructuredAnalysis>,
    pub ai_analysis_text: Option<String>,
    pub analysis_version: i32,
    pub processing_started: Option<DateTime<Utc>>,
    pub processing_completed: Option<DateTime<Utc>>,
    pub processing_error: Option<String>,
    pub conversation: Vec<ConversationEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentDetailResponse {
    fn from(d: Document) -> Self {
        Self {
            id: d.id,
            title: d.title,
            description: d.description,
            filename: d.filename,
            storage_type: d.storage_type,
            file_size: d.file_size,
            status: d.status,
            extracted_text: d.extracted_text,
            analysis: d.structured_analysis,
            ai_analysis_text: d.ai_analysis_text,
            analysis_version: d.analysis_version,
            processing_started: d.processing_started,
            processing_completed: d.processing_completed,
            processing_error: d.processing_error,
            conversation: d.conversation,
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

/// Lightweight poll target
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatusResponse {
    pub id: Uuid,
    pub status: DocumentStatus,
    pub has_analysis: bool,
    pub processing_started: Option<DateTime<Utc>>,
    pub processing_completed: Option<DateTime<Utc>>,
    pub processing_error: Option<String>,
    pub elapsed_seconds: Option<i64>,
}

impl From<&Document> for DocumentStatusResponse {
    fn from(d: &Document) -> Self {
        let elapsed_seconds = match (d.status, d.processing_started) {
            (DocumentStatus::Processing, Some(start)) => Some((Utc::now() - start).num_seconds()),
            _ => d.processing_time_seconds(),
        };
        Self {
            id: d.id,
            status: d.status,
            has_analysis: d.has_analysis(),
            processing_started: d.processing_started,
            processing_completed: d.processing_completed,
            processing_error: d.processing_error.clone(),
            elapsed_seconds,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeQuery {
    #[serde(default)]
    pub refresh: Option<bool>,
}

/// Analysis available (HTTP 200)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReadyResponse {
    pub document_id: Uuid,
    pub title: String,
    pub status: DocumentStatus,
    pub analysis: String,
    pub elements: Vec<InspectionElement>,
    pub summary: CleaningSummary,
    pub source: AnalysisSource,
}

/// Analysis not ready yet (HTTP 202)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPendingResponse {
    pub analysis: String,
    pub status: String,
    pub estimated_time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixAnalysisResponse {
    pub success: bool,
    pub elements_found: usize,
    pub analysis: String,
    pub summary: CleaningSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAnalysisFailure {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn doc() -> Document {
        Document::new(
            "Informe".into(),
            None,
            "informe.pdf".into(),
            "ref".into(),
            StorageType::Local,
            10,
        )
    }

    #[test]
    fn test_status_parsing_accepts_legacy_codes() {
        assert_eq!("c".parse::<DocumentStatus>().unwrap(), DocumentStatus::Completed);
        assert_eq!("processing".parse::<DocumentStatus>().unwrap(), DocumentStatus::Processing);
        assert!("x".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn test_new_document_is_pending_without_analysis() {
        let d = doc();
        assert_eq!(d.status, DocumentStatus::Pending);
        assert!(!d.has_analysis());
        assert!(!d.analysis_is_current());
    }

    #[test]
    fn test_current_analysis_requires_version_and_text() {
        let mut d = doc();
        d.status = DocumentStatus::Completed;
        d.structured_analysis = Some(StructuredAnalysis::from_elements(Vec::new()));
        d.ai_analysis_text = Some("texto".into());
        d.analysis_version = ANALYSIS_VERSION;
        assert!(d.analysis_is_current());

        d.analysis_version = ANALYSIS_VERSION - 1;
        assert!(!d.analysis_is_current());

        d.analysis_version = ANALYSIS_VERSION;
        d.ai_analysis_text = Some("  ".into());
        assert!(!d.analysis_is_current());
    }

    #[test]
    fn test_processing_time() {
        let mut d = doc();
        let start = Utc::now();
        d.processing_started = Some(start);
        d.processing_completed = Some(start + Duration::seconds(42));
        assert_eq!(d.processing_time_seconds(), Some(42));
    }
}
