//! Background processing of uploaded documents.
//!
//! [`queue`] carries document ids from request handlers to a worker task;
//! [`processor`] owns the document status state machine.

pub mod processor;
pub mod queue;

pub use processor::{AnalysisOutcome, DocumentProcessor, FixOutcome, JobOutcome, PipelineSettings};
pub use queue::{spawn_worker, JobQueue, JobReceiver};

use thiserror::Error;
use uuid::Uuid;

use crate::domain::documents::DocumentStatus;
use crate::repository::RepositoryError;
use crate::services::{AiError, ExtractionError};
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("document {0} not found")]
    NotFound(Uuid),

    #[error("could not read stored file: {0}")]
    Storage(#[from] StorageError),

    #[error("text extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("text extraction returned no text")]
    EmptyExtraction,

    #[error("text extraction timed out after {0} seconds")]
    ExtractionTimeout(u64),

    #[error("document is {0}, not completed")]
    NotReady(DocumentStatus),

    #[error(transparent)]
    Ai(#[from] AiError),

    #[error("document store error: {0}")]
    Store(RepositoryError),
}

impl From<RepositoryError> for ProcessingError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}
