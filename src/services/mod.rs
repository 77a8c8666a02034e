//! Service layer modules for external integrations.
//!
//! Contains the analysis cache, the generative model client with its fallback
//! adapter, and the text extraction collaborators.

pub mod ai_client;
pub mod cache;
pub mod extraction;
pub mod fallback;

pub use ai_client::{AiError, DisabledModel, GeminiClient, GenerativeModel};
pub use cache::{AnalysisCache, MemoryAnalysisCache, NoopAnalysisCache, RedisCache};
pub use extraction::{ExtractionError, HttpParseExtractor, LocalPdfExtractor, TextExtractor};
pub use fallback::AiFallback;
