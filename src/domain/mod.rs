//! Domain types and DTOs

pub mod documents;

pub use documents::{Document, DocumentStatus, StorageType};
