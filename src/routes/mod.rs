pub mod documents;
pub mod health;

use axum::{routing::get, routing::post, Router};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        // Documents
        .route(
            "/documents",
            post(documents::upload_document).get(documents::list_documents),
        )
        .route(
            "/documents/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/documents/:id/status", get(documents::get_document_status))
        .route("/documents/:id/view", get(documents::view_document))
        // Analysis
        .route("/documents/:id/analyze", post(documents::analyze_document))
        .route("/documents/:id/fix-analysis", post(documents::fix_analysis))
        .route("/documents/:id/chat", post(documents::chat_with_document))
}
