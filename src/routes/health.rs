use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub services: ServiceHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub database: String,
    pub cache: String,
    pub storage: String,
    pub queue: &'static str,
    pub ai_service: &'static str,
}

fn status_label(ok: bool, backend: &str) -> String {
    format!("{} ({backend})", if ok { "ok" } else { "error" })
}

/// Liveness plus dependency state. Only the document store decides the
/// status code; cache or queue trouble reports `degraded` with 200.
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let (db_ok, cache_result) = tokio::join!(state.store.health_check(), state.cache.health_check());
    let cache_ok = cache_result.is_ok();
    let queue_ok = state.processor.accepts_jobs();

    let status = match (db_ok, cache_ok && queue_ok) {
        (true, true) => "healthy",
        (true, false) => "degraded",
        (false, _) => "unhealthy",
    };
    let code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let services = ServiceHealth {
        database: status_label(db_ok, state.store.backend_name()),
        cache: status_label(cache_ok, state.cache.backend_name()),
        storage: format!("default {}", state.storage.default_type()),
        queue: if queue_ok { "accepting" } else { "closed" },
        ai_service: if state.processor.fallback().is_enabled() {
            "configured"
        } else {
            "disabled"
        },
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            services,
        }),
    )
}
