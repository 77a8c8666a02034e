use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::Settings;
use crate::middleware::request_id::{request_id_layer, X_REQUEST_ID};
use crate::pipeline::DocumentProcessor;
use crate::repository::DocumentStore;
use crate::routes;
use crate::services::AnalysisCache;
use crate::storage::StorageRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<dyn DocumentStore>,
    pub storage: Arc<StorageRegistry>,
    pub cache: Arc<dyn AnalysisCache>,
    pub processor: Arc<DocumentProcessor>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Arc<dyn DocumentStore>,
        storage: Arc<StorageRegistry>,
        cache: Arc<dyn AnalysisCache>,
        processor: Arc<DocumentProcessor>,
    ) -> Arc<Self> {
        Arc::new(Self {
            settings,
            store,
            storage,
            cache,
            processor,
        })
    }
}

/// Router with the middleware stack. Layers listed first wrap the ones after them.
pub fn create_app(state: Arc<AppState>) -> Router {
    let (set_request_id, propagate_request_id) = request_id_layer();

    let middleware = ServiceBuilder::new()
        .layer(build_cors_layer(&state.settings))
        .map_response(|res: axum::response::Response<_>| res.map(axum::body::Body::new))
        .layer(set_request_id)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(propagate_request_id)
        .layer(DefaultBodyLimit::max(state.settings.max_upload_bytes));

    Router::new()
        .merge(routes::api_router())
        .layer(middleware)
        .with_state(state)
}

/// Browser clients read `Content-Disposition` on `/view` and correlate
/// failures through `x-request-id`.
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_allow_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let preflight_max_age = Duration::from_secs(if settings.env.is_dev() { 86_400 } else { 3_600 });
    let request_id = HeaderName::from_static(X_REQUEST_ID);

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, request_id.clone()])
        .expose_headers([header::CONTENT_DISPOSITION, request_id])
        .max_age(preflight_max_age)
}
