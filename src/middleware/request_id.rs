//! Request ids: `req-<uuid>` generated at the edge unless the caller sent one,
//! echoed on the response and logged with uploads.

use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates `req-` prefixed ids so they stand out from document ids in logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixedRequestId;

impl MakeRequestId for PrefixedRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = format!("req-{}", Uuid::new_v4().simple());
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

pub fn request_id_layer() -> (SetRequestIdLayer<PrefixedRequestId>, PropagateRequestIdLayer) {
    let header_name = HeaderName::from_static(X_REQUEST_ID);

    (
        SetRequestIdLayer::new(header_name.clone(), PrefixedRequestId),
        PropagateRequestIdLayer::new(header_name),
    )
}

pub trait RequestIdExt {
    /// The request id, or `-` when absent or not valid UTF-8.
    fn request_id(&self) -> &str;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> &str {
        self.get(X_REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_prefixed() {
        let request = Request::new(());
        let id = PrefixedRequestId.make_request_id(&request).unwrap();
        let value = id.header_value().to_str().unwrap();
        assert!(value.starts_with("req-"));
        assert_eq!(value.len(), 4 + 32);
    }

    #[test]
    fn test_missing_header_reads_as_dash() {
        let mut headers = HeaderMap::new();
        assert_eq!(headers.request_id(), "-");
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("req-abc"));
        assert_eq!(headers.request_id(), "req-abc");
    }
}
