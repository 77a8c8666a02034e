//! Response wrappers shared by the document handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

/// Work accepted but not finished; the client should poll again.
pub struct Accepted<T: Serialize>(pub T);

impl<T: Serialize> IntoResponse for Accepted<T> {
    fn into_response(self) -> Response {
        (StatusCode::ACCEPTED, Json(self.0)).into_response()
    }
}

/// Confirmation body for a removed resource.
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: Uuid,
    pub deleted: bool,
    pub message: String,
}

impl Deleted {
    pub fn new(id: Uuid, message: impl Into<String>) -> Self {
        Self {
            id,
            deleted: true,
            message: message.into(),
        }
    }
}

impl IntoResponse for Deleted {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
