//! Maps [`DispatchError`] onto the REST boundary's status codes:
//! `NotFound -> 404`, `Conflict -> 409`, `Timeout -> 504`,
//! `Unavailable -> 502`, `Malformed -> 422`, `Invariant -> 500`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::DispatchError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn internal_error(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: message.into() }),
    )
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = match &self {
            DispatchError::NotFound(_) => StatusCode::NOT_FOUND,
            DispatchError::Conflict(_) => StatusCode::CONFLICT,
            DispatchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            DispatchError::Unavailable(_) => StatusCode::BAD_GATEWAY,
            DispatchError::Malformed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DispatchError::Invariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}
