//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use unictl_domain::error::UnictlError;
use unictl_domain::id::EntityId;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`UnictlError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(UnictlError);

impl From<UnictlError> for ApiError {
    fn from(err: UnictlError) -> Self {
        Self(err)
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            UnictlError::Validation(_) => StatusCode::BAD_REQUEST,
            UnictlError::NotFound(_) => StatusCode::NOT_FOUND,
            UnictlError::Busy(_) => StatusCode::CONFLICT,
            UnictlError::Action(_) => StatusCode::BAD_GATEWAY,
            UnictlError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            UnictlError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Parse an entity id taken from the URL path.
pub(crate) fn parse_id(raw: &str) -> Result<EntityId, ApiError> {
    EntityId::parse(raw).map_err(|err| ApiError(err.into()))
}
