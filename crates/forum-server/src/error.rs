//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use forum_core::{Error, ErrorKind};
use serde::Serialize;
use tracing::{debug, error};

/// API error rendered as `{ "error": .., "code": .. }`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            code: "INVALID_INPUT",
        }
    }

    /// Same response for a missing, unknown or expired token
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "unauthorized".to_string(),
            code: "UNAUTHORIZED",
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal server error".to_string(),
            code: "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidInput => Self::bad_request(err.to_string()),
            ErrorKind::NotFound => Self {
                status: StatusCode::NOT_FOUND,
                message: err.to_string(),
                code: "NOT_FOUND",
            },
            ErrorKind::Expired | ErrorKind::NotAuthorized => {
                debug!(error = %err, "Rejecting request");
                Self::unauthorized()
            }
            ErrorKind::Conflict => Self {
                status: StatusCode::CONFLICT,
                message: err.to_string(),
                code: "CONFLICT",
            },
            ErrorKind::Internal => {
                error!(error = %err, "Request failed");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
            code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_maps_to_status() {
        let cases = [
            (Error::invalid_input("bad name"), StatusCode::BAD_REQUEST),
            (Error::not_found("post"), StatusCode::NOT_FOUND),
            (Error::Expired, StatusCode::UNAUTHORIZED),
            (Error::NotAuthorized, StatusCode::UNAUTHORIZED),
            (Error::conflict("archived"), StatusCode::CONFLICT),
            (Error::LockPoisoned.during("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let err = ApiError::from(Error::ImageStorage("s3 key leaked".into()));
        assert_eq!(err.message, "internal server error");
    }
}
