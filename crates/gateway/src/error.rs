//! Mapping of memory errors onto HTTP responses.

use {
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    saturn_memory::MemoryError,
    tracing::{error, warn},
};

use crate::params::ErrorBody;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<MemoryError> for ApiError {
    fn from(err: MemoryError) -> Self {
        let status = match &err {
            MemoryError::Validation(_) => StatusCode::BAD_REQUEST,
            MemoryError::NotFound(_) => StatusCode::NOT_FOUND,
            MemoryError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %err, "request failed");
        } else {
            warn!(error = %err, status = status.as_u16(), "request rejected");
        }
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                detail: self.detail,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (MemoryError::validation("bad"), StatusCode::BAD_REQUEST),
            (MemoryError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                MemoryError::ModelUnavailable("loading".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                MemoryError::Embedding("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                MemoryError::DimensionMismatch {
                    expected: 768,
                    actual: 3,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn validation_detail_is_the_message() {
        let err = ApiError::from(MemoryError::validation("content too short"));
        assert_eq!(err.detail(), "content too short");
    }
}
