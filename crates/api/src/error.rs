//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// No caller identity, or one that does not resolve to a user.
    Unauthorized(String),
    /// The caller is known but not allowed to do this.
    Forbidden(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::InsufficientStock { .. } => (StatusCode::CONFLICT, err.to_string()),
        DomainError::ConflictOrTransient(_) => {
            tracing::warn!(error = %err, "transient failure");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Temporarily unavailable, please retry".to_string(),
            )
        }
        DomainError::Store(_) => {
            tracing::error!(error = %err, "datastore failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal datastore error".to_string(),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

#[cfg(test)]
mod tests {
    use common::ProductId;
    use domain::ValidationError;

    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn domain_taxonomy_maps_to_status_codes() {
        assert_eq!(
            status_of(
                DomainError::NotFound {
                    entity: "Order",
                    id: "x".to_string()
                }
                .into()
            ),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::from(ValidationError::NegativePrice).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(
                DomainError::InsufficientStock {
                    product_id: ProductId::new(),
                    requested: 3,
                    available: 1,
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::ConflictOrTransient("deadlock".to_string()).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn access_errors_map_to_401_and_403() {
        assert_eq!(
            status_of(ApiError::Unauthorized("missing".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ApiError::Forbidden("not yours".to_string())),
            StatusCode::FORBIDDEN
        );
    }
}
