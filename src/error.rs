use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

/// Every non-2xx response goes through this type so the wire contract stays
/// a JSON object with a `message` field.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("You must be signed in.")]
    Unauthorized,
    #[error("You are not the creator.")]
    NotOwner,
    #[error("You do not own the category for which this item is to be created.")]
    CategoryNotOwned,
    #[error("Invalid state parameter.")]
    InvalidState,
    #[error("{0}")]
    TokenMismatch(&'static str),
    #[error("CSRF token missing or invalid.")]
    CsrfRejected,
    #[error("You must be signed in.")]
    Forbidden,
    #[error("{0} not found.")]
    NotFound(&'static str),
    #[error("You must enter a name.")]
    NameRequired,
    #[error("You must select a category.")]
    CategoryRequired,
    #[error("{0}")]
    BadRequest(String),
    #[error("{1}")]
    UpstreamStatus(StatusCode, String),
    #[error("{0}")]
    Provider(String),
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized
            | ApiError::NotOwner
            | ApiError::CategoryNotOwned
            | ApiError::InvalidState
            | ApiError::TokenMismatch(_) => StatusCode::UNAUTHORIZED,
            ApiError::CsrfRejected | ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NameRequired => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::CategoryRequired | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UpstreamStatus(status, _) => *status,
            ApiError::Provider(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(e) = &self {
            error!(error = ?e, "request failed");
        }
        let body = Json(serde_json::json!({ "message": self.to_string() }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_contract() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotOwner.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::CsrfRejected.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::NotFound("Category").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::NameRequired.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::CategoryRequired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::UpstreamStatus(StatusCode::BAD_GATEWAY, "".into()).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn not_found_message_names_the_resource() {
        assert_eq!(
            ApiError::NotFound("Category").to_string(),
            "Category not found."
        );
        assert_eq!(ApiError::NotFound("Item").to_string(), "Item not found.");
    }
}
