use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Rejected input. Nothing has been written when one of these is returned.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Username already exists. Try using another username!")]
    DuplicateUsername,
    #[error("Email already exists. Try using another email!")]
    DuplicateEmail,
    #[error("{field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl ValidationError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Same outcome for unknown email and wrong password.
    #[error("Login failed. Enter valid credentials!")]
    AuthenticationFailed,

    #[error("You are not allowed to modify this resource")]
    Forbidden,

    /// Malformed, tampered, expired and superseded tokens all end up here.
    #[error("That is an invalid or expired token")]
    TokenInvalid,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(ValidationError::Invalid { .. }) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::CONFLICT,
            AppError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::TokenInvalid => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Database(_) | AppError::Internal(_) => {
                error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({ "error": message });
        if let AppError::Validation(ValidationError::Invalid { field, .. }) = &self {
            body["field"] = json!(field);
        }

        (status, Json(body)).into_response()
    }
}
