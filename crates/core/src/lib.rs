pub mod config;
pub mod models;

use std::borrow::Cow;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub enum AppError {
    /// Missing or malformed input.
    Validation(Cow<'static, str>),
    NotFound(Cow<'static, str>),
    /// The database rejected or failed an operation. `message` is what the client sees.
    Storage { message: &'static str, source: anyhow::Error },
}

impl AppError {
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation(message) | Self::NotFound(message) => message.as_ref(),
            Self::Storage { message, .. } => *message,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Storage { message, source } = &self {
            tracing::error!("{}: {:?}", message, source);
        }
        (self.status(), Json(ErrorBody { error: self.message() })).into_response()
    }
}

/// Attach the client-facing message to a failed storage operation.
pub trait StorageContext<T> {
    fn or_storage(self, message: &'static str) -> Result<T, AppError>;
}

impl<T, E: Into<anyhow::Error>> StorageContext<T> for Result<T, E> {
    fn or_storage(self, message: &'static str) -> Result<T, AppError> {
        self.map_err(|err| AppError::Storage { message, source: err.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status() {
        assert_eq!(AppError::validation("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::not_found("gone").status(), StatusCode::NOT_FOUND);
        let err: Result<(), _> = Err(anyhow::anyhow!("disk full"));
        let err = err.or_storage("Failed to add project").unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Failed to add project");
    }
}
