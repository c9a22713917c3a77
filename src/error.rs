//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::repository::RepositoryError;
use crate::service::ServiceError;
use crate::transaction::TransactionError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(e) => AppError::Domain(e),
            ServiceError::Transaction(e) => AppError::Transaction(e),
            ServiceError::Repository(RepositoryError::Database(e)) => AppError::Database(e),
            ServiceError::Repository(e) => AppError::Internal(e.to_string()),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::MissingHeader(_) => (StatusCode::BAD_REQUEST, "missing_header"),

            AppError::Domain(domain_err) => match domain_err {
                DomainError::InsufficientFunds { .. } => {
                    (StatusCode::CONFLICT, "insufficient_funds")
                }
                DomainError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "invalid_amount"),
                DomainError::BalanceOverflow(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "balance_overflow")
                }
                DomainError::UserNotFound(_) => (StatusCode::NOT_FOUND, "user_not_found"),
                DomainError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "account_not_found"),
                DomainError::MachineNotFound(_) => (StatusCode::FORBIDDEN, "machine_not_found"),
                DomainError::SameAccountTransfer => {
                    (StatusCode::BAD_REQUEST, "same_account_transfer")
                }
                DomainError::TooManyAccounts { .. } => {
                    (StatusCode::CONFLICT, "too_many_accounts")
                }
                DomainError::EmailNotVerified => (StatusCode::FORBIDDEN, "email_not_verified"),
            },

            AppError::Transaction(_) => (StatusCode::INTERNAL_SERVER_ERROR, "transaction_error"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        let body = if status.is_server_error() {
            match &self {
                AppError::Transaction(e) if e.is_outcome_uncertain() => {
                    tracing::error!(error = %e, "Unit of work outcome unknown");
                }
                other => tracing::error!(error = %other, "Request failed"),
            }
            ErrorResponse {
                error: "Internal server error".to_string(),
                error_code: error_code.to_string(),
                details: None,
            }
        } else {
            let details = match &self {
                AppError::InvalidRequest(msg) => Some(msg.clone()),
                AppError::MissingHeader(header) => Some(header.clone()),
                _ => None,
            };
            ErrorResponse {
                error: self.to_string(),
                error_code: error_code.to_string(),
                details,
            }
        };

        (status, Json(body)).into_response()
    }
}
