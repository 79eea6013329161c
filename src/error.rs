use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::channel::ChannelError;
use crate::ledger::LedgerError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Auth(e) => match e {
                AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::InvalidRegistration(_) => StatusCode::BAD_REQUEST,
                AuthError::ServiceUnavailable(_) | AuthError::Hashing(_) | AuthError::Signing(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Channel(e) => match e {
                ChannelError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
                ChannelError::NotFound(_) => StatusCode::NOT_FOUND,
                ChannelError::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Ledger(e) => match e {
                LedgerError::InvalidAmount
                | LedgerError::ProductNotFound(_)
                | LedgerError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
                LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
                LedgerError::InvalidTransition { .. } => StatusCode::CONFLICT,
                LedgerError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!("request failed: {}", self);
            "Server error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(json!({ "error": message }))
    }
}
