use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::domain::bid::{BidStatus, PartyRole};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid transition: {current:?} -> {requested:?} as {role:?}")]
    InvalidTransition {
        current: BidStatus,
        requested: BidStatus,
        role: PartyRole,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Re-authentication with the payment network is required")]
    ReauthRequired,

    #[error("Payment provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<crate::ports::RepositoryError> for AppError {
    fn from(err: crate::ports::RepositoryError) -> Self {
        use crate::ports::RepositoryError;
        match err {
            RepositoryError::NotFound(what) => AppError::NotFound(what),
            RepositoryError::Conflict(what) => AppError::Conflict(what),
            RepositoryError::Storage(what) => AppError::DatabaseError(what),
        }
    }
}

impl From<crate::junopay::GatewayError> for AppError {
    fn from(err: crate::junopay::GatewayError) -> Self {
        use crate::junopay::GatewayError;
        match err {
            GatewayError::ReauthRequired => AppError::ReauthRequired,
            GatewayError::Rejected { status, body } => AppError::ProviderUnavailable(format!(
                "JunoPay rejected the request ({}): {}",
                status, body
            )),
            GatewayError::Unavailable(message) => AppError::ProviderUnavailable(message),
            GatewayError::Store(inner) => AppError::from(inner),
        }
    }
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ReauthRequired => StatusCode::UNAUTHORIZED,
            AppError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            // Clients render "your counter of X can no longer be accepted"
            // style feedback from these fields.
            AppError::InvalidTransition {
                current,
                requested,
                role,
            } => Json(json!({
                "error": self.to_string(),
                "status": status.as_u16(),
                "current_status": current,
                "requested_status": requested,
                "role": role,
            })),
            // Distinct from a plain 401: the client must send the user back
            // through the external JunoPay login flow.
            AppError::ReauthRequired => Json(json!({
                "error": self.to_string(),
                "status": status.as_u16(),
                "reauth": true,
            })),
            _ => Json(json!({
                "error": self.to_string(),
                "status": status.as_u16(),
            })),
        };

        (status, body).into_response()
    }
}
