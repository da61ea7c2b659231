//! Caller identity extraction.
//!
//! Session handling lives in front of this service; by the time a request
//! arrives here the session layer has resolved the user and put their id in
//! `x-user-id`. Every service operation takes the caller explicitly, so the
//! extractor is the only place that header is read.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::AppError;

/// The authenticated marketplace user driving this request.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-user-id")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                AppError::Forbidden("missing authenticated user context".to_string())
            })?;

        let id = raw
            .parse::<Uuid>()
            .map_err(|_| AppError::Forbidden("invalid user context".to_string()))?;

        Ok(AuthenticatedUser(id))
    }
}

/// Bearer-key guard for admin-only routes.
pub async fn admin_auth(
    State(admin_api_key): State<String>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    match auth_header {
        Some(auth) if auth == format!("Bearer {}", admin_api_key) || auth == admin_api_key => {
            Ok(next.run(req).await)
        }
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
