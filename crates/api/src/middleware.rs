use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use tasklane_auth::{JwtValidator, Principal};
use tasklane_core::Failure;

use crate::app::errors::{ApiError, INVALID_TOKEN_MESSAGE};

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Verify the bearer token and attach the caller's [`Principal`] to the
/// request.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;

    let claims = state.jwt.validate(token, Utc::now())?;

    req.extensions_mut()
        .insert(Principal::new(claims.user_id, claims.sub, claims.role));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, Failure> {
    let unauthenticated = || Failure::authentication_failed(INVALID_TOKEN_MESSAGE);

    let header = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(unauthenticated)?;

    let header = header.to_str().map_err(|_| unauthenticated())?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or_else(unauthenticated)?
        .trim();

    if token.is_empty() {
        return Err(unauthenticated());
    }

    Ok(token)
}
