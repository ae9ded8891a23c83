//! Request layers: bearer-token authentication and per-IP rate limiting
//!
//! Both auth layers resolve `Authorization: Bearer <token>` into a stored,
//! active [`User`](crate::model::User) and attach it as an [`AuthUser`]
//! extension. They differ only in what happens when that fails:
//! [`require_auth`] rejects with 401, [`optional_auth`] lets the request
//! through anonymously.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::{bearer_token, validate_token, AuthUser};
use crate::client_info::{client_ip, ClientAddr};
use crate::error::AppError;
use crate::model::User;
use crate::state::AppState;

/// Looks up the user behind the request's bearer token
fn resolve_user(state: &AppState, request: &Request) -> Result<User, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Access token is required".to_string()))?;

    let claims = validate_token(token, &state.config.jwt_secret).map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        AppError::Unauthorized("Invalid or expired token".to_string())
    })?;

    match state.store.get_user(&claims.sub)? {
        Some(user) if user.is_active => Ok(user),
        Some(_) => Err(AppError::Unauthorized("Account is deactivated".to_string())),
        None => Err(AppError::Unauthorized("User no longer exists".to_string())),
    }
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = resolve_user(&state, &request)?;
    request.extensions_mut().insert(AuthUser(user));
    Ok(next.run(request).await)
}

pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if bearer_token(request.headers()).is_some() {
        match resolve_user(&state, &request) {
            Ok(user) => {
                request.extensions_mut().insert(AuthUser(user));
            }
            Err(e) => tracing::debug!("Continuing anonymously: {}", e),
        }
    }
    next.run(request).await
}

/// Rejects with 429 once a client exceeds its per-minute quota
pub async fn rate_limit(
    State(state): State<AppState>,
    ClientAddr(peer): ClientAddr,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = client_ip(request.headers(), peer, &state.config.trusted_proxies)
        .unwrap_or_else(|| "unknown".to_string());

    if state.limiter.check_key(&key).is_err() {
        tracing::warn!(client = %key, "Rate limit exceeded");
        return Err(AppError::RateLimited);
    }
    Ok(next.run(request).await)
}
