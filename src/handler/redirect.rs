//! Public short-code endpoints

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::client_info::{click_event, ClientAddr};
use crate::database::ClickOutcome;
use crate::error::AppError;
use crate::model::UrlPreview;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Redirects a short code to its original destination
///
/// The click (client IP, user agent, referer, coarse location) is recorded
/// atomically with the accessibility check before the redirect is sent.
///
/// # Response
///
/// - **302 Found** - Redirects to the original URL
/// - **404 Not Found** - Unknown short code
/// - **410 Gone** - Expired, click limit reached or deactivated; the body
///   carries `reason`
///
/// # Note
///
/// Uses 302 with `Cache-Control: no-store` rather than 301 so browsers come
/// back on every visit and each one is counted.
pub async fn redirect(
    State(state): State<AppState>,
    Path(code): Path<String>,
    ClientAddr(peer): ClientAddr,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let event = click_event(&headers, peer, &state.config.trusted_proxies, Utc::now());

    match state.store.record_click(&code, event)? {
        ClickOutcome::Redirect(target) => {
            tracing::debug!(code = %code, target = %target, "Redirecting");
            Ok((
                StatusCode::FOUND,
                [
                    (header::LOCATION, target),
                    (header::CACHE_CONTROL, "no-store".to_string()),
                ],
            )
                .into_response())
        }
        ClickOutcome::Gone(reason) => {
            tracing::debug!(code = %code, ?reason, "Refusing redirect");
            Err(AppError::Gone(reason))
        }
        ClickOutcome::NotFound => Err(AppError::not_found("Short URL")),
    }
}

/// Public preview of a short code; never counts as a click
pub async fn info(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<ApiResponse<UrlPreview>, AppError> {
    let record = state
        .store
        .get_url_by_code(&code)?
        .ok_or_else(|| AppError::not_found("Short URL"))?;

    Ok(ApiResponse::ok(
        "URL info retrieved successfully",
        UrlPreview::new(&record, &state.config, Utc::now()),
    ))
}
