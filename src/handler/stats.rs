//! Analytics endpoints over the caller's URLs

use axum::extract::{Path, State};
use chrono::Utc;

use crate::analytics::{self, Overview, Realtime, UrlStats};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::extract::ApiQuery;
use crate::model::UrlStatsParams;
use crate::response::ApiResponse;
use crate::state::AppState;

const DEFAULT_STATS_DAYS: i64 = 30;
const MAX_STATS_DAYS: i64 = 365;

pub async fn overview(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<ApiResponse<Overview>, AppError> {
    let urls = state.store.list_by_owner(&user.id)?;
    Ok(ApiResponse::ok(
        "Overview statistics retrieved successfully",
        analytics::overview(&urls, Utc::now()),
    ))
}

/// Per-URL breakdown over the last `days` days (1 to 365, default 30)
pub async fn url_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<UrlStatsParams>,
) -> Result<ApiResponse<UrlStats>, AppError> {
    let days = params.days.unwrap_or(DEFAULT_STATS_DAYS);
    if !(1..=MAX_STATS_DAYS).contains(&days) {
        return Err(AppError::field("days", "Days must be between 1 and 365"));
    }

    let record = state
        .store
        .get_url(&id)?
        .filter(|r| r.owner_id.as_deref() == Some(user.id.as_str()))
        .ok_or_else(|| AppError::not_found("URL"))?;

    Ok(ApiResponse::ok(
        "URL statistics retrieved successfully",
        analytics::url_stats(&record, Utc::now(), days),
    ))
}

pub async fn realtime(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<ApiResponse<Realtime>, AppError> {
    let urls = state.store.list_by_owner(&user.id)?;
    Ok(ApiResponse::ok(
        "Realtime statistics retrieved successfully",
        analytics::realtime(&urls, Utc::now()),
    ))
}
