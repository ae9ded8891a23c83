//! Short URL management: create, list, read, update and delete
//!
//! Everything except `shorten` is scoped to the authenticated owner. A URL
//! that exists but belongs to someone else is reported as not found so ids
//! cannot be probed.

use std::cmp::Ordering;

use axum::extract::{Path, State};
use chrono::Utc;
use serde::Serialize;
use validator::Validate;

use crate::auth::{AuthUser, MaybeUser};
use crate::database::Store;
use crate::error::{AppError, FieldError};
use crate::extract::{ApiJson, ApiQuery};
use crate::model::{
    BulkDeleteRequest, ListParams, Pagination, ShortenRequest, SortField, SortOrder,
    StatusFilter, UpdateUrlRequest, UrlRecord, UrlView,
};
use crate::response::ApiResponse;
use crate::shortener::create_short_url;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 10;
const MAX_PAGE_SIZE: usize = 100;

#[derive(Serialize)]
pub struct UrlList {
    pub urls: Vec<UrlView>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteResult {
    pub deleted_count: usize,
}

/// Loads a URL only if `owner_id` owns it
fn owned_url(store: &Store, id: &str, owner_id: &str) -> Result<UrlRecord, AppError> {
    store
        .get_url(id)?
        .filter(|r| r.owner_id.as_deref() == Some(owner_id))
        .ok_or_else(|| AppError::not_found("URL"))
}

/// Creates a new short URL
///
/// Anonymous callers are allowed; when a valid bearer token is present the
/// URL is attached to that account.
///
/// # Request Body
///
/// ```json
/// {
///   "originalUrl": "https://example.com/very/long/url",
///   "customCode": "my-link",          // Optional
///   "title": "Launch post",           // Optional
///   "tags": ["launch"],               // Optional
///   "maxClicks": 100,                 // Optional
///   "expiresAt": "2030-01-01T00:00:00Z" // Optional
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - URL view including `shortUrl`
/// - **400 Bad Request** - Validation failed
/// - **409 Conflict** - Custom code already taken
/// - **500 Internal Server Error** - No free generated code after 10 attempts
pub async fn shorten(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    ApiJson(payload): ApiJson<ShortenRequest>,
) -> Result<ApiResponse<UrlView>, AppError> {
    payload.validate()?;

    let record = create_short_url(&state.store, &state.config, payload, user.as_ref())?;
    tracing::info!(
        code = %record.short_code,
        owner = ?record.owner_id,
        "Short URL created"
    );

    Ok(ApiResponse::created(
        "URL shortened successfully",
        UrlView::new(&record, &state.config, Utc::now()),
    ))
}

fn compare(a: &UrlRecord, b: &UrlRecord, field: SortField) -> Ordering {
    let primary = match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::Clicks => a.clicks.cmp(&b.clicks),
        SortField::Title => {
            let ta = a.title.as_deref().unwrap_or_default().to_lowercase();
            let tb = b.title.as_deref().unwrap_or_default().to_lowercase();
            ta.cmp(&tb)
        }
        SortField::ShortCode => a.short_code.cmp(&b.short_code),
    };
    primary.then_with(|| a.created_at.cmp(&b.created_at))
}

/// Lists the caller's URLs with search, filtering, sorting and pagination
///
/// # Query Parameters
///
/// - `page` (optional) - Page number, starts from 1 (default: 1)
/// - `limit` (optional) - Items per page, 1 to 100 (default: 10)
/// - `search` (optional) - Case-insensitive match on URL, code, title or tags
/// - `sortBy` (optional) - `createdAt`, `clicks`, `title` or `shortCode`
/// - `order` (optional) - `asc` or `desc` (default: `desc`)
/// - `status` (optional) - `active`, `inactive` or `expired`
///
/// # Example Request
///
/// `GET /api/urls/my-urls?page=2&limit=20&sortBy=clicks`
pub async fn my_urls(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<ApiResponse<UrlList>, AppError> {
    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    let mut errors = Vec::new();
    if page < 1 {
        errors.push(FieldError::new("page", "Page must be at least 1"));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        errors.push(FieldError::new("limit", "Limit must be between 1 and 100"));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let now = Utc::now();
    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let mut urls: Vec<UrlRecord> = state
        .store
        .list_by_owner(&user.id)?
        .into_iter()
        .filter(|r| search.is_none_or(|needle| r.matches_search(needle)))
        .filter(|r| match params.status {
            None => true,
            Some(StatusFilter::Active) => r.is_accessible(now),
            Some(StatusFilter::Inactive) => !r.is_active,
            Some(StatusFilter::Expired) => r.is_expired(now),
        })
        .collect();

    let field = params.sort_by.unwrap_or_default();
    match params.order.unwrap_or_default() {
        SortOrder::Asc => urls.sort_by(|a, b| compare(a, b, field)),
        SortOrder::Desc => urls.sort_by(|a, b| compare(b, a, field)),
    }

    let total = urls.len();
    let views = urls
        .iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .map(|r| UrlView::new(r, &state.config, now))
        .collect();

    Ok(ApiResponse::ok(
        "URLs retrieved successfully",
        UrlList {
            urls: views,
            pagination: Pagination::new(page, limit, total),
        },
    ))
}

pub async fn get_url(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<UrlView>, AppError> {
    let record = owned_url(&state.store, &id, &user.id)?;
    Ok(ApiResponse::ok(
        "URL retrieved successfully",
        UrlView::new(&record, &state.config, Utc::now()),
    ))
}

/// Partially updates one of the caller's URLs
///
/// Only fields present in the body change. `maxClicks` and `expiresAt`
/// accept `null` to remove the limit. The short code itself is immutable.
///
/// # Response
///
/// - **200 OK** - Updated URL view
/// - **400 Bad Request** - Validation failed
/// - **404 Not Found** - Unknown id or not owned by the caller
pub async fn update_url(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateUrlRequest>,
) -> Result<ApiResponse<UrlView>, AppError> {
    payload.validate()?;

    let now = Utc::now();
    let mut errors = Vec::new();
    if let Some(Some(0)) = payload.max_clicks {
        errors.push(FieldError::new("maxClicks", "Max clicks must be at least 1"));
    }
    if let Some(Some(at)) = payload.expires_at {
        if at <= now {
            errors.push(FieldError::new("expiresAt", "Expiration date must be in the future"));
        }
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    owned_url(&state.store, &id, &user.id)?;

    let updated = state
        .store
        .update_url(&id, |record| {
            if let Some(url) = payload.original_url {
                record.original_url = url.trim().to_string();
            }
            if let Some(title) = payload.title {
                record.title = Some(title).filter(|t| !t.trim().is_empty());
            }
            if let Some(description) = payload.description {
                record.description = Some(description).filter(|d| !d.trim().is_empty());
            }
            if let Some(tags) = payload.tags {
                record.tags = tags.into_iter().map(|t| t.trim().to_string()).collect();
            }
            if let Some(active) = payload.is_active {
                record.is_active = active;
            }
            if let Some(max_clicks) = payload.max_clicks {
                record.max_clicks = max_clicks;
            }
            if let Some(expires_at) = payload.expires_at {
                record.expires_at = expires_at;
            }
            record.updated_at = now;
        })?
        .ok_or_else(|| AppError::not_found("URL"))?;

    tracing::info!(id = %updated.id, code = %updated.short_code, "Short URL updated");
    Ok(ApiResponse::ok(
        "URL updated successfully",
        UrlView::new(&updated, &state.config, now),
    ))
}

pub async fn delete_url(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    owned_url(&state.store, &id, &user.id)?;
    let removed = state
        .store
        .delete_url(&id)?
        .ok_or_else(|| AppError::not_found("URL"))?;

    tracing::info!(id = %removed.id, code = %removed.short_code, "Short URL deleted");
    Ok(ApiResponse::message("URL deleted successfully"))
}

/// Deletes every listed id the caller owns; others are skipped silently
///
/// # Request Body
///
/// ```json
/// { "ids": ["4f0c...", "9a1b..."] }
/// ```
pub async fn bulk_delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<BulkDeleteRequest>,
) -> Result<ApiResponse<BulkDeleteResult>, AppError> {
    payload.validate()?;

    let deleted_count = state.store.delete_owned(&user.id, &payload.ids)?;
    tracing::info!(owner = %user.id, requested = payload.ids.len(), deleted_count, "Bulk delete");

    Ok(ApiResponse::ok(
        format!("{} URL(s) deleted successfully", deleted_count),
        BulkDeleteResult { deleted_count },
    ))
}
