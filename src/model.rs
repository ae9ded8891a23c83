//! Data models for the URL shortener
//!
//! This module defines the persisted documents (URL and user records), the
//! request payloads with their validation rules, and the views returned to
//! clients. Everything is serialized with camelCase field names.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};
use validator::{Validate, ValidationError};

use crate::config::Config;

/// Maximum number of click events retained per URL (oldest dropped first)
pub const MAX_CLICK_HISTORY: usize = 100;

/// Codes that would shadow service routes
pub const RESERVED_CODES: &[&str] = &["api", "health", "admin", "login", "register", "static"];

/// A single resolved redirect
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Why a known short code refuses to redirect
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoneReason {
    Expired,
    MaxClicksReached,
    Inactive,
}

impl GoneReason {
    pub fn message(&self) -> &'static str {
        match self {
            GoneReason::Expired => "This link has expired",
            GoneReason::MaxClicksReached => "This link has reached its maximum number of clicks",
            GoneReason::Inactive => "This link has been deactivated",
        }
    }
}

/// Represents a shortened URL stored in the database
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UrlRecord {
    /// Stable identifier used by the management API
    pub id: String,

    /// The destination the short code redirects to
    pub original_url: String,

    /// Globally unique code appended to the service origin
    pub short_code: String,

    /// True when the caller chose the code
    #[serde(default)]
    pub custom_code: bool,

    /// Owning user, absent for anonymous links
    pub owner_id: Option<String>,

    /// Number of redirects ever served
    #[serde(default)]
    pub clicks: u64,

    pub max_clicks: Option<u64>,
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default = "default_true")]
    pub is_active: bool,

    pub title: Option<String>,
    pub description: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Most recent clicks, bounded by [`MAX_CLICK_HISTORY`]
    #[serde(default)]
    pub click_history: Vec<ClickEvent>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_clicked_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl UrlRecord {
    pub fn new(original_url: String, short_code: String, owner_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            original_url,
            short_code,
            custom_code: false,
            owner_id,
            clicks: 0,
            max_clicks: None,
            expires_at: None,
            is_active: true,
            title: None,
            description: None,
            tags: Vec::new(),
            click_history: Vec::new(),
            created_at: now,
            updated_at: now,
            last_clicked_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn has_reached_max_clicks(&self) -> bool {
        self.max_clicks.is_some_and(|max| self.clicks >= max)
    }

    /// First reason the link may not redirect, by priority
    pub fn inaccessible_reason(&self, now: DateTime<Utc>) -> Option<GoneReason> {
        if self.is_expired(now) {
            Some(GoneReason::Expired)
        } else if self.has_reached_max_clicks() {
            Some(GoneReason::MaxClicksReached)
        } else if !self.is_active {
            Some(GoneReason::Inactive)
        } else {
            None
        }
    }

    pub fn is_accessible(&self, now: DateTime<Utc>) -> bool {
        self.inaccessible_reason(now).is_none()
    }

    /// Appends a click, trims the history and bumps the counter
    pub fn record_click(&mut self, event: ClickEvent) {
        self.last_clicked_at = Some(event.timestamp);
        self.click_history.push(event);
        if self.click_history.len() > MAX_CLICK_HISTORY {
            let excess = self.click_history.len() - MAX_CLICK_HISTORY;
            self.click_history.drain(..excess);
        }
        self.clicks += 1;
    }

    /// Case-insensitive match over the fields the dashboard searches
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.original_url.to_lowercase().contains(&needle)
            || self.short_code.to_lowercase().contains(&needle)
            || self
                .title
                .as_deref()
                .is_some_and(|t| t.to_lowercase().contains(&needle))
            || self.tags.iter().any(|t| t.to_lowercase().contains(&needle))
    }
}

/// Registered account
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            email: normalize_email(&email),
            password_hash,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Absolute http(s) URL with a host
pub fn validate_http_url(value: &str) -> Result<(), ValidationError> {
    let parsed = url::Url::parse(value.trim())
        .map_err(|_| invalid("url", "Please provide a valid URL"))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        "http" | "https" => Err(invalid("url", "URL must include a host")),
        _ => Err(invalid("url_scheme", "Only http and https URLs can be shortened")),
    }
}

/// 3–20 characters of `[A-Za-z0-9_-]`, not a reserved route word
pub fn validate_short_code(code: &str) -> Result<(), ValidationError> {
    if !(3..=20).contains(&code.len()) {
        return Err(invalid(
            "length",
            "Custom code must be between 3 and 20 characters",
        ));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid(
            "charset",
            "Custom code may only contain letters, numbers, hyphens and underscores",
        ));
    }
    if RESERVED_CODES.contains(&code.to_lowercase().as_str()) {
        return Err(invalid("reserved", "This code is reserved"));
    }
    Ok(())
}

pub fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.iter().any(|t| t.trim().is_empty() || t.len() > 30) {
        return Err(invalid("tags", "Each tag must be between 1 and 30 characters"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Request payload for `POST /api/urls/shorten`
///
/// # Example
/// ```json
/// {
///   "originalUrl": "https://example.com/a/very/long/path",
///   "customCode": "my-link",
///   "maxClicks": 100
/// }
/// ```
#[serde_as]
#[derive(Deserialize, Validate, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ShortenRequest {
    #[validate(
        length(min = 1, max = 2048, message = "URL must be between 1 and 2048 characters"),
        custom(function = "validate_http_url")
    )]
    pub original_url: String,

    /// A blank field from a form counts as "no custom code"
    #[validate(custom(function = "validate_short_code"))]
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub custom_code: Option<String>,

    #[validate(length(max = 200, message = "Title cannot exceed 200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 500, message = "Description cannot exceed 500 characters"))]
    pub description: Option<String>,

    #[validate(
        length(max = 10, message = "At most 10 tags are allowed"),
        custom(function = "validate_tags")
    )]
    #[serde(default)]
    pub tags: Vec<String>,

    #[validate(range(min = 1, message = "Max clicks must be at least 1"))]
    pub max_clicks: Option<u64>,

    pub expires_at: Option<DateTime<Utc>>,
}

/// Request payload for `PUT /api/urls/{id}`
///
/// Absent fields are left untouched. For `maxClicks` and `expiresAt` an
/// explicit `null` clears the limit.
#[derive(Deserialize, Validate, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUrlRequest {
    #[validate(
        length(min = 1, max = 2048, message = "URL must be between 1 and 2048 characters"),
        custom(function = "validate_http_url")
    )]
    pub original_url: Option<String>,

    #[validate(length(max = 200, message = "Title cannot exceed 200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 500, message = "Description cannot exceed 500 characters"))]
    pub description: Option<String>,

    #[validate(
        length(max = 10, message = "At most 10 tags are allowed"),
        custom(function = "validate_tags")
    )]
    pub tags: Option<Vec<String>>,

    pub is_active: Option<bool>,

    #[serde(default, with = "::serde_with::rust::double_option")]
    pub max_clicks: Option<Option<u64>>,

    #[serde(default, with = "::serde_with::rust::double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    CreatedAt,
    Clicks,
    Title,
    ShortCode,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    Active,
    Inactive,
    Expired,
}

/// Query parameters for `GET /api/urls/my-urls`
///
/// # Example
/// Query string: `?page=2&limit=20&search=docs&sortBy=clicks&order=desc`
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// Page number, starts from 1
    pub page: Option<usize>,

    /// Items per page, default 10, maximum 100
    pub limit: Option<usize>,

    pub search: Option<String>,
    pub sort_by: Option<SortField>,
    pub order: Option<SortOrder>,
    pub status: Option<StatusFilter>,
}

#[derive(Deserialize, Validate, Debug)]
pub struct BulkDeleteRequest {
    #[validate(length(min = 1, max = 100, message = "Provide between 1 and 100 ids"))]
    pub ids: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct UrlStatsParams {
    /// Size of the daily series window, 1..=365, default 30
    pub days: Option<i64>,
}

#[derive(Deserialize, Validate, Debug)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be between 1 and 50 characters"))]
    pub name: String,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be between 8 and 128 characters"))]
    pub password: String,
}

#[derive(Deserialize, Validate, Debug)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Deserialize, Validate, Debug, Default)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be between 1 and 50 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
}

#[derive(Deserialize, Validate, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 8, max = 128, message = "Password must be between 8 and 128 characters"))]
    pub new_password: String,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// URL as returned by the management API (click history omitted)
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UrlView {
    pub id: String,
    pub original_url: String,
    pub short_code: String,
    pub short_url: String,
    pub custom_code: bool,
    pub clicks: u64,
    pub max_clicks: Option<u64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_accessible: bool,
    pub status_reason: Option<GoneReason>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_clicked_at: Option<DateTime<Utc>>,
}

impl UrlView {
    pub fn new(record: &UrlRecord, config: &Config, now: DateTime<Utc>) -> Self {
        let reason = record.inaccessible_reason(now);
        Self {
            id: record.id.clone(),
            original_url: record.original_url.clone(),
            short_code: record.short_code.clone(),
            short_url: config.short_url(&record.short_code),
            custom_code: record.custom_code,
            clicks: record.clicks,
            max_clicks: record.max_clicks,
            expires_at: record.expires_at,
            is_active: record.is_active,
            is_accessible: reason.is_none(),
            status_reason: reason,
            title: record.title.clone(),
            description: record.description.clone(),
            tags: record.tags.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            last_clicked_at: record.last_clicked_at,
        }
    }
}

/// Public preview served by `GET /{code}/info`
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UrlPreview {
    pub short_code: String,
    pub short_url: String,
    pub original_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub clicks: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_accessible: bool,
    pub reason: Option<GoneReason>,
}

impl UrlPreview {
    pub fn new(record: &UrlRecord, config: &Config, now: DateTime<Utc>) -> Self {
        let reason = record.inaccessible_reason(now);
        Self {
            short_code: record.short_code.clone(),
            short_url: config.short_url(&record.short_code),
            original_url: record.original_url.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            clicks: record.clicks,
            created_at: record.created_at,
            expires_at: record.expires_at,
            is_accessible: reason.is_none(),
            reason,
        }
    }
}

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        let pages = total.div_ceil(limit);
        Self {
            page,
            limit,
            total,
            pages,
            has_next: page < pages,
            has_prev: page > 1,
        }
    }
}

/// Account data safe to return to its owner
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct AuthPayload {
    pub user: UserView,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record() -> UrlRecord {
        UrlRecord::new("https://example.com".into(), "abc123".into(), None)
    }

    fn click_at(ts: DateTime<Utc>) -> ClickEvent {
        ClickEvent {
            timestamp: ts,
            ..ClickEvent::default()
        }
    }

    #[test]
    fn fresh_record_is_accessible() {
        assert!(record().is_accessible(Utc::now()));
    }

    #[test]
    fn max_clicks_closes_link_exactly_at_limit() {
        let mut url = record();
        url.max_clicks = Some(3);
        let now = Utc::now();
        for n in 0..3 {
            assert!(url.is_accessible(now), "should be open before click {}", n + 1);
            url.record_click(click_at(now));
        }
        assert_eq!(url.inaccessible_reason(now), Some(GoneReason::MaxClicksReached));
    }

    #[test]
    fn expiry_overrides_everything_else() {
        let now = Utc::now();
        let mut url = record();
        url.expires_at = Some(now - Duration::seconds(1));
        url.max_clicks = Some(1);
        url.clicks = 5;
        url.is_active = false;
        assert_eq!(url.inaccessible_reason(now), Some(GoneReason::Expired));
    }

    #[test]
    fn max_clicks_outranks_inactive() {
        let mut url = record();
        url.max_clicks = Some(1);
        url.clicks = 1;
        url.is_active = false;
        assert_eq!(url.inaccessible_reason(Utc::now()), Some(GoneReason::MaxClicksReached));
    }

    #[test]
    fn future_expiry_is_still_accessible() {
        let now = Utc::now();
        let mut url = record();
        url.expires_at = Some(now + Duration::hours(1));
        assert!(url.is_accessible(now));
    }

    #[test]
    fn click_history_keeps_the_newest_hundred() {
        let start = Utc::now();
        let mut url = record();
        for i in 0..150 {
            url.record_click(click_at(start + Duration::seconds(i)));
        }
        assert_eq!(url.clicks, 150);
        assert_eq!(url.click_history.len(), MAX_CLICK_HISTORY);
        assert_eq!(url.click_history[0].timestamp, start + Duration::seconds(50));
        assert_eq!(
            url.click_history.last().map(|c| c.timestamp),
            Some(start + Duration::seconds(149))
        );
    }

    #[test]
    fn short_code_rules() {
        assert!(validate_short_code("my-link_1").is_ok());
        assert!(validate_short_code("ab").is_err());
        assert!(validate_short_code(&"a".repeat(21)).is_err());
        assert!(validate_short_code("has space").is_err());
        assert!(validate_short_code("API").is_err());
    }

    #[test]
    fn only_http_urls_are_shortenable() {
        assert!(validate_http_url("https://example.com/a").is_ok());
        assert!(validate_http_url("http://localhost:3000").is_ok());
        assert!(validate_http_url("javascript:alert(1)").is_err());
        assert!(validate_http_url("ftp://example.com").is_err());
        assert!(validate_http_url("not a url").is_err());
    }

    #[test]
    fn shorten_request_reports_each_bad_field() {
        let req = ShortenRequest {
            original_url: "nope".into(),
            custom_code: Some("x".into()),
            max_clicks: Some(0),
            ..ShortenRequest::default()
        };
        let errors = req.validate().unwrap_err();
        let fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|k| k.to_string().replace('_', "").to_lowercase())
            .collect();
        for expected in ["originalurl", "customcode", "maxclicks"] {
            assert!(fields.iter().any(|f| f == expected), "missing {expected}");
        }
    }

    #[test]
    fn pagination_math() {
        let p = Pagination::new(2, 10, 25);
        assert_eq!(p.pages, 3);
        assert!(p.has_next && p.has_prev);
        assert_eq!(Pagination::new(1, 10, 0).pages, 0);
    }

    #[test]
    fn search_covers_code_title_and_tags() {
        let mut url = record();
        url.title = Some("Quarterly Report".into());
        url.tags = vec!["Finance".into()];
        assert!(url.matches_search("report"));
        assert!(url.matches_search("FIN"));
        assert!(url.matches_search("ABC1"));
        assert!(!url.matches_search("missing"));
    }
}
