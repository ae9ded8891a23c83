//! Application error type and its HTTP rendering
//!
//! Every handler returns `Result<_, AppError>`. The error decides its own
//! status code and renders the same JSON envelope as successful responses:
//!
//! ```json
//! { "success": false, "message": "Validation failed", "errors": [{ "field": "originalUrl", "message": "..." }] }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use validator::ValidationErrors;

use crate::codegen::EntropyError;
use crate::database::StoreError;
use crate::model::GoneReason;

/// One rejected request field
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{}", .0.message())]
    Gone(GoneReason),

    #[error("Too many requests, please try again later")]
    RateLimited,

    #[error("Failed to generate a unique short code, please retry")]
    CodeGenerationExhausted,

    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a [FieldError]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<GoneReason>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Gone(_) => StatusCode::GONE,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::CodeGenerationExhausted | AppError::Store(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{} not found", what))
    }

    pub fn field(field: &str, message: &str) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }
}

static HIDE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(false);

/// Production deployments get a generic message for server faults
pub fn hide_internal_errors(hide: bool) {
    HIDE_INTERNAL_ERRORS.store(hide, Ordering::Relaxed);
}

fn expose_internal_details() -> bool {
    !HIDE_INTERNAL_ERRORS.load(Ordering::Relaxed)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();

        let message = if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "Request failed: {}", detail);
            if expose_internal_details() || matches!(self, AppError::CodeGenerationExhausted) {
                detail
            } else {
                "Internal server error".to_string()
            }
        } else {
            detail
        };

        let (errors, reason) = match &self {
            AppError::Validation(errors) => (Some(errors.as_slice()), None),
            AppError::Gone(reason) => (None, Some(*reason)),
            _ => (None, None),
        };

        let body = ErrorBody {
            success: false,
            message: &message,
            errors,
            reason,
        };

        (status, Json(body)).into_response()
    }
}

/// `original_url` -> `originalUrl`, matching the wire format
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = camel_case(&field);
                errs.iter()
                    .map(|e| {
                        let message = e
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Invalid value ({})", e.code));
                        FieldError::new(field.clone(), message)
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::Validation(fields)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<EntropyError> for AppError {
    fn from(err: EntropyError) -> Self {
        AppError::Internal(err.to_string())
    }
}
