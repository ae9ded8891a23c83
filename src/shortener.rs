//! Creation of short links with collision avoidance
//!
//! Generated codes are retried against the store's atomic insert-if-absent
//! up to [`MAX_GENERATION_ATTEMPTS`] times. A caller-chosen code gets exactly
//! one attempt.

use chrono::Utc;

use crate::codegen;
use crate::config::Config;
use crate::database::Store;
use crate::error::AppError;
use crate::model::{ShortenRequest, UrlRecord, User};

pub const MAX_GENERATION_ATTEMPTS: usize = 10;

/// Builds and persists a URL record from an already validated request
pub fn create_short_url(
    store: &Store,
    config: &Config,
    request: ShortenRequest,
    owner: Option<&User>,
) -> Result<UrlRecord, AppError> {
    let now = Utc::now();
    if request.expires_at.is_some_and(|at| at <= now) {
        return Err(AppError::field(
            "expiresAt",
            "Expiration date must be in the future",
        ));
    }

    let mut record = UrlRecord::new(
        request.original_url.trim().to_string(),
        String::new(),
        owner.map(|u| u.id.clone()),
    );
    record.title = request.title.filter(|t| !t.trim().is_empty());
    record.description = request.description.filter(|d| !d.trim().is_empty());
    record.tags = request.tags.into_iter().map(|t| t.trim().to_string()).collect();
    record.max_clicks = request.max_clicks;
    record.expires_at = request.expires_at;

    match request.custom_code {
        Some(code) => {
            record.short_code = code;
            record.custom_code = true;
            if !store.insert_url(&record)? {
                return Err(AppError::Conflict(
                    "Custom code is already in use".to_string(),
                ));
            }
            Ok(record)
        }
        None => insert_with_generated_code(store, record, MAX_GENERATION_ATTEMPTS, || {
            Ok(codegen::generate(config.code_source, config.code_length)?)
        }),
    }
}

/// Tries fresh codes from `next_code` until one inserts or attempts run out
pub fn insert_with_generated_code<F>(
    store: &Store,
    mut record: UrlRecord,
    attempts: usize,
    mut next_code: F,
) -> Result<UrlRecord, AppError>
where
    F: FnMut() -> Result<String, AppError>,
{
    for attempt in 1..=attempts {
        record.short_code = next_code()?;
        if store.insert_url(&record)? {
            if attempt > 1 {
                tracing::debug!(attempt, code = %record.short_code, "Short code collision resolved");
            }
            return Ok(record);
        }
        tracing::debug!(attempt, code = %record.short_code, "Generated short code already taken");
    }

    tracing::warn!(attempts, "Exhausted short code generation attempts");
    Err(AppError::CodeGenerationExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn store() -> (Store, NamedTempFile) {
        let temp_db = NamedTempFile::new().unwrap();
        let store = Store::open(temp_db.path().to_str().unwrap()).unwrap();
        (store, temp_db)
    }

    fn request(url: &str) -> ShortenRequest {
        ShortenRequest {
            original_url: url.to_string(),
            ..ShortenRequest::default()
        }
    }

    #[test]
    fn generated_code_uses_configured_length() {
        let (store, _tmp) = store();
        let config = Config {
            code_length: 8,
            ..Config::default()
        };
        let record = create_short_url(&store, &config, request("https://example.com"), None).unwrap();
        assert_eq!(record.short_code.len(), 8);
        assert!(!record.custom_code);
        assert!(store.code_exists(&record.short_code).unwrap());
    }

    #[test]
    fn taken_custom_code_conflicts() {
        let (store, _tmp) = store();
        let config = Config::default();
        let mut req = request("https://example.com/1");
        req.custom_code = Some("taken".into());
        create_short_url(&store, &config, req, None).unwrap();

        let mut again = request("https://example.com/2");
        again.custom_code = Some("taken".into());
        let err = create_short_url(&store, &config, again, None).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn past_expiry_is_a_validation_error() {
        let (store, _tmp) = store();
        let mut req = request("https://example.com");
        req.expires_at = Some(Utc::now() - chrono::Duration::minutes(1));
        let err = create_short_url(&store, &Config::default(), req, None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn retries_past_collisions() {
        let (store, _tmp) = store();
        store
            .insert_url(&UrlRecord::new("https://a.example".into(), "dup".into(), None))
            .unwrap();

        let mut candidates = vec!["fresh", "dup", "dup"];
        let record = UrlRecord::new("https://b.example".into(), String::new(), None);
        let saved = insert_with_generated_code(&store, record, 10, || {
            Ok(candidates.pop().unwrap_or("unused").to_string())
        })
        .unwrap();
        assert_eq!(saved.short_code, "fresh");
    }

    #[test]
    fn gives_up_after_attempt_budget() {
        let (store, _tmp) = store();
        store
            .insert_url(&UrlRecord::new("https://a.example".into(), "dup".into(), None))
            .unwrap();

        let mut calls = 0;
        let record = UrlRecord::new("https://b.example".into(), String::new(), None);
        let err = insert_with_generated_code(&store, record, MAX_GENERATION_ATTEMPTS, || {
            calls += 1;
            Ok("dup".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, AppError::CodeGenerationExhausted));
        assert_eq!(calls, MAX_GENERATION_ATTEMPTS);
    }
}
