//! Runtime configuration
//!
//! All settings come from the process environment (optionally seeded from a
//! `.env` file by `dotenvy` in `main`). Every value has a default so the
//! service starts with zero configuration in development.

use std::env;
use std::net::IpAddr;
use std::str::FromStr;

use crate::codegen::CodeSource;

/// Default length of generated short codes
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Application configuration shared through [`crate::state::AppState`]
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface to bind (e.g. "0.0.0.0")
    pub host: String,

    /// TCP port to listen on
    pub port: u16,

    /// Path of the redb database file
    pub database_path: String,

    /// Public origin prepended to short codes (e.g. "https://sho.rt")
    pub base_url: String,

    /// HMAC secret used to sign bearer tokens
    pub jwt_secret: String,

    /// Token lifetime in hours
    pub jwt_expiry_hours: i64,

    /// bcrypt work factor
    pub bcrypt_cost: u32,

    /// Length of generated short codes, clamped to 3..=20
    pub code_length: usize,

    /// Randomness source for generated short codes
    pub code_source: CodeSource,

    /// Requests per minute allowed per client IP on `/api`
    pub rate_limit_per_minute: u32,

    /// Allowed CORS origins; empty means any origin
    pub cors_origins: Vec<String>,

    /// Proxy addresses or CIDR blocks whose forwarding headers are believed
    pub trusted_proxies: Vec<String>,

    /// Production mode hides internal error details from responses
    pub production: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_path: "data.db".to_string(),
            base_url: "http://localhost:8080".to_string(),
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiry_hours: 168,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            code_length: DEFAULT_CODE_LENGTH,
            code_source: CodeSource::Fast,
            rate_limit_per_minute: 100,
            cors_origins: Vec::new(),
            trusted_proxies: Vec::new(),
            production: false,
        }
    }
}

impl Config {
    /// Builds the configuration from environment variables
    ///
    /// Unparseable values fall back to their defaults with a warning rather
    /// than aborting startup.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = parse_var("PORT", defaults.port);
        let base_url = env::var("BASE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("JWT_SECRET not set, using an insecure development secret");
                defaults.jwt_secret
            }
        };

        let code_source = match env::var("CODE_SOURCE").as_deref() {
            Ok("secure") => CodeSource::Secure,
            _ => CodeSource::Fast,
        };

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty() && o != "*")
                    .collect()
            })
            .unwrap_or_default();

        let trusted_proxies = env::var("TRUSTED_PROXIES")
            .map(|v| parse_proxies(&v))
            .unwrap_or_default();

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port,
            database_path: env::var("DATABASE_URL").unwrap_or(defaults.database_path),
            base_url: base_url.trim_end_matches('/').to_string(),
            jwt_secret,
            jwt_expiry_hours: parse_var("JWT_EXPIRY_HOURS", defaults.jwt_expiry_hours),
            bcrypt_cost: parse_var("BCRYPT_COST", defaults.bcrypt_cost),
            code_length: parse_var("CODE_LENGTH", defaults.code_length).clamp(3, 20),
            code_source,
            rate_limit_per_minute: parse_var("RATE_LIMIT_PER_MINUTE", defaults.rate_limit_per_minute)
                .max(1),
            cors_origins,
            trusted_proxies,
            production: env::var("APP_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false),
        }
    }

    /// Full public link for a short code
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }
}

fn parse_var<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value for {}: {:?}", name, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Comma-separated IPs or CIDR blocks; malformed entries are dropped
fn parse_proxies(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter(|entry| {
            let valid = match entry.split_once('/') {
                Some((net, prefix)) => net.parse::<IpAddr>().is_ok() && prefix.parse::<u8>().is_ok(),
                None => entry.parse::<IpAddr>().is_ok(),
            };
            if !valid {
                tracing::warn!("Ignoring invalid trusted proxy: {:?}", entry);
            }
            valid
        })
        .map(str::to_string)
        .collect()
}
