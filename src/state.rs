//! Shared application state handed to every handler

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::config::Config;
use crate::database::Store;

/// Per-client request limiter keyed by client IP
pub type IpRateLimiter = DefaultKeyedRateLimiter<String>;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<Config>,
    pub limiter: Arc<IpRateLimiter>,
}

impl AppState {
    pub fn new(store: Store, config: Config) -> Self {
        let per_minute = NonZeroU32::new(config.rate_limit_per_minute).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::keyed(Quota::per_minute(per_minute));

        Self {
            store,
            config: Arc::new(config),
            limiter: Arc::new(limiter),
        }
    }
}
