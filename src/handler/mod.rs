//! HTTP request handlers
//!
//! - [`urls`] - creating and managing short URLs
//! - [`redirect`] - the public `/{code}` redirect and preview
//! - [`stats`] - click analytics
//! - [`account`] - registration, login and profile
//! - [`health`] - readiness probe

pub mod account;
pub mod health;
pub mod redirect;
pub mod stats;
pub mod urls;
