//! Route definitions for the link service
//!
//! This module wires every handler to its path, attaches the auth layers
//! per route group and wraps the `/api` tree in the per-IP rate limiter.

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;
use crate::error::AppError;
use crate::handler::{account, health, redirect, stats, urls};
use crate::middleware::{optional_auth, rate_limit, require_auth};
use crate::state::AppState;

/// Creates the application router with all routes configured
///
/// # Route Definitions
///
/// - `POST /api/urls/shorten` - Create a short URL (optional auth)
/// - `GET /api/urls/my-urls` - List the caller's URLs
/// - `GET|PUT|DELETE /api/urls/{id}` - Manage one owned URL
/// - `DELETE /api/urls/bulk/delete` - Delete several owned URLs
/// - `GET /api/stats/overview|realtime`, `GET /api/stats/url/{id}` - Analytics
/// - `POST /api/auth/register|login` - Obtain a token
/// - `GET /api/auth/me`, `PUT /api/auth/profile|password`, `DELETE /api/auth/account`
/// - `GET /health` - Readiness probe
/// - `GET /{shortCode}` - Redirect (public)
/// - `GET /{shortCode}/info` - Preview (public)
///
/// # Example Usage
///
/// ```no_run
/// # use linkpulse::{config::Config, database::Store, route::create_app, state::AppState};
/// let store = Store::open("data.db").unwrap();
/// let app = create_app(AppState::new(store, Config::default()));
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    let require = from_fn_with_state(state.clone(), require_auth);

    let url_routes = Router::new()
        .route("/shorten", post(urls::shorten))
        .route_layer(from_fn_with_state(state.clone(), optional_auth))
        .merge(
            Router::new()
                .route("/my-urls", get(urls::my_urls))
                .route("/bulk/delete", delete(urls::bulk_delete))
                .route(
                    "/{id}",
                    get(urls::get_url).put(urls::update_url).delete(urls::delete_url),
                )
                .route_layer(require.clone()),
        );

    let stats_routes = Router::new()
        .route("/overview", get(stats::overview))
        .route("/url/{id}", get(stats::url_stats))
        .route("/realtime", get(stats::realtime))
        .route_layer(require.clone());

    let auth_routes = Router::new()
        .route("/register", post(account::register))
        .route("/login", post(account::login))
        .merge(
            Router::new()
                .route("/me", get(account::me))
                .route("/profile", put(account::update_profile))
                .route("/password", put(account::change_password))
                .route("/account", delete(account::delete_account))
                .route_layer(require),
        );

    let api_routes = Router::new()
        .nest("/urls", url_routes)
        .nest("/stats", stats_routes)
        .nest("/auth", auth_routes)
        .fallback(route_not_found)
        .layer(from_fn_with_state(state.clone(), rate_limit));

    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes)
        // Public short-code endpoints; static paths above take precedence
        .route("/{code}", get(redirect::redirect))
        .route("/{code}/info", get(redirect::info))
        .fallback(route_not_found)
        .layer(cors)
        .with_state(state)
}

async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

/// Any origin when none are configured, otherwise exactly the configured list
fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if config.cors_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
