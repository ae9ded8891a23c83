//! Shared helpers for the HTTP-level tests

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use linkpulse::config::Config;
use linkpulse::database::Store;
use linkpulse::route::create_app;
use linkpulse::state::AppState;

pub const BASE_URL: &str = "http://sho.rt";

pub struct TestApp {
    pub router: Router,
    pub store: Store,
    // Keeps the database file alive for the duration of the test
    _temp_db: NamedTempFile,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub fn test_config() -> Config {
    Config {
        base_url: BASE_URL.to_string(),
        jwt_secret: "integration-test-secret".to_string(),
        bcrypt_cost: 4,
        rate_limit_per_minute: 10_000,
        ..Config::default()
    }
}

/// Creates a test application with a temporary database
pub fn setup_test_app() -> TestApp {
    setup_test_app_with(test_config())
}

pub fn setup_test_app_with(config: Config) -> TestApp {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let store = Store::open(temp_db.path().to_str().unwrap())
        .expect("Failed to initialize test database");
    let router = create_app(AppState::new(store.clone(), config));

    TestApp {
        router,
        store,
        _temp_db: temp_db,
    }
}

/// A GET as it arrives from socket peer `peer`, optionally carrying `X-Forwarded-For`
pub fn request_from(uri: &str, peer: &str, forwarded_for: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(chain) = forwarded_for {
        builder = builder.header("x-forwarded-for", chain);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    let addr: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

impl TestApp {
    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Failed to parse JSON")
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Sends a request with an optional JSON body and bearer token
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.request(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.call("GET", uri, token, None).await
    }

    /// Registers an account and returns its token
    pub async fn register(&self, name: &str, email: &str, password: &str) -> String {
        let res = self
            .call(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({ "name": name, "email": email, "password": password })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "register failed: {}", res.body);
        res.body["data"]["token"].as_str().unwrap().to_string()
    }

    /// Shortens `url` and returns the `data` object of the response
    pub async fn shorten(&self, body: Value, token: Option<&str>) -> Value {
        let res = self.call("POST", "/api/urls/shorten", token, Some(body)).await;
        assert_eq!(res.status, StatusCode::CREATED, "shorten failed: {}", res.body);
        res.body["data"].clone()
    }
}
