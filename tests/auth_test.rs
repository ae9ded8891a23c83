//! Authentication, account management and rate limiting

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{request_from, setup_test_app, setup_test_app_with, test_config};
use linkpulse::config::Config;

#[tokio::test]
async fn test_register_and_me() {
    let app = setup_test_app();

    let res = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "name": "Ada", "email": "Ada@Example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["data"]["user"]["email"], "ada@example.com");
    assert!(res.body["data"]["user"].get("passwordHash").is_none());
    let token = res.body["data"]["token"].as_str().unwrap().to_string();

    let res = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["name"], "Ada");
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let app = setup_test_app();
    app.register("Ada", "ada@example.com", "password123").await;

    let res = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "name": "Imposter", "email": "ADA@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_validation() {
    let app = setup_test_app();

    let res = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "name": "Ada", "email": "not-an-email", "password": "short" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = res.body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["email", "password"]);
}

#[tokio::test]
async fn test_login() {
    let app = setup_test_app();
    app.register("Ada", "ada@example.com", "password123").await;

    let res = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["data"]["token"].is_string());
    assert!(res.body["data"]["user"]["lastLoginAt"].is_string());
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = setup_test_app();

    for uri in ["/api/auth/me", "/api/urls/my-urls", "/api/stats/overview"] {
        let res = app.get(uri, None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(res.body["success"], false);

        let res = app.get(uri, Some("garbage.token.value")).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_token_from_other_secret_rejected() {
    let app = setup_test_app();
    let other = setup_test_app_with(Config {
        jwt_secret: "some-other-secret".to_string(),
        ..test_config()
    });
    let foreign = other.register("Ada", "ada@example.com", "password123").await;

    let res = app.get("/api/auth/me", Some(&foreign)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deactivated_user_rejected() {
    let app = setup_test_app();
    let token = app.register("Ada", "ada@example.com", "password123").await;

    let mut user = app.store.find_user_by_email("ada@example.com").unwrap().unwrap();
    user.is_active = false;
    app.store.save_user(&user).unwrap();

    assert_eq!(app.get("/api/auth/me", Some(&token)).await.status, StatusCode::UNAUTHORIZED);

    let res = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_optional_auth_on_shorten() {
    let app = setup_test_app();
    let token = app.register("Ada", "ada@example.com", "password123").await;

    app.shorten(json!({ "originalUrl": "https://example.com/mine" }), Some(&token))
        .await;
    // A bad token does not block anonymous shortening
    app.shorten(
        json!({ "originalUrl": "https://example.com/anon" }),
        Some("not-a-jwt"),
    )
    .await;
    app.shorten(json!({ "originalUrl": "https://example.com/anon2" }), None)
        .await;

    let res = app.get("/api/urls/my-urls", Some(&token)).await;
    let urls = res.body["data"]["urls"].as_array().unwrap();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0]["originalUrl"], "https://example.com/mine");
}

#[tokio::test]
async fn test_update_profile() {
    let app = setup_test_app();
    let token = app.register("Ada", "ada@example.com", "password123").await;
    app.register("Bob", "bob@example.com", "password123").await;

    let res = app
        .call(
            "PUT",
            "/api/auth/profile",
            Some(&token),
            Some(json!({ "email": "bob@example.com" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app
        .call(
            "PUT",
            "/api/auth/profile",
            Some(&token),
            Some(json!({ "name": "Ada L.", "email": "lovelace@example.com" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["name"], "Ada L.");
    assert_eq!(res.body["data"]["email"], "lovelace@example.com");

    // The old address is released
    assert!(app.store.find_user_by_email("ada@example.com").unwrap().is_none());
    app.register("Ada Two", "ada@example.com", "password123").await;
}

#[tokio::test]
async fn test_change_password() {
    let app = setup_test_app();
    let token = app.register("Ada", "ada@example.com", "password123").await;

    let res = app
        .call(
            "PUT",
            "/api/auth/password",
            Some(&token),
            Some(json!({ "currentPassword": "wrong-one", "newPassword": "new-password-1" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .call(
            "PUT",
            "/api/auth/password",
            Some(&token),
            Some(json!({ "currentPassword": "password123", "newPassword": "new-password-1" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    for (password, expected) in [
        ("password123", StatusCode::UNAUTHORIZED),
        ("new-password-1", StatusCode::OK),
    ] {
        let res = app
            .call(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": "ada@example.com", "password": password })),
            )
            .await;
        assert_eq!(res.status, expected);
    }
}

#[tokio::test]
async fn test_delete_account_cascades() {
    let app = setup_test_app();
    let token = app.register("Ada", "ada@example.com", "password123").await;
    app.shorten(
        json!({ "originalUrl": "https://example.com", "customCode": "gone-soon" }),
        Some(&token),
    )
    .await;

    let res = app.call("DELETE", "/api/auth/account", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["deletedUrls"], 1);

    assert_eq!(app.get("/gone-soon", None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/api/auth/me", Some(&token)).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rate_limit_on_api() {
    let app = setup_test_app_with(Config {
        rate_limit_per_minute: 3,
        ..test_config()
    });

    for _ in 0..3 {
        let res = app.get("/api/auth/me", None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }

    let res = app.get("/api/auth/me", None).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.body["success"], false);

    // Public routes outside /api are not limited
    assert_eq!(app.get("/health", None).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_is_per_client() {
    let app = setup_test_app_with(Config {
        rate_limit_per_minute: 1,
        ..test_config()
    });

    let me = |peer| request_from("/api/auth/me", peer, None);
    assert_eq!(app.request(me("203.0.113.1:4000")).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.request(me("203.0.113.1:4001")).await.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(app.request(me("203.0.113.2:4000")).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rate_limit_ignores_forwarded_for_from_untrusted_peer() {
    let app = setup_test_app_with(Config {
        rate_limit_per_minute: 1,
        trusted_proxies: vec!["10.0.0.0/8".to_string()],
        ..test_config()
    });

    let mut limited = 0;
    for i in 0..20 {
        let spoofed = format!("198.51.100.{}", i);
        let res = app
            .request(request_from("/api/auth/me", "203.0.113.9:5000", Some(&spoofed)))
            .await;
        if res.status == StatusCode::TOO_MANY_REQUESTS {
            limited += 1;
        }
    }
    assert_eq!(limited, 19);
}

#[tokio::test]
async fn test_rate_limit_keys_on_client_behind_trusted_proxy() {
    let app = setup_test_app_with(Config {
        rate_limit_per_minute: 1,
        trusted_proxies: vec!["10.0.0.0/8".to_string()],
        ..test_config()
    });

    let via_proxy = |chain| request_from("/api/auth/me", "10.0.0.2:8000", Some(chain));
    assert_eq!(
        app.request(via_proxy("203.0.113.1")).await.status,
        StatusCode::UNAUTHORIZED
    );
    // A prepended hop does not change who the proxy saw
    assert_eq!(
        app.request(via_proxy("198.51.100.77, 203.0.113.1")).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
        app.request(via_proxy("203.0.113.2")).await.status,
        StatusCode::UNAUTHORIZED
    );
}
