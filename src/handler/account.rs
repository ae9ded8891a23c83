//! Account endpoints: registration, login and self-service profile changes

use axum::extract::State;
use chrono::Utc;
use serde::Serialize;
use validator::Validate;

use crate::auth::{create_token, hash_password, verify_password, AuthUser};
use crate::database::UserUpdate;
use crate::error::AppError;
use crate::extract::ApiJson;
use crate::model::{
    normalize_email, AuthPayload, ChangePasswordRequest, LoginRequest, RegisterRequest,
    UpdateProfileRequest, User, UserView,
};
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDeleted {
    pub deleted_urls: usize,
}

/// Creates an account and signs it in
///
/// # Request Body
///
/// ```json
/// { "name": "Ada", "email": "ada@example.com", "password": "at-least-8" }
/// ```
///
/// # Response
///
/// - **201 Created** - `{ user, token }`
/// - **400 Bad Request** - Validation failed
/// - **409 Conflict** - E-mail already registered
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<ApiResponse<AuthPayload>, AppError> {
    payload.validate()?;

    let password_hash = hash_password(payload.password, state.config.bcrypt_cost).await?;
    let user = User::new(payload.name.trim().to_string(), payload.email, password_hash);

    if !state.store.insert_user(&user)? {
        return Err(AppError::Conflict(
            "An account with this email already exists".to_string(),
        ));
    }

    let token = create_token(&user.id, &state.config)?;
    tracing::info!(user = %user.id, "Account registered");

    Ok(ApiResponse::created(
        "Account created successfully",
        AuthPayload {
            user: UserView::from(&user),
            token,
        },
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<ApiResponse<AuthPayload>, AppError> {
    payload.validate()?;

    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let user = state
        .store
        .find_user_by_email(&payload.email)?
        .ok_or_else(invalid)?;

    if !verify_password(payload.password, user.password_hash.clone()).await? {
        tracing::debug!(user = %user.id, "Login with wrong password");
        return Err(invalid());
    }
    if !user.is_active {
        return Err(AppError::Unauthorized("Account is deactivated".to_string()));
    }

    let now = Utc::now();
    let user = match state.store.update_user(&user.id, |u| u.last_login_at = Some(now))? {
        UserUpdate::Updated(user) => user,
        // Deleted between lookup and update
        UserUpdate::NotFound | UserUpdate::EmailTaken => return Err(invalid()),
    };

    let token = create_token(&user.id, &state.config)?;
    Ok(ApiResponse::ok(
        "Login successful",
        AuthPayload {
            user: UserView::from(&user),
            token,
        },
    ))
}

pub async fn me(AuthUser(user): AuthUser) -> ApiResponse<UserView> {
    ApiResponse::ok("User retrieved successfully", UserView::from(&user))
}

/// Changes name and/or e-mail; a taken e-mail is a 409
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<ApiResponse<UserView>, AppError> {
    payload.validate()?;

    let now = Utc::now();
    let outcome = state.store.update_user(&user.id, |stored| {
        if let Some(name) = payload.name {
            stored.name = name.trim().to_string();
        }
        if let Some(email) = payload.email {
            stored.email = normalize_email(&email);
        }
        stored.updated_at = now;
    })?;

    let user = match outcome {
        UserUpdate::Updated(user) => user,
        UserUpdate::NotFound => return Err(AppError::not_found("User")),
        UserUpdate::EmailTaken => {
            return Err(AppError::Conflict(
                "An account with this email already exists".to_string(),
            ))
        }
    };

    Ok(ApiResponse::ok(
        "Profile updated successfully",
        UserView::from(&user),
    ))
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, AppError> {
    payload.validate()?;

    if !verify_password(payload.current_password, user.password_hash.clone()).await? {
        return Err(AppError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    let password_hash = hash_password(payload.new_password, state.config.bcrypt_cost).await?;
    let now = Utc::now();
    let outcome = state.store.update_user(&user.id, |stored| {
        stored.password_hash = password_hash;
        stored.updated_at = now;
    })?;
    if !matches!(outcome, UserUpdate::Updated(_)) {
        return Err(AppError::not_found("User"));
    }

    tracing::info!(user = %user.id, "Password changed");
    Ok(ApiResponse::message("Password changed successfully"))
}

/// Deletes the caller's account together with all of their URLs
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<ApiResponse<AccountDeleted>, AppError> {
    let deleted_urls = state
        .store
        .delete_user(&user.id)?
        .ok_or_else(|| AppError::not_found("User"))?;

    tracing::info!(user = %user.id, deleted_urls, "Account deleted");
    Ok(ApiResponse::ok(
        "Account deleted successfully",
        AccountDeleted { deleted_urls },
    ))
}
