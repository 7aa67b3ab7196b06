use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::access::{Caller, Operation};
use crate::app::AppState;
use crate::db::{StoreError, TokenBlacklist, UserStore};
use crate::errors::AppError;
use crate::models::user::{User, UserProfile};
use crate::utils::jwt::{TokenError, TokenKind};
use crate::utils::password::{hash_password, verify_password};
use crate::utils::validation::{validate_payload, FieldErrors};

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());

const REQUIRED: &str = "This field is required.";

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(min = 1, max = 150, message = "Ensure this field has no more than 150 characters."),
        regex(
            path = "USERNAME_RE",
            message = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
        )
    )]
    username: Option<String>,
    #[validate(length(min = 8, max = 128, message = "Password must be between 8 and 128 characters."))]
    password: Option<String>,
    #[validate(email(message = "Enter a valid email address."))]
    email: Option<String>,
    #[validate(length(max = 150))]
    first_name: Option<String>,
    #[validate(length(max = 150))]
    last_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
pub struct LogoutRequest {
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    refresh: Option<String>,
}

fn required<'a>(errors: &mut FieldErrors, field: &str, value: &'a Option<String>) -> Option<&'a str> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            errors.replace(field, REQUIRED);
            None
        }
    }
}

fn hashing_error(err: argon2::password_hash::Error) -> AppError {
    AppError::InternalServerError(format!("Hashing error: {}", err))
}

/// Issuing a token only fails on the server side.
fn issuing_error(err: TokenError) -> AppError {
    AppError::InternalServerError(format!("Token issuing error: {}", err))
}

pub async fn register(
    state: web::Data<AppState>,
    req: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let mut req = req.into_inner();
    // Email is optional; an empty string means none.
    req.email = req.email.filter(|email| !email.is_empty());

    let mut errors = validate_payload(&req).err().unwrap_or_default();
    let username = required(&mut errors, "username", &req.username);
    let password = required(&mut errors, "password", &req.password);
    let email = req.email.clone().unwrap_or_default();

    if let Some(username) = username.filter(|_| !errors.has("username")) {
        for field in state.store.find_user_conflicts(username, &email).await? {
            errors.add(field.field(), field.message());
        }
    }
    errors.into_result().map_err(AppError::Validation)?;

    // Both are present once the field errors are empty.
    let (Some(username), Some(password)) = (username, password) else {
        return Err(AppError::BadRequest("username and password are required".to_string()));
    };

    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email,
        first_name: req.first_name.clone().unwrap_or_default(),
        last_name: req.last_name.clone().unwrap_or_default(),
        password_hash: hash_password(password).map_err(hashing_error)?,
        is_staff: false,
        is_active: true,
        created_at: Utc::now(),
    };
    let user = state.store.insert_user(user).await?;

    info!("Registered user {}", user.username);
    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "user": {
            "id": user.id,
            "username": user.username,
            "email": user.email,
        },
    })))
}

pub async fn login(
    state: web::Data<AppState>,
    req: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let mut errors = FieldErrors::new();
    let username = required(&mut errors, "username", &req.username);
    let password = required(&mut errors, "password", &req.password);
    errors.into_result().map_err(AppError::Validation)?;
    let (Some(username), Some(password)) = (username, password) else {
        return Err(AppError::BadRequest("username and password are required".to_string()));
    };

    let invalid = || AppError::Unauthorized("Invalid username or password".to_string());

    let Some(user) = state.store.find_user_by_username(username).await? else {
        warn!("Failed login for unknown user {}", username);
        return Err(invalid());
    };
    if !verify_password(password, &user.password_hash).map_err(hashing_error)? {
        warn!("Failed login for {}", username);
        return Err(invalid());
    }
    if !user.is_active {
        warn!("Login attempt on disabled account {}", username);
        return Err(AppError::Forbidden("Account is disabled".to_string()));
    }

    let tokens = state
        .tokens
        .issue_pair(&user)
        .map_err(issuing_error)?;

    info!("User {} logged in", user.username);
    Ok(HttpResponse::Ok().json(json!({
        "message": "Login successful",
        "user": UserProfile::from(&user),
        "tokens": tokens,
    })))
}

/// Blacklists the presented refresh token. Without one the client simply
/// drops its tokens.
pub async fn logout(
    caller: Caller,
    state: web::Data<AppState>,
    req: Option<web::Json<LogoutRequest>>,
) -> Result<HttpResponse, AppError> {
    let identity = caller.authorize(Operation::Logout)?;

    let refresh = req
        .and_then(|body| body.into_inner().refresh_token)
        .filter(|token| !token.is_empty());
    if let Some(token) = refresh {
        let claims = state.tokens.decode(&token, TokenKind::Refresh)?;
        if state.store.is_token_revoked(claims.jti).await? {
            return Err(TokenError::Blacklisted.into());
        }
        state.store.revoke_token(claims.jti, claims.expires_at()).await?;
    }

    info!("User {} logged out", identity.username);
    Ok(HttpResponse::Ok().json(json!({ "message": "Logout successful" })))
}

pub async fn refresh_token(
    state: web::Data<AppState>,
    req: web::Json<RefreshRequest>,
) -> Result<HttpResponse, AppError> {
    let Some(token) = req.refresh.as_deref().filter(|t| !t.is_empty()) else {
        return Err(AppError::Validation(FieldErrors::single("refresh", REQUIRED)));
    };

    let unauthorized = |err: TokenError| AppError::Unauthorized(err.to_string());
    let claims = state.tokens.decode(token, TokenKind::Refresh).map_err(unauthorized)?;
    if state.store.is_token_revoked(claims.jti).await? {
        return Err(unauthorized(TokenError::Blacklisted));
    }

    let user = state
        .store
        .find_user_by_id(claims.user.id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    let access = state
        .tokens
        .issue(&user, TokenKind::Access)
        .map_err(issuing_error)?;
    Ok(HttpResponse::Ok().json(json!({ "access": access })))
}

pub async fn profile(caller: Caller, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let identity = caller.authorize(Operation::ViewProfile)?;

    let user = state
        .store
        .find_user_by_id(identity.user_id)
        .await?
        .ok_or(StoreError::NotFound)?;
    Ok(HttpResponse::Ok().json(UserProfile::from(&user)))
}
