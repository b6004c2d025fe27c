use axum::extract::State;
use axum::Json;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use tastebud_shared::errors::{AppError, AppResult, ErrorCode};
use tastebud_shared::middleware::jwt_secret;
use tastebud_shared::types::auth::{AuthUser, TokenPair};
use tastebud_shared::types::ApiResponse;

use crate::models::{Credential, NewCredential, NewProfile, NewRefreshToken, Profile, RefreshToken};
use crate::schema::{credentials, profiles, refresh_tokens};
use crate::services::{auth_service, profile_service, token_service};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub password: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub credential_id: Uuid,
    pub email: String,
    pub profile: Profile,
}

/// Issues a token pair and persists the refresh hash.
fn issue_tokens(conn: &mut PgConnection, state: &AppState, credential_id: Uuid) -> AppResult<TokenPair> {
    let (pair, refresh_hash) =
        token_service::create_token_pair(credential_id, &jwt_secret(), state.config.jwt_access_ttl)?;

    diesel::insert_into(refresh_tokens::table)
        .values(&NewRefreshToken {
            credential_id,
            token_hash: refresh_hash,
            expires_at: Utc::now() + chrono::Duration::seconds(state.config.jwt_refresh_ttl),
        })
        .execute(conn)?;

    Ok(pair)
}

// --- POST /auth/signup ---

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;
    auth_service::validate_password(&req.password)?;

    let username = req.username.trim().to_string();
    auth_service::validate_username(&username)?;

    let email = auth_service::normalize_email(&req.email);
    let password_hash = auth_service::hash_password(&req.password)?;
    let mut conn = state.db.get()?;

    let email_taken: i64 = credentials::table
        .filter(credentials::email.eq(&email))
        .count()
        .get_result(&mut conn)?;
    if email_taken > 0 {
        return Err(AppError::new(ErrorCode::EmailAlreadyExists, "email already registered"));
    }
    if profile_service::username_taken(&mut conn, &username, None)? {
        return Err(AppError::new(ErrorCode::UsernameTaken, "username is already taken"));
    }

    let (credential, profile) = conn.transaction::<_, AppError, _>(|conn| {
        let credential: Credential = diesel::insert_into(credentials::table)
            .values(&NewCredential { email: email.clone(), password_hash })
            .get_result(conn)?;

        let profile: Profile = diesel::insert_into(profiles::table)
            .values(&NewProfile {
                credential_id: credential.id,
                username: username.clone(),
                email: email.clone(),
            })
            .get_result(conn)?;

        Ok((credential, profile))
    })?;

    let pair = issue_tokens(&mut conn, &state, credential.id)?;

    tracing::info!(credential_id = %credential.id, profile_id = %profile.id, "user signed up");

    Ok(Json(ApiResponse::ok(pair)))
}

// --- POST /auth/login ---

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    let invalid = || AppError::new(ErrorCode::InvalidCredentials, "invalid email or password");
    let mut conn = state.db.get()?;

    let credential: Credential = credentials::table
        .filter(credentials::email.eq(auth_service::normalize_email(&req.email)))
        .first(&mut conn)
        .optional()?
        .ok_or_else(invalid)?;

    if !auth_service::verify_password(&req.password, &credential.password_hash)? {
        return Err(invalid());
    }

    let pair = issue_tokens(&mut conn, &state, credential.id)?;

    tracing::info!(credential_id = %credential.id, "user logged in");

    Ok(Json(ApiResponse::ok(pair)))
}

// --- POST /auth/refresh ---

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    let token_hash = token_service::hash_token(&req.refresh_token);
    let mut conn = state.db.get()?;

    let stored: RefreshToken = refresh_tokens::table
        .filter(refresh_tokens::token_hash.eq(&token_hash))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::TokenInvalid, "invalid refresh token"))?;

    if stored.revoked_at.is_some() {
        return Err(AppError::new(ErrorCode::RefreshTokenRevoked, "refresh token has been revoked"));
    }
    if stored.expires_at < Utc::now() {
        return Err(AppError::new(ErrorCode::TokenExpired, "refresh token expired"));
    }

    // Only one concurrent refresh may win the rotation
    let revoked = diesel::update(
        refresh_tokens::table
            .filter(refresh_tokens::id.eq(stored.id))
            .filter(refresh_tokens::revoked_at.is_null()),
    )
    .set(refresh_tokens::revoked_at.eq(Some(Utc::now())))
    .execute(&mut conn)?;
    if revoked == 0 {
        return Err(AppError::new(ErrorCode::RefreshTokenRevoked, "refresh token has been revoked"));
    }

    let pair = issue_tokens(&mut conn, &state, stored.credential_id)?;

    Ok(Json(ApiResponse::ok(pair)))
}

// --- POST /auth/logout ---

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    let token_hash = token_service::hash_token(&req.refresh_token);
    let mut conn = state.db.get()?;

    diesel::update(
        refresh_tokens::table
            .filter(refresh_tokens::token_hash.eq(&token_hash))
            .filter(refresh_tokens::revoked_at.is_null()),
    )
    .set(refresh_tokens::revoked_at.eq(Some(Utc::now())))
    .execute(&mut conn)?;

    Ok(Json(ApiResponse::ok("logged out")))
}

// --- GET /auth/session ---

pub async fn session(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<SessionResponse>>> {
    let mut conn = state.db.get()?;

    let credential: Credential = credentials::table
        .find(user.id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::unauthorized("session no longer valid"))?;
    let profile = profile_service::current_profile(&mut conn, user.id)?;

    Ok(Json(ApiResponse::ok(SessionResponse {
        credential_id: credential.id,
        email: credential.email,
        profile,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_request_rejects_malformed_email() {
        let req = SignupRequest {
            email: "not-an-email".into(),
            password: "hunter22".into(),
            username: "foodie".into(),
        };
        assert!(req.validate().is_err());

        let ok = SignupRequest { email: "eat@tastebud.app".into(), ..req };
        assert!(ok.validate().is_ok());
    }
}
