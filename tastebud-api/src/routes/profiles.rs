use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use tastebud_shared::errors::{AppError, AppResult, ErrorCode};
use tastebud_shared::middleware::OptionalAuthUser;
use tastebud_shared::types::auth::AuthUser;
use tastebud_shared::types::ApiResponse;

use crate::models::{Profile, PublicProfile, UpdateProfile};
use crate::schema::{posts, profiles, reviews};
use crate::services::{auth_service, media, profile_service};
use crate::AppState;

use super::upload::{self, UploadForm};

pub const MAX_BIO_CHARS: usize = 500;
pub const MAX_LOCATION_CHARS: usize = 100;
pub const MAX_SEARCH_LIMIT: i64 = 50;

/// The caller's own profile; the only view that includes the email.
#[derive(Debug, Serialize)]
pub struct OwnProfile {
    #[serde(flatten)]
    pub profile: Profile,
    pub email: String,
}

impl From<Profile> for OwnProfile {
    fn from(profile: Profile) -> Self {
        let email = profile.email.clone();
        Self { profile, email }
    }
}

// --- GET /profiles/me ---

pub async fn get_own_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<OwnProfile>>> {
    let mut conn = state.db.get()?;
    let profile = profile_service::current_profile(&mut conn, user.id)?;
    Ok(Json(ApiResponse::ok(profile.into())))
}

// --- GET /profiles/:id --- (profile id or credential id)

pub async fn get_profile(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PublicProfile>>> {
    let profile = {
        let mut conn = state.db.get()?;
        profile_service::find_profile(&mut conn, id)?
    };

    let mut views = profile_service::with_presence(&state.redis, vec![profile]).await;
    let view = views
        .pop()
        .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

    Ok(Json(ApiResponse::ok(view)))
}

// --- PATCH /profiles/me ---

fn validate_update(update: &mut UpdateProfile) -> AppResult<()> {
    if let Some(username) = update.username.as_mut() {
        *username = username.trim().to_string();
        auth_service::validate_username(username)?;
    }
    if let Some(bio) = update.bio.as_ref() {
        if bio.chars().count() > MAX_BIO_CHARS {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                format!("bio must be at most {MAX_BIO_CHARS} characters"),
            ));
        }
    }
    if let Some(location) = update.location.as_ref() {
        if location.chars().count() > MAX_LOCATION_CHARS {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                format!("location must be at most {MAX_LOCATION_CHARS} characters"),
            ));
        }
    }
    if let Some(date_of_birth) = update.date_of_birth {
        if date_of_birth > Utc::now().date_naive() {
            return Err(AppError::new(ErrorCode::ValidationError, "date_of_birth cannot be in the future"));
        }
    }
    Ok(())
}

pub async fn update_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(mut payload): Json<UpdateProfile>,
) -> AppResult<Json<ApiResponse<OwnProfile>>> {
    validate_update(&mut payload)?;

    let mut conn = state.db.get()?;
    let profile = profile_service::current_profile(&mut conn, user.id)?;

    if payload.is_empty() {
        return Ok(Json(ApiResponse::ok(profile.into())));
    }

    if let Some(username) = payload.username.as_deref() {
        if profile_service::username_taken(&mut conn, username, Some(profile.id))? {
            return Err(AppError::new(ErrorCode::UsernameTaken, "username is already taken"));
        }
    }

    let updated = diesel::update(profiles::table.filter(profiles::id.eq(profile.id)))
        .set((&payload, profiles::updated_at.eq(Utc::now())))
        .get_result::<Profile>(&mut conn)?;

    tracing::info!(profile_id = %updated.id, "profile updated");

    Ok(Json(ApiResponse::ok(updated.into())))
}

// --- POST /profiles/me/avatar ---

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub avatar_url: String,
}

pub async fn upload_avatar(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<AvatarResponse>>> {
    let profile = {
        let mut conn = state.db.get()?;
        profile_service::current_profile(&mut conn, user.id)?
    };

    let (file, _) = UploadForm::read(multipart, "file").await?.require_file()?;
    let ext = media::image_extension(&file.content_type)?;
    let key = media::object_key("avatars", profile.id, ext);
    let avatar_url = upload::store(&state, &key, file).await?;

    let updated = state.db.get().map_err(AppError::from).and_then(|mut conn| {
        diesel::update(profiles::table.filter(profiles::id.eq(profile.id)))
            .set((
                profiles::avatar_url.eq(&avatar_url),
                profiles::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .map_err(AppError::from)
    });
    upload::undo_on_error(updated, upload::discard(&state, &avatar_url)).await?;

    if let Some(previous) = profile.avatar_url.as_deref() {
        upload::discard(&state, previous).await;
    }

    tracing::info!(profile_id = %profile.id, avatar_url = %avatar_url, "avatar uploaded");

    Ok(Json(ApiResponse::ok(AvatarResponse { avatar_url })))
}

// --- GET /profiles/check-username ---

#[derive(Debug, Deserialize)]
pub struct CheckUsernameQuery {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct CheckUsernameResponse {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub async fn check_username(
    user: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<CheckUsernameQuery>,
) -> AppResult<Json<ApiResponse<CheckUsernameResponse>>> {
    let username = query.username.trim();
    if let Err(e) = auth_service::validate_username(username) {
        return Ok(Json(ApiResponse::ok(CheckUsernameResponse {
            available: false,
            reason: Some(e.to_string()),
        })));
    }

    let mut conn = state.db.get()?;
    // Keeping your own name counts as available
    let own_profile = profile_service::viewer_id(&mut conn, &user)?;
    let taken = profile_service::username_taken(&mut conn, username, own_profile)?;

    Ok(Json(ApiResponse::ok(CheckUsernameResponse {
        available: !taken,
        reason: taken.then(|| "username is already taken".to_string()),
    })))
}

// --- GET /profiles/search ---

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<i64>,
}

pub fn search_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(20).clamp(1, MAX_SEARCH_LIMIT)
}

pub async fn search_profiles(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<Vec<PublicProfile>>>> {
    if query.q.trim().is_empty() {
        return Ok(Json(ApiResponse::ok(Vec::new())));
    }

    let found = {
        let mut conn = state.db.get()?;
        let me = profile_service::current_profile(&mut conn, user.id)?;

        profiles::table
            .filter(profiles::username.ilike(profile_service::contains_pattern(&query.q)))
            .filter(profiles::id.ne(me.id))
            .order(profiles::username.asc())
            .limit(search_limit(query.limit))
            .load::<Profile>(&mut conn)?
    };

    let results = profile_service::with_presence(&state.redis, found).await;
    Ok(Json(ApiResponse::ok(results)))
}

// --- GET /profiles/:id/stats ---

#[derive(Debug, Serialize)]
pub struct ProfileStats {
    pub profile_id: Uuid,
    pub review_count: i64,
    pub friend_count: i64,
    pub post_count: i64,
}

pub async fn profile_stats(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ProfileStats>>> {
    let mut conn = state.db.get()?;
    let profile = profile_service::find_profile(&mut conn, id)?;

    let review_count: i64 = reviews::table
        .filter(reviews::author_id.eq(profile.id))
        .count()
        .get_result(&mut conn)?;
    let post_count: i64 = posts::table
        .filter(posts::author_id.eq(profile.id))
        .count()
        .get_result(&mut conn)?;
    let friend_count = profile_service::accepted_friend_ids(&mut conn, profile.id)?.len() as i64;

    Ok(Json(ApiResponse::ok(ProfileStats {
        profile_id: profile.id,
        review_count,
        friend_count,
        post_count,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn search_limit_is_clamped() {
        assert_eq!(search_limit(None), 20);
        assert_eq!(search_limit(Some(0)), 1);
        assert_eq!(search_limit(Some(500)), MAX_SEARCH_LIMIT);
        assert_eq!(search_limit(Some(7)), 7);
    }

    #[test]
    fn update_trims_and_validates_username() {
        let mut update = UpdateProfile { username: Some("  ramen_fan ".into()), ..Default::default() };
        validate_update(&mut update).unwrap();
        assert_eq!(update.username.as_deref(), Some("ramen_fan"));

        let mut bad = UpdateProfile { username: Some("no spaces".into()), ..Default::default() };
        assert_eq!(validate_update(&mut bad).unwrap_err().error_code(), ErrorCode::InvalidUsername);
    }

    #[test]
    fn update_rejects_long_bio_and_future_birthday() {
        let mut bio = UpdateProfile { bio: Some("a".repeat(MAX_BIO_CHARS + 1)), ..Default::default() };
        assert!(validate_update(&mut bio).is_err());

        let tomorrow = Utc::now().date_naive() + Duration::days(1);
        let mut dob = UpdateProfile { date_of_birth: Some(tomorrow), ..Default::default() };
        assert!(validate_update(&mut dob).is_err());
    }

    #[test]
    fn own_profile_exposes_email() {
        let now = Utc::now();
        let profile = Profile {
            id: Uuid::new_v4(),
            credential_id: Uuid::new_v4(),
            username: "dumpling_queen".into(),
            email: "dq@tastebud.app".into(),
            avatar_url: None,
            bio: None,
            location: Some("Lyon".into()),
            date_of_birth: None,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(OwnProfile::from(profile.clone())).unwrap();
        assert_eq!(value["email"], "dq@tastebud.app");
        assert_eq!(value["username"], "dumpling_queen");

        let public = serde_json::to_value(&profile).unwrap();
        assert!(public.get("email").is_none());
    }
}
