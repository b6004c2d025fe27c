use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use diesel::dsl::count_star;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use tastebud_shared::errors::{AppError, AppResult, ErrorCode};
use tastebud_shared::middleware::OptionalAuthUser;
use tastebud_shared::types::auth::AuthUser;
use tastebud_shared::types::pagination::{Paginated, PaginationParams};
use tastebud_shared::types::ApiResponse;

use crate::models::{NewReview, Profile, Review};
use crate::realtime::events::ReviewDelta;
use crate::realtime::{publish_to_restaurant, RealtimeEvent};
use crate::schema::{profiles, restaurants, review_likes, reviews};
use crate::services::rating::RatingSummary;
use crate::services::{media, profile_service, review_rules};
use crate::AppState;

use super::restaurants::{find_restaurant, rating_summary};
use super::upload::{self, UploadForm};
use super::within_rate_limit;

const REVIEW_WINDOW_SECS: u64 = 3600;

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub author_username: String,
    pub author_avatar_url: Option<String>,
    pub like_count: i64,
    pub liked_by_me: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant_name: Option<String>,
}

impl From<&ReviewView> for ReviewDelta {
    fn from(view: &ReviewView) -> Self {
        Self {
            id: view.review.id,
            restaurant_id: view.review.restaurant_id,
            author_id: view.review.author_id,
            author_username: view.author_username.clone(),
            author_avatar_url: view.author_avatar_url.clone(),
            rating: view.review.rating,
            comment: view.review.comment.clone(),
            image_url: view.review.image_url.clone(),
            created_at: view.review.created_at,
        }
    }
}

/// Joins author, like data and optionally the restaurant name onto reviews.
fn build_views(
    conn: &mut PgConnection,
    rows: Vec<Review>,
    viewer: Option<Uuid>,
    with_restaurant: bool,
) -> AppResult<Vec<ReviewView>> {
    let review_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let author_ids: Vec<Uuid> = rows.iter().map(|r| r.author_id).collect();

    let authors: HashMap<Uuid, Profile> = profiles::table
        .filter(profiles::id.eq_any(&author_ids))
        .load::<Profile>(conn)?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let like_counts: HashMap<Uuid, i64> = review_likes::table
        .filter(review_likes::review_id.eq_any(&review_ids))
        .group_by(review_likes::review_id)
        .select((review_likes::review_id, count_star()))
        .load::<(Uuid, i64)>(conn)?
        .into_iter()
        .collect();

    let liked: HashSet<Uuid> = match viewer {
        Some(profile_id) => review_likes::table
            .filter(review_likes::profile_id.eq(profile_id))
            .filter(review_likes::review_id.eq_any(&review_ids))
            .select(review_likes::review_id)
            .load::<Uuid>(conn)?
            .into_iter()
            .collect(),
        None => HashSet::new(),
    };

    let restaurant_names: HashMap<Uuid, String> = if with_restaurant {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.restaurant_id).collect();
        restaurants::table
            .filter(restaurants::id.eq_any(&ids))
            .select((restaurants::id, restaurants::name))
            .load::<(Uuid, String)>(conn)?
            .into_iter()
            .collect()
    } else {
        HashMap::new()
    };

    Ok(rows
        .into_iter()
        .map(|review| {
            let author = authors.get(&review.author_id);
            ReviewView {
                author_username: author.map(|a| a.username.clone()).unwrap_or_default(),
                author_avatar_url: author.and_then(|a| a.avatar_url.clone()),
                like_count: like_counts.get(&review.id).copied().unwrap_or(0),
                liked_by_me: liked.contains(&review.id),
                restaurant_name: restaurant_names.get(&review.restaurant_id).cloned(),
                review,
            }
        })
        .collect())
}

/// One page of reviews by the given authors, newest first.
fn reviews_by_authors(
    conn: &mut PgConnection,
    author_ids: &[Uuid],
    params: &PaginationParams,
    viewer: Option<Uuid>,
) -> AppResult<Paginated<ReviewView>> {
    let total: i64 = reviews::table
        .filter(reviews::author_id.eq_any(author_ids))
        .count()
        .get_result(conn)?;

    let rows = reviews::table
        .filter(reviews::author_id.eq_any(author_ids))
        .order(reviews::created_at.desc())
        .offset(params.offset() as i64)
        .limit(params.limit() as i64)
        .load::<Review>(conn)?;

    let views = build_views(conn, rows, viewer, true)?;
    Ok(Paginated::new(views, total as u64, params))
}

fn insert_review(state: &AppState, new_review: &NewReview) -> AppResult<Review> {
    let mut conn = state.db.get()?;
    Ok(diesel::insert_into(reviews::table)
        .values(new_review)
        .get_result(&mut conn)?)
}

/// Rating summary for a realtime push. The write has already committed, so a
/// failed read only skips the push.
fn summary_for_push(state: &AppState, restaurant_id: Uuid) -> Option<RatingSummary> {
    let summary = state
        .db
        .get()
        .map_err(AppError::from)
        .and_then(|mut conn| rating_summary(&mut conn, restaurant_id));
    log_push_skipped(restaurant_id, summary)
}

fn log_push_skipped(restaurant_id: Uuid, summary: AppResult<RatingSummary>) -> Option<RatingSummary> {
    match summary {
        Ok(summary) => Some(summary),
        Err(e) => {
            tracing::warn!(restaurant_id = %restaurant_id, error = %e, "rating summary unavailable, skipping push");
            None
        }
    }
}

// --- GET /restaurants/:id/reviews ---

pub async fn list_reviews(
    user: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(restaurant_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<ReviewView>>>> {
    let mut conn = state.db.get()?;
    let viewer = profile_service::viewer_id(&mut conn, &user)?;
    find_restaurant(&mut conn, restaurant_id)?;

    let total: i64 = reviews::table
        .filter(reviews::restaurant_id.eq(restaurant_id))
        .count()
        .get_result(&mut conn)?;

    let rows = reviews::table
        .filter(reviews::restaurant_id.eq(restaurant_id))
        .order(reviews::created_at.desc())
        .offset(params.offset() as i64)
        .limit(params.limit() as i64)
        .load::<Review>(&mut conn)?;

    let views = build_views(&mut conn, rows, viewer, false)?;
    Ok(Json(ApiResponse::ok(Paginated::new(views, total as u64, &params))))
}

// --- GET /profiles/:id/reviews ---

pub async fn list_profile_reviews(
    user: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<ReviewView>>>> {
    let mut conn = state.db.get()?;
    let viewer = profile_service::viewer_id(&mut conn, &user)?;
    let profile = profile_service::find_profile(&mut conn, id)?;

    let page = reviews_by_authors(&mut conn, &[profile.id], &params, viewer)?;
    Ok(Json(ApiResponse::ok(page)))
}

// --- GET /feed ---

pub async fn feed(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<ReviewView>>>> {
    let mut conn = state.db.get()?;
    let me = profile_service::current_profile(&mut conn, user.id)?;

    let mut authors = profile_service::accepted_friend_ids(&mut conn, me.id)?;
    authors.push(me.id);

    let page = reviews_by_authors(&mut conn, &authors, &params, Some(me.id))?;
    Ok(Json(ApiResponse::ok(page)))
}

// --- POST /restaurants/:id/reviews --- (multipart: rating, comment, image?)

pub async fn submit_review(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(restaurant_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<ReviewView>>> {
    let author = {
        let mut conn = state.db.get()?;
        find_restaurant(&mut conn, restaurant_id)?;
        profile_service::current_profile(&mut conn, user.id)?
    };

    let form = UploadForm::read(multipart, "image").await?;
    let rating = match form.field("rating") {
        Some(raw) => review_rules::parse_rating(raw)?,
        None => None,
    };
    let valid = review_rules::validate_review(rating, form.field("comment"))?;
    let image_ext = match form.file.as_ref() {
        Some(file) => Some(media::image_extension(&file.content_type)?),
        None => None,
    };

    within_rate_limit(&state, "reviews", author.id, state.config.review_rate_limit, REVIEW_WINDOW_SECS).await?;

    let image_url = match (form.file, image_ext) {
        (Some(file), Some(ext)) => {
            let key = media::object_key("reviews", restaurant_id, ext);
            Some(upload::store(&state, &key, file).await?)
        }
        _ => None,
    };

    let inserted = insert_review(
        &state,
        &NewReview {
            restaurant_id,
            author_id: author.id,
            rating: valid.rating,
            comment: valid.comment,
            image_url: image_url.clone(),
        },
    );
    let review = upload::undo_on_error(inserted, upload::discard_opt(&state, image_url.as_deref())).await?;

    let view = ReviewView {
        author_username: author.username,
        author_avatar_url: author.avatar_url,
        like_count: 0,
        liked_by_me: false,
        restaurant_name: None,
        review,
    };

    if let Some(summary) = summary_for_push(&state, restaurant_id) {
        publish_to_restaurant(
            &state.io,
            restaurant_id,
            &RealtimeEvent::ReviewCreated {
                review: ReviewDelta::from(&view),
                average_rating: summary.average_rating,
                review_count: summary.review_count,
            },
        );
    }

    tracing::info!(
        review_id = %view.review.id,
        restaurant_id = %restaurant_id,
        author_id = %view.review.author_id,
        rating = view.review.rating,
        "review submitted"
    );

    Ok(Json(ApiResponse::ok(view)))
}

// --- DELETE /reviews/:id ---

pub async fn delete_review(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(review_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    let review = {
        let mut conn = state.db.get()?;
        let me = profile_service::current_profile(&mut conn, user.id)?;

        let review: Review = reviews::table
            .find(review_id)
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| AppError::new(ErrorCode::ReviewNotFound, "review not found"))?;

        if review.author_id != me.id {
            return Err(AppError::forbidden("only the author can delete a review"));
        }

        diesel::delete(reviews::table.find(review.id)).execute(&mut conn)?;
        review
    };

    if let Some(summary) = summary_for_push(&state, review.restaurant_id) {
        publish_to_restaurant(
            &state.io,
            review.restaurant_id,
            &RealtimeEvent::ReviewDeleted {
                review_id: review.id,
                restaurant_id: review.restaurant_id,
                average_rating: summary.average_rating,
                review_count: summary.review_count,
            },
        );
    }

    if let Some(url) = review.image_url.as_deref() {
        upload::discard(&state, url).await;
    }

    tracing::info!(review_id = %review.id, restaurant_id = %review.restaurant_id, "review deleted");

    Ok(Json(ApiResponse::ok("review deleted")))
}
