use axum::extract::{Path, State};
use axum::Json;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use tastebud_shared::errors::{AppError, AppResult, ErrorCode};
use tastebud_shared::types::auth::AuthUser;
use tastebud_shared::types::ApiResponse;

use crate::models::{NewRestaurantLike, NewReviewLike, Review};
use crate::realtime::{publish_to_restaurant, RealtimeEvent};
use crate::schema::{restaurant_likes, review_likes, reviews};
use crate::services::likes::{LikeTarget, LikeToggle};
use crate::services::profile_service;
use crate::AppState;

use super::restaurants::find_restaurant;

// --- POST /restaurants/:id/like ---

pub async fn toggle_restaurant_like(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(restaurant_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<LikeToggle>>> {
    let mut conn = state.db.get()?;
    let me = profile_service::current_profile(&mut conn, user.id)?;
    find_restaurant(&mut conn, restaurant_id)?;

    let toggle = conn.transaction::<_, AppError, _>(|conn| {
        let removed = diesel::delete(
            restaurant_likes::table
                .filter(restaurant_likes::profile_id.eq(me.id))
                .filter(restaurant_likes::restaurant_id.eq(restaurant_id)),
        )
        .execute(conn)?;

        if removed == 0 {
            diesel::insert_into(restaurant_likes::table)
                .values(&NewRestaurantLike { profile_id: me.id, restaurant_id })
                .on_conflict_do_nothing()
                .execute(conn)?;
        }

        // Counted after the write so concurrent toggles report what was committed.
        let like_count: i64 = restaurant_likes::table
            .filter(restaurant_likes::restaurant_id.eq(restaurant_id))
            .count()
            .get_result(conn)?;

        Ok(LikeToggle::settled(removed == 0, like_count))
    })?;

    publish_to_restaurant(
        &state.io,
        restaurant_id,
        &RealtimeEvent::LikeChanged {
            target: LikeTarget::Restaurant,
            target_id: restaurant_id,
            like_count: toggle.like_count,
        },
    );

    tracing::debug!(profile_id = %me.id, restaurant_id = %restaurant_id, liked = toggle.liked, "restaurant like toggled");

    Ok(Json(ApiResponse::ok(toggle)))
}

// --- POST /reviews/:id/like ---

pub async fn toggle_review_like(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(review_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<LikeToggle>>> {
    let mut conn = state.db.get()?;
    let me = profile_service::current_profile(&mut conn, user.id)?;

    let review: Review = reviews::table
        .find(review_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::ReviewNotFound, "review not found"))?;

    let toggle = conn.transaction::<_, AppError, _>(|conn| {
        let removed = diesel::delete(
            review_likes::table
                .filter(review_likes::profile_id.eq(me.id))
                .filter(review_likes::review_id.eq(review_id)),
        )
        .execute(conn)?;

        if removed == 0 {
            diesel::insert_into(review_likes::table)
                .values(&NewReviewLike { profile_id: me.id, review_id })
                .on_conflict_do_nothing()
                .execute(conn)?;
        }

        // Counted after the write so concurrent toggles report what was committed.
        let like_count: i64 = review_likes::table
            .filter(review_likes::review_id.eq(review_id))
            .count()
            .get_result(conn)?;

        Ok(LikeToggle::settled(removed == 0, like_count))
    })?;

    publish_to_restaurant(
        &state.io,
        review.restaurant_id,
        &RealtimeEvent::LikeChanged {
            target: LikeTarget::Review,
            target_id: review_id,
            like_count: toggle.like_count,
        },
    );

    Ok(Json(ApiResponse::ok(toggle)))
}
