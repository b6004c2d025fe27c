use axum::extract::{Path, Query, State};
use axum::Json;
use diesel::dsl::count_star;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use tastebud_shared::errors::{AppError, AppResult, ErrorCode};
use tastebud_shared::middleware::OptionalAuthUser;
use tastebud_shared::types::pagination::{Paginated, PaginationParams};
use tastebud_shared::types::ApiResponse;

use crate::models::Restaurant;
use crate::schema::{restaurant_likes, restaurants, reviews};
use crate::services::catalog::{self, RestaurantCard, RestaurantFilter};
use crate::services::profile_service;
use crate::services::rating::{self, RatingSummary};
use crate::AppState;

/// Attaches rating, like count and the viewer's like to each restaurant.
fn build_cards(
    conn: &mut PgConnection,
    restaurants: Vec<Restaurant>,
    viewer: Option<Uuid>,
) -> AppResult<Vec<RestaurantCard>> {
    let ids: Vec<Uuid> = restaurants.iter().map(|r| r.id).collect();

    let ratings: Vec<(Uuid, i16)> = reviews::table
        .filter(reviews::restaurant_id.eq_any(&ids))
        .select((reviews::restaurant_id, reviews::rating))
        .load(conn)?;
    let mut summaries = rating::summarize_by_restaurant(&ratings);

    let like_counts: HashMap<Uuid, i64> = restaurant_likes::table
        .filter(restaurant_likes::restaurant_id.eq_any(&ids))
        .group_by(restaurant_likes::restaurant_id)
        .select((restaurant_likes::restaurant_id, count_star()))
        .load::<(Uuid, i64)>(conn)?
        .into_iter()
        .collect();

    let liked: HashSet<Uuid> = match viewer {
        Some(profile_id) => restaurant_likes::table
            .filter(restaurant_likes::profile_id.eq(profile_id))
            .filter(restaurant_likes::restaurant_id.eq_any(&ids))
            .select(restaurant_likes::restaurant_id)
            .load::<Uuid>(conn)?
            .into_iter()
            .collect(),
        None => HashSet::new(),
    };

    Ok(restaurants
        .into_iter()
        .map(|r| {
            let summary = summaries.remove(&r.id).unwrap_or_default();
            let like_count = like_counts.get(&r.id).copied().unwrap_or(0);
            let liked_by_me = liked.contains(&r.id);
            RestaurantCard::new(r, summary, like_count, liked_by_me)
        })
        .collect())
}

pub(crate) fn find_restaurant(conn: &mut PgConnection, id: Uuid) -> AppResult<Restaurant> {
    restaurants::table
        .find(id)
        .first::<Restaurant>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::RestaurantNotFound, "restaurant not found"))
}

// --- GET /restaurants ---

pub async fn list_restaurants(
    user: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<RestaurantFilter>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<RestaurantCard>>>> {
    let mut conn = state.db.get()?;
    let viewer = profile_service::viewer_id(&mut conn, &user)?;

    let all = restaurants::table.load::<Restaurant>(&mut conn)?;
    let cards = catalog::apply(&filter, build_cards(&mut conn, all, viewer)?);

    Ok(Json(ApiResponse::ok(Paginated::from_vec(cards, &params))))
}

// --- GET /restaurants/cuisines ---

pub async fn list_cuisines(State(state): State<Arc<AppState>>) -> AppResult<Json<ApiResponse<Vec<String>>>> {
    let mut conn = state.db.get()?;
    let cuisines: Vec<String> = restaurants::table
        .select(restaurants::cuisine)
        .distinct()
        .load(&mut conn)?;

    Ok(Json(ApiResponse::ok(catalog::distinct_cuisines(cuisines.iter().map(String::as_str)))))
}

// --- GET /restaurants/:id ---

pub async fn get_restaurant(
    user: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<RestaurantCard>>> {
    let mut conn = state.db.get()?;
    let viewer = profile_service::viewer_id(&mut conn, &user)?;
    let restaurant = find_restaurant(&mut conn, id)?;

    let card = build_cards(&mut conn, vec![restaurant], viewer)?
        .pop()
        .ok_or_else(|| AppError::new(ErrorCode::RestaurantNotFound, "restaurant not found"))?;

    Ok(Json(ApiResponse::ok(card)))
}

/// Current rating summary for one restaurant, for realtime payloads.
pub(crate) fn rating_summary(conn: &mut PgConnection, restaurant_id: Uuid) -> AppResult<RatingSummary> {
    let ratings: Vec<i16> = reviews::table
        .filter(reviews::restaurant_id.eq(restaurant_id))
        .select(reviews::rating)
        .load(conn)?;
    Ok(RatingSummary::from_ratings(ratings))
}
