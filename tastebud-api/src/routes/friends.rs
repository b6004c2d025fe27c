use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use tastebud_shared::errors::{AppError, AppResult, ErrorCode};
use tastebud_shared::types::auth::AuthUser;
use tastebud_shared::types::ApiResponse;

use crate::models::{Friendship, NewFriendship, Profile, PublicProfile};
use crate::realtime::{publish_to_users, RealtimeEvent};
use crate::schema::friendships;
use crate::services::friendship::{self, FriendshipStatus, RequestPlan};
use crate::services::profile_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SendRequestBody {
    pub profile_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RespondBody {
    pub accepted: bool,
}

/// A pending request together with the other party's profile.
#[derive(Debug, Serialize)]
pub struct FriendRequestView {
    #[serde(flatten)]
    pub friendship: Friendship,
    pub profile: PublicProfile,
}

fn find_friendship(conn: &mut PgConnection, id: Uuid) -> AppResult<Friendship> {
    friendships::table
        .find(id)
        .first::<Friendship>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::FriendshipNotFound, "friendship not found"))
}

fn between(conn: &mut PgConnection, requester: Uuid, recipient: Uuid) -> AppResult<Option<Friendship>> {
    Ok(friendships::table
        .filter(friendships::requester_id.eq(requester))
        .filter(friendships::recipient_id.eq(recipient))
        .first::<Friendship>(conn)
        .optional()?)
}

fn notify_both(state: &AppState, friendship: &Friendship, event: RealtimeEvent) {
    publish_to_users(&state.io, &[friendship.requester_id, friendship.recipient_id], &event);
}

// --- POST /friends/requests ---

pub async fn send_request(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendRequestBody>,
) -> AppResult<Json<ApiResponse<Friendship>>> {
    let mut conn = state.db.get()?;
    let me = profile_service::current_profile(&mut conn, user.id)?;
    let target = profile_service::find_profile(&mut conn, body.profile_id)?;

    if target.id == me.id {
        return Err(AppError::new(ErrorCode::CannotFriendSelf, "you cannot send a friend request to yourself"));
    }

    let friendship = conn.transaction::<_, AppError, _>(|conn| {
        let outgoing = between(conn, me.id, target.id)?;
        let incoming = between(conn, target.id, me.id)?;

        let row = match friendship::plan_request(outgoing.as_ref(), incoming.as_ref())? {
            RequestPlan::Create => diesel::insert_into(friendships::table)
                .values(&NewFriendship {
                    requester_id: me.id,
                    recipient_id: target.id,
                    status: FriendshipStatus::Pending.as_str().to_string(),
                })
                .get_result::<Friendship>(conn)?,
            RequestPlan::Reopen(id) => diesel::update(friendships::table.find(id))
                .set((
                    friendships::status.eq(FriendshipStatus::Pending.as_str()),
                    friendships::updated_at.eq(Utc::now()),
                ))
                .get_result::<Friendship>(conn)?,
            RequestPlan::AcceptReverse(id) => diesel::update(
                friendships::table
                    .find(id)
                    .filter(friendships::status.eq(FriendshipStatus::Pending.as_str())),
            )
            .set((
                friendships::status.eq(FriendshipStatus::Accepted.as_str()),
                friendships::updated_at.eq(Utc::now()),
            ))
            .get_result::<Friendship>(conn)?,
        };
        Ok(row)
    })?;

    notify_both(&state, &friendship, RealtimeEvent::friendship_updated(friendship.clone()));

    tracing::info!(
        friendship_id = %friendship.id,
        from = %me.id,
        to = %target.id,
        status = %friendship.status,
        "friend request sent"
    );

    Ok(Json(ApiResponse::ok(friendship)))
}

// --- PUT /friends/requests/:id ---

pub async fn respond_request(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(friendship_id): Path<Uuid>,
    Json(body): Json<RespondBody>,
) -> AppResult<Json<ApiResponse<Friendship>>> {
    let mut conn = state.db.get()?;
    let me = profile_service::current_profile(&mut conn, user.id)?;
    let existing = find_friendship(&mut conn, friendship_id)?;

    if existing.recipient_id != me.id {
        return Err(AppError::forbidden("only the recipient can respond to a friend request"));
    }

    let next = friendship::status_of(&existing)?.respond(body.accepted)?;

    // Conditional on the row still being pending; a concurrent answer wins
    let updated = diesel::update(
        friendships::table
            .find(existing.id)
            .filter(friendships::status.eq(FriendshipStatus::Pending.as_str())),
    )
    .set((
        friendships::status.eq(next.as_str()),
        friendships::updated_at.eq(Utc::now()),
    ))
    .get_result::<Friendship>(&mut conn)
    .optional()?
    .ok_or_else(|| AppError::new(ErrorCode::FriendshipNotPending, "friend request was already answered"))?;

    notify_both(&state, &updated, RealtimeEvent::friendship_updated(updated.clone()));

    tracing::info!(friendship_id = %updated.id, status = %updated.status, "friend request answered");

    Ok(Json(ApiResponse::ok(updated)))
}

// --- DELETE /friends/:id ---

pub async fn remove_friend(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(friendship_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    let mut conn = state.db.get()?;
    let me = profile_service::current_profile(&mut conn, user.id)?;
    let existing = find_friendship(&mut conn, friendship_id)?;

    if friendship::other_party(&existing, me.id).is_none() {
        return Err(AppError::forbidden("not part of this friendship"));
    }

    diesel::delete(friendships::table.find(existing.id)).execute(&mut conn)?;

    notify_both(&state, &existing, RealtimeEvent::friendship_removed(existing.id));

    tracing::info!(friendship_id = %existing.id, by = %me.id, "friendship removed");

    Ok(Json(ApiResponse::ok("friendship removed")))
}

// --- GET /friends ---

pub async fn list_friends(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<PublicProfile>>>> {
    let friends = {
        let mut conn = state.db.get()?;
        let me = profile_service::current_profile(&mut conn, user.id)?;
        let ids = profile_service::accepted_friend_ids(&mut conn, me.id)?;
        profile_service::load_ordered(&mut conn, &ids)?
    };

    let views = profile_service::with_presence(&state.redis, friends).await;
    Ok(Json(ApiResponse::ok(views)))
}

// --- GET /friends/requests/incoming, /friends/requests/outgoing ---

#[derive(Debug, Clone, Copy)]
enum Direction {
    Incoming,
    Outgoing,
}

async fn pending_requests(
    state: &AppState,
    user: AuthUser,
    direction: Direction,
) -> AppResult<Vec<FriendRequestView>> {
    let (rows, others): (Vec<Friendship>, Vec<Profile>) = {
        let mut conn = state.db.get()?;
        let me = profile_service::current_profile(&mut conn, user.id)?;

        let query = friendships::table
            .filter(friendships::status.eq(FriendshipStatus::Pending.as_str()))
            .order(friendships::created_at.desc())
            .into_boxed();
        let query = match direction {
            Direction::Incoming => query.filter(friendships::recipient_id.eq(me.id)),
            Direction::Outgoing => query.filter(friendships::requester_id.eq(me.id)),
        };
        let rows = query.load::<Friendship>(&mut conn)?;

        let other_ids: Vec<Uuid> = rows
            .iter()
            .filter_map(|f| friendship::other_party(f, me.id))
            .collect();
        let others = profile_service::load_ordered(&mut conn, &other_ids)?;
        (rows, others)
    };

    let profiles = profile_service::with_presence(&state.redis, others).await;

    Ok(rows
        .into_iter()
        .filter_map(|friendship| {
            let other = match direction {
                Direction::Incoming => friendship.requester_id,
                Direction::Outgoing => friendship.recipient_id,
            };
            let profile = profiles.iter().find(|p| p.id == other)?.clone();
            Some(FriendRequestView { friendship, profile })
        })
        .collect())
}

pub async fn list_incoming(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<FriendRequestView>>>> {
    Ok(Json(ApiResponse::ok(pending_requests(&state, user, Direction::Incoming).await?)))
}

pub async fn list_outgoing(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<FriendRequestView>>>> {
    Ok(Json(ApiResponse::ok(pending_requests(&state, user, Direction::Outgoing).await?)))
}
