use std::sync::Arc;

use serde::{Deserialize, Serialize};
use socketioxide::extract::{Data, SocketRef};
use uuid::Uuid;

use tastebud_shared::errors::AppError;
use tastebud_shared::middleware::{decode_access_token, jwt_secret};

use crate::services::profile_service;
use crate::AppState;

use super::events::{publish_to_users, restaurant_room, user_room, RealtimeEvent};

/// Profile bound to a socket at connect time.
#[derive(Debug, Clone, Copy)]
struct SessionProfile(Uuid);

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RestaurantSubscription {
    pub restaurant_id: Uuid,
}

fn session_profile(socket: &SocketRef) -> Option<Uuid> {
    socket.extensions.get::<SessionProfile>().map(|p| p.0)
}

pub async fn on_connect_with_state(socket: SocketRef, state: Arc<AppState>) {
    let profile_id = match authenticate_socket(&socket, &state) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, sid = %socket.id, "socket auth failed");
            let _ = socket.emit(
                "error",
                &ErrorPayload {
                    code: e.error_code().code().into(),
                    message: e.to_string(),
                },
            );
            socket.disconnect().ok();
            return;
        }
    };

    socket.extensions.insert(SessionProfile(profile_id));
    socket.join(user_room(profile_id)).ok();

    tracing::info!(profile_id = %profile_id, sid = %socket.id, "socket connected");

    let open_sockets = match state.redis.open_socket(profile_id).await {
        Ok(open) => Some(open),
        Err(e) => {
            tracing::warn!(profile_id = %profile_id, error = %e, "failed to set presence");
            None
        }
    };

    if came_online(open_sockets) {
        let presence_state = state.clone();
        tokio::spawn(async move {
            notify_friends(&presence_state, profile_id, RealtimeEvent::UserOnline { profile_id });
        });
    }

    let _ = socket.emit("connected", &serde_json::json!({ "profile_id": profile_id }));

    socket.on("heartbeat", {
        let state = state.clone();
        move |socket: SocketRef| {
            let state = state.clone();
            async move {
                if let Some(profile_id) = session_profile(&socket) {
                    if let Err(e) = state.redis.refresh_presence(profile_id).await {
                        tracing::debug!(profile_id = %profile_id, error = %e, "heartbeat presence refresh failed");
                    }
                }
            }
        }
    });

    socket.on(
        "restaurant:subscribe",
        |socket: SocketRef, Data::<RestaurantSubscription>(sub)| async move {
            socket.join(restaurant_room(sub.restaurant_id)).ok();
            tracing::debug!(sid = %socket.id, restaurant_id = %sub.restaurant_id, "subscribed to restaurant");
        },
    );

    socket.on(
        "restaurant:unsubscribe",
        |socket: SocketRef, Data::<RestaurantSubscription>(sub)| async move {
            socket.leave(restaurant_room(sub.restaurant_id)).ok();
        },
    );

    socket.on_disconnect({
        let state = state.clone();
        move |socket: SocketRef| {
            let state = state.clone();
            async move {
                on_disconnect_with_state(socket, state).await;
            }
        }
    });
}

async fn on_disconnect_with_state(socket: SocketRef, state: Arc<AppState>) {
    let Some(profile_id) = session_profile(&socket) else {
        return;
    };

    tracing::info!(profile_id = %profile_id, sid = %socket.id, "socket disconnected");

    let remaining = match state.redis.close_socket(profile_id).await {
        Ok(remaining) => Some(remaining),
        Err(e) => {
            tracing::warn!(profile_id = %profile_id, error = %e, "failed to clear presence");
            None
        }
    };

    if went_offline(remaining) {
        tokio::spawn(async move {
            notify_friends(&state, profile_id, RealtimeEvent::UserOffline { profile_id });
        });
    }
}

/// Friends hear `user-online` for the first socket only. An unknown count is
/// announced.
fn came_online(open_sockets: Option<i64>) -> bool {
    open_sockets.map_or(true, |open| open <= 1)
}

/// Friends hear `user-offline` once no socket of the profile remains.
fn went_offline(remaining: Option<i64>) -> bool {
    remaining.map_or(true, |left| left <= 0)
}

fn notify_friends(state: &AppState, profile_id: Uuid, event: RealtimeEvent) {
    let friends = state
        .db
        .get()
        .map_err(AppError::from)
        .and_then(|mut conn| profile_service::accepted_friend_ids(&mut conn, profile_id));

    match friends {
        Ok(ids) => publish_to_users(&state.io, &ids, &event),
        Err(e) => tracing::warn!(profile_id = %profile_id, error = %e, "failed to load friends for presence"),
    }
}

fn authenticate_socket(socket: &SocketRef, state: &AppState) -> Result<Uuid, AppError> {
    let parts = socket.req_parts();
    let token = token_from_query(parts.uri.query().unwrap_or_default())
        .ok_or_else(|| AppError::unauthorized("missing token query parameter"))?;

    let claims = decode_access_token(&token, &jwt_secret())?;
    let mut conn = state.db.get()?;
    let profile = profile_service::current_profile(&mut conn, claims.sub)?;
    Ok(profile.id)
}

/// Reads `token` out of a raw query string.
pub fn token_from_query(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "token" && !value.is_empty()).then(|| value.to_string())
    })
}
