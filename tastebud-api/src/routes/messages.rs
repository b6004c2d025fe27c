use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use tastebud_shared::errors::{AppError, AppResult, ErrorCode};
use tastebud_shared::types::auth::AuthUser;
use tastebud_shared::types::ApiResponse;

use crate::models::{Message, NewMessage, PublicProfile};
use crate::realtime::{publish_to_users, RealtimeEvent};
use crate::schema::messages;
use crate::services::{conversation, profile_service};
use crate::AppState;

use super::within_rate_limit;

const MESSAGE_WINDOW_SECS: u64 = 60;
const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 100;

#[derive(Debug, Serialize)]
pub struct ContactView {
    pub profile: PublicProfile,
    pub last_message: Message,
}

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl ConversationQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
    }
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

// --- GET /messages/contacts ---

pub async fn list_contacts(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<ContactView>>>> {
    let (latest, partners) = {
        let mut conn = state.db.get()?;
        let me = profile_service::current_profile(&mut conn, user.id)?;

        let mine = messages::table
            .filter(messages::sender_id.eq(me.id).or(messages::receiver_id.eq(me.id)))
            .order(messages::created_at.desc())
            .load::<Message>(&mut conn)?;

        let latest = conversation::latest_per_partner(me.id, mine);
        let partner_ids: Vec<Uuid> = latest.iter().map(|(id, _)| *id).collect();
        let partners = profile_service::load_ordered(&mut conn, &partner_ids)?;
        (latest, partners)
    };

    let profiles = profile_service::with_presence(&state.redis, partners).await;

    let contacts = latest
        .into_iter()
        .filter_map(|(partner_id, last_message)| {
            let profile = profiles.iter().find(|p| p.id == partner_id)?.clone();
            Some(ContactView { profile, last_message })
        })
        .collect();

    Ok(Json(ApiResponse::ok(contacts)))
}

// --- GET /messages/:partner_id ---

pub async fn get_conversation(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(partner_id): Path<Uuid>,
    Query(query): Query<ConversationQuery>,
) -> AppResult<Json<ApiResponse<Vec<Message>>>> {
    let mut conn = state.db.get()?;
    let me = profile_service::current_profile(&mut conn, user.id)?;
    let partner = profile_service::find_profile(&mut conn, partner_id)?;

    let mut page = messages::table
        .filter(
            messages::sender_id
                .eq(me.id)
                .and(messages::receiver_id.eq(partner.id))
                .or(messages::sender_id.eq(partner.id).and(messages::receiver_id.eq(me.id))),
        )
        .into_boxed();
    if let Some(before) = query.before {
        page = page.filter(messages::created_at.lt(before));
    }

    let mut items = page
        .order(messages::created_at.desc())
        .limit(query.limit())
        .load::<Message>(&mut conn)?;
    // Fetched newest first so `limit` keeps the latest; shown oldest first
    items.reverse();

    Ok(Json(ApiResponse::ok(items)))
}

// --- POST /messages/:partner_id ---

pub async fn send_message(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(partner_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<ApiResponse<Message>>> {
    let content = conversation::validate_content(&req.content)?;

    let (me, partner) = {
        let mut conn = state.db.get()?;
        let me = profile_service::current_profile(&mut conn, user.id)?;
        let partner = profile_service::find_profile(&mut conn, partner_id)?;
        (me, partner)
    };

    if partner.id == me.id {
        return Err(AppError::new(ErrorCode::CannotMessageSelf, "you cannot message yourself"));
    }

    within_rate_limit(&state, "messages", me.id, state.config.message_rate_limit, MESSAGE_WINDOW_SECS).await?;

    let mut conn = state.db.get()?;
    let message: Message = diesel::insert_into(messages::table)
        .values(&NewMessage {
            sender_id: me.id,
            receiver_id: partner.id,
            content,
        })
        .get_result(&mut conn)?;

    publish_to_users(&state.io, &[me.id, partner.id], &RealtimeEvent::MessageNew(message.clone()));

    tracing::info!(message_id = %message.id, sender_id = %me.id, receiver_id = %partner.id, "message sent");

    Ok(Json(ApiResponse::ok(message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_limit_defaults_and_clamps() {
        let q = |limit| ConversationQuery { before: None, limit };
        assert_eq!(q(None).limit(), DEFAULT_PAGE);
        assert_eq!(q(Some(0)).limit(), 1);
        assert_eq!(q(Some(10_000)).limit(), MAX_PAGE);
    }

    #[test]
    fn before_cursor_parses_rfc3339() {
        let q: ConversationQuery =
            serde_json::from_value(serde_json::json!({ "before": "2024-06-01T12:00:00Z" })).unwrap();
        assert_eq!(q.before.unwrap().to_rfc3339(), "2024-06-01T12:00:00+00:00");
    }
}
