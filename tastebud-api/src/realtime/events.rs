use serde::Serialize;
use socketioxide::SocketIo;
use uuid::Uuid;

use crate::models::{Friendship, Message};
use crate::services::likes::LikeTarget;

pub fn user_room(profile_id: Uuid) -> String {
    format!("user:{profile_id}")
}

pub fn restaurant_room(restaurant_id: Uuid) -> String {
    format!("restaurant:{restaurant_id}")
}

/// A review as pushed to restaurant subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewDelta {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub author_avatar_url: Option<String>,
    pub rating: i16,
    pub comment: String,
    pub image_url: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One change, pushed to the rooms it affects. Clients patch their local
/// state with the payload instead of refetching.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RealtimeEvent {
    MessageNew(Message),
    FriendshipChanged {
        friendship: Option<Friendship>,
        friendship_id: Uuid,
        removed: bool,
    },
    ReviewCreated {
        review: ReviewDelta,
        average_rating: Option<f64>,
        review_count: u32,
    },
    ReviewDeleted {
        review_id: Uuid,
        restaurant_id: Uuid,
        average_rating: Option<f64>,
        review_count: u32,
    },
    LikeChanged {
        target: LikeTarget,
        target_id: Uuid,
        like_count: i64,
    },
    UserOnline { profile_id: Uuid },
    UserOffline { profile_id: Uuid },
}

impl RealtimeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageNew(_) => "message:new",
            Self::FriendshipChanged { .. } => "friendship:changed",
            Self::ReviewCreated { .. } => "review:created",
            Self::ReviewDeleted { .. } => "review:deleted",
            Self::LikeChanged { .. } => "like:changed",
            Self::UserOnline { .. } => "user-online",
            Self::UserOffline { .. } => "user-offline",
        }
    }

    pub fn friendship_updated(friendship: Friendship) -> Self {
        Self::FriendshipChanged {
            friendship_id: friendship.id,
            friendship: Some(friendship),
            removed: false,
        }
    }

    pub fn friendship_removed(friendship_id: Uuid) -> Self {
        Self::FriendshipChanged { friendship: None, friendship_id, removed: true }
    }
}

// Pushes are fire-and-forget: a failed emit is logged and otherwise ignored.
fn emit(io: &SocketIo, room: String, event: &RealtimeEvent) {
    if let Err(e) = io.to(room.clone()).emit(event.name(), event) {
        tracing::warn!(room = %room, event = event.name(), error = %e, "realtime emit failed");
    }
}

pub fn publish_to_user(io: &SocketIo, profile_id: Uuid, event: &RealtimeEvent) {
    emit(io, user_room(profile_id), event);
}

pub fn publish_to_users(io: &SocketIo, profile_ids: &[Uuid], event: &RealtimeEvent) {
    for id in profile_ids {
        publish_to_user(io, *id, event);
    }
}

pub fn publish_to_restaurant(io: &SocketIo, restaurant_id: Uuid, event: &RealtimeEvent) {
    emit(io, restaurant_room(restaurant_id), event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn room_names() {
        let id = Uuid::nil();
        assert_eq!(user_room(id), "user:00000000-0000-0000-0000-000000000000");
        assert_eq!(restaurant_room(id), "restaurant:00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn event_names_match_the_client_contract() {
        let id = Uuid::new_v4();
        assert_eq!(RealtimeEvent::UserOnline { profile_id: id }.name(), "user-online");
        assert_eq!(RealtimeEvent::UserOffline { profile_id: id }.name(), "user-offline");
        assert_eq!(RealtimeEvent::friendship_removed(id).name(), "friendship:changed");
        let like = RealtimeEvent::LikeChanged { target: LikeTarget::Review, target_id: id, like_count: 2 };
        assert_eq!(like.name(), "like:changed");
    }

    #[test]
    fn message_payload_is_the_row_itself() {
        let message = Message {
            id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            content: "see you at 7".into(),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(RealtimeEvent::MessageNew(message.clone())).unwrap();
        assert_eq!(value["id"], json!(message.id));
        assert_eq!(value["content"], "see you at 7");
    }

    #[test]
    fn like_payload_carries_target_and_count() {
        let id = Uuid::new_v4();
        let value = serde_json::to_value(RealtimeEvent::LikeChanged {
            target: LikeTarget::Restaurant,
            target_id: id,
            like_count: 12,
        })
        .unwrap();
        assert_eq!(value, json!({ "target": "restaurant", "target_id": id, "like_count": 12 }));
    }

    #[test]
    fn removed_friendship_has_no_row() {
        let id = Uuid::new_v4();
        let value = serde_json::to_value(RealtimeEvent::friendship_removed(id)).unwrap();
        assert_eq!(value["friendship"], serde_json::Value::Null);
        assert_eq!(value["removed"], true);
    }
}
