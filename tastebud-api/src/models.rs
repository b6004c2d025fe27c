use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{
    credentials, friendships, menu_items, messages, posts, profiles, refresh_tokens,
    restaurant_likes, restaurants, review_likes, reviews,
};

// --- Credentials ---

#[derive(Debug, Queryable, Identifiable, Serialize)]
#[diesel(table_name = credentials)]
pub struct Credential {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = credentials)]
pub struct NewCredential {
    pub email: String,
    pub password_hash: String,
}

// --- Refresh Tokens ---

#[derive(Debug, Queryable, Identifiable)]
#[diesel(table_name = refresh_tokens)]
pub struct RefreshToken {
    pub id: Uuid,
    pub credential_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub credential_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

// --- Profile ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub credential_id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub email: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = profiles)]
pub struct NewProfile {
    pub credential_id: Uuid,
    pub username: String,
    pub email: String,
}

#[derive(Debug, AsChangeset, Deserialize, Default)]
#[diesel(table_name = profiles)]
pub struct UpdateProfile {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

impl UpdateProfile {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.bio.is_none()
            && self.location.is_none()
            && self.date_of_birth.is_none()
    }
}

/// Profile as shown to other users: no email, optional presence.
#[derive(Debug, Serialize, Clone)]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub is_online: bool,
}

impl From<Profile> for PublicProfile {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            username: p.username,
            avatar_url: p.avatar_url,
            bio: p.bio,
            location: p.location,
            is_online: false,
        }
    }
}

// --- Restaurant ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = restaurants)]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub cuisine: String,
    pub address: String,
    pub image_url: Option<String>,
    pub price_range: i16,
    pub created_at: DateTime<Utc>,
}

// --- Menu ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = menu_items)]
pub struct MenuItem {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub created_by: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i32,
    pub category: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = menu_items)]
pub struct NewMenuItem {
    pub restaurant_id: Uuid,
    pub created_by: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i32,
    pub category: String,
    pub image_url: Option<String>,
}

// --- Review ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = reviews)]
pub struct Review {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub author_id: Uuid,
    pub rating: i16,
    pub comment: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = reviews)]
pub struct NewReview {
    pub restaurant_id: Uuid,
    pub author_id: Uuid,
    pub rating: i16,
    pub comment: String,
    pub image_url: Option<String>,
}

// --- Likes ---

#[derive(Debug, Insertable)]
#[diesel(table_name = restaurant_likes)]
pub struct NewRestaurantLike {
    pub profile_id: Uuid,
    pub restaurant_id: Uuid,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = review_likes)]
pub struct NewReviewLike {
    pub profile_id: Uuid,
    pub review_id: Uuid,
}

// --- Friendship ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = friendships)]
pub struct Friendship {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub recipient_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = friendships)]
pub struct NewFriendship {
    pub requester_id: Uuid,
    pub recipient_id: Uuid,
    pub status: String,
}

// --- Message ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone, PartialEq)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
}

// --- Post ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = posts)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub media_url: String,
    pub media_kind: String,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = posts)]
pub struct NewPost {
    pub author_id: Uuid,
    pub media_url: String,
    pub media_kind: String,
    pub caption: Option<String>,
}
