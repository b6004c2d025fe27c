pub mod events;
pub mod handlers;

pub use events::{publish_to_restaurant, publish_to_user, publish_to_users, RealtimeEvent};
