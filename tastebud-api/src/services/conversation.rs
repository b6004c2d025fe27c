use std::collections::HashMap;

use uuid::Uuid;

use tastebud_shared::errors::{AppError, ErrorCode};

use crate::models::Message;

pub const MAX_MESSAGE_CHARS: usize = 4000;

pub fn validate_content(content: &str) -> Result<String, AppError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::new(ErrorCode::EmptyMessage, "message cannot be empty"));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            format!("message must be at most {MAX_MESSAGE_CHARS} characters"),
        ));
    }
    Ok(content.to_string())
}

pub fn partner_of(message: &Message, me: Uuid) -> Uuid {
    if message.sender_id == me {
        message.receiver_id
    } else {
        message.sender_id
    }
}

/// Latest message per conversation partner, newest conversation first.
pub fn latest_per_partner(me: Uuid, messages: Vec<Message>) -> Vec<(Uuid, Message)> {
    let mut latest: HashMap<Uuid, Message> = HashMap::new();
    for message in messages {
        let partner = partner_of(&message, me);
        match latest.get(&partner) {
            Some(existing) if existing.created_at >= message.created_at => {}
            _ => {
                latest.insert(partner, message);
            }
        }
    }

    let mut contacts: Vec<(Uuid, Message)> = latest.into_iter().collect();
    contacts.sort_by(|(_, a), (_, b)| b.created_at.cmp(&a.created_at));
    contacts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn msg(from: Uuid, to: Uuid, minutes_ago: i64, content: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: from,
            receiver_id: to,
            content: content.into(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn content_is_trimmed_and_required() {
        assert_eq!(validate_content("  hi there ").unwrap(), "hi there");
        assert_eq!(validate_content(" \n ").unwrap_err().error_code(), ErrorCode::EmptyMessage);
        assert!(validate_content(&"x".repeat(MAX_MESSAGE_CHARS + 1)).is_err());
    }

    #[test]
    fn partner_is_the_other_participant() {
        let (me, them) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(partner_of(&msg(me, them, 0, "a"), me), them);
        assert_eq!(partner_of(&msg(them, me, 0, "b"), me), them);
    }

    #[test]
    fn one_entry_per_partner_with_latest_message() {
        let (me, alice, bob) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let messages = vec![
            msg(me, alice, 30, "lunch?"),
            msg(alice, me, 20, "sure"),
            msg(bob, me, 25, "try the pho place"),
            msg(me, alice, 40, "hey"),
        ];

        let contacts = latest_per_partner(me, messages);

        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].0, alice);
        assert_eq!(contacts[0].1.content, "sure");
        assert_eq!(contacts[1].0, bob);
    }

    #[test]
    fn no_messages_no_contacts() {
        assert!(latest_per_partner(Uuid::new_v4(), Vec::new()).is_empty());
    }
}
