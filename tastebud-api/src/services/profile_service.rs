use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use tastebud_shared::clients::redis::RedisClient;
use tastebud_shared::errors::{AppError, AppResult, ErrorCode};
use tastebud_shared::middleware::OptionalAuthUser;

use crate::models::{Profile, PublicProfile};
use crate::schema::{friendships, profiles};

use super::friendship::FriendshipStatus;

/// The caller's own profile, keyed by the credential in their token.
pub fn current_profile(conn: &mut PgConnection, credential_id: Uuid) -> AppResult<Profile> {
    profiles::table
        .filter(profiles::credential_id.eq(credential_id))
        .first::<Profile>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))
}

/// Profile id of an optional caller. A signed-in credential without a profile
/// browses anonymously; any other failure is returned.
pub fn viewer_id(conn: &mut PgConnection, user: &OptionalAuthUser) -> AppResult<Option<Uuid>> {
    match user.0.as_ref() {
        Some(user) => anonymous_if_missing(current_profile(conn, user.id)),
        None => Ok(None),
    }
}

fn anonymous_if_missing(lookup: AppResult<Profile>) -> AppResult<Option<Uuid>> {
    match lookup {
        Ok(profile) => Ok(Some(profile.id)),
        Err(e) if e.error_code() == ErrorCode::ProfileNotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Accepts either a profile id or a credential id.
pub fn find_profile(conn: &mut PgConnection, id: Uuid) -> AppResult<Profile> {
    profiles::table
        .filter(profiles::id.eq(id).or(profiles::credential_id.eq(id)))
        .first::<Profile>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))
}

pub fn username_taken(conn: &mut PgConnection, username: &str, except: Option<Uuid>) -> AppResult<bool> {
    let mut query = profiles::table
        .filter(profiles::username.ilike(escape_like(username)))
        .into_boxed();
    if let Some(id) = except {
        query = query.filter(profiles::id.ne(id));
    }
    let count: i64 = query.count().get_result(conn)?;
    Ok(count > 0)
}

/// Profile ids of everyone with an accepted friendship with `profile_id`.
pub fn accepted_friend_ids(conn: &mut PgConnection, profile_id: Uuid) -> AppResult<Vec<Uuid>> {
    let rows: Vec<(Uuid, Uuid)> = friendships::table
        .filter(friendships::status.eq(FriendshipStatus::Accepted.as_str()))
        .filter(
            friendships::requester_id
                .eq(profile_id)
                .or(friendships::recipient_id.eq(profile_id)),
        )
        .order(friendships::updated_at.desc())
        .select((friendships::requester_id, friendships::recipient_id))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(requester, recipient)| if requester == profile_id { recipient } else { requester })
        .collect())
}

/// Loads profiles by id, preserving the order of `ids`.
pub fn load_ordered(conn: &mut PgConnection, ids: &[Uuid]) -> AppResult<Vec<Profile>> {
    let mut loaded = profiles::table
        .filter(profiles::id.eq_any(ids))
        .load::<Profile>(conn)?;

    let position: std::collections::HashMap<Uuid, usize> =
        ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    loaded.sort_by_key(|p| position.get(&p.id).copied().unwrap_or(usize::MAX));
    Ok(loaded)
}

/// Public view with `is_online` from Redis. Presence is best effort.
pub async fn with_presence(redis: &RedisClient, profiles: Vec<Profile>) -> Vec<PublicProfile> {
    let ids: Vec<Uuid> = profiles.iter().map(|p| p.id).collect();
    let flags = match redis.online_flags(&ids).await {
        Ok(flags) => flags,
        Err(e) => {
            tracing::warn!(error = %e, "presence lookup failed");
            vec![false; ids.len()]
        }
    };

    profiles
        .into_iter()
        .zip(flags.into_iter().chain(std::iter::repeat(false)))
        .map(|(profile, online)| PublicProfile {
            is_online: online,
            ..PublicProfile::from(profile)
        })
        .collect()
}

/// Escapes `%`, `_` and `\` so user input is matched literally by ILIKE.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn contains_pattern(input: &str) -> String {
    format!("%{}%", escape_like(input.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile() -> Profile {
        Profile {
            id: Uuid::new_v4(),
            credential_id: Uuid::new_v4(),
            username: "ana".into(),
            email: "ana@example.com".into(),
            avatar_url: None,
            bio: None,
            location: None,
            date_of_birth: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn viewer_with_profile_is_identified() {
        let p = profile();
        assert_eq!(anonymous_if_missing(Ok(p.clone())).unwrap(), Some(p.id));
    }

    #[test]
    fn viewer_without_profile_is_anonymous() {
        let missing = Err(AppError::new(ErrorCode::ProfileNotFound, "profile not found"));
        assert_eq!(anonymous_if_missing(missing).unwrap(), None);
    }

    #[test]
    fn viewer_lookup_failure_is_propagated() {
        let failed = Err(AppError::internal("connection reset"));
        let err = anonymous_if_missing(failed).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InternalError);
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("my_name"), "my\\_name");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }

    #[test]
    fn contains_pattern_wraps_trimmed_input() {
        assert_eq!(contains_pattern("  chef "), "%chef%");
    }
}
