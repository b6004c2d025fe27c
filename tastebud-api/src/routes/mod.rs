pub mod auth;
pub mod friends;
pub mod health;
pub mod likes;
pub mod menu;
pub mod messages;
pub mod posts;
pub mod profiles;
pub mod restaurants;
pub mod reviews;

mod upload;

use tastebud_shared::errors::{AppError, ErrorCode};

/// Rate limiting fails open when Redis is unreachable.
pub(crate) async fn within_rate_limit(
    state: &crate::AppState,
    scope: &str,
    profile_id: uuid::Uuid,
    limit: u64,
    window_secs: u64,
) -> Result<(), AppError> {
    let key = tastebud_shared::clients::redis::rate_limit_key(scope, profile_id);
    match state.redis.rate_limit_check(&key, limit, window_secs).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(AppError::new(
            ErrorCode::RateLimited,
            format!("too many {scope}, try again later"),
        )),
        Err(e) => {
            log_redis_error(scope, &e);
            Ok(())
        }
    }
}

fn log_redis_error(scope: &str, e: &redis::RedisError) {
    tracing::warn!(scope = %scope, error = %e, "rate limit check skipped, redis unavailable");
}
