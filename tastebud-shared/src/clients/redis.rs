use redis::aio::ConnectionManager;
use uuid::Uuid;

/// Presence TTL; clients refresh it with a socket heartbeat.
pub const PRESENCE_TTL_SECS: u64 = 120;

const CLOSE_SOCKET_SCRIPT: &str = r"
local open = redis.call('DECR', KEYS[1])
if open <= 0 then
    redis.call('DEL', KEYS[1])
end
return open
";

pub fn presence_key(profile_id: Uuid) -> String {
    format!("online:{profile_id}")
}

pub fn rate_limit_key(scope: &str, profile_id: Uuid) -> String {
    format!("rl:{scope}:{profile_id}")
}

/// `SET NX EX` opens the window only for the first hit; `INCR` keeps its TTL.
fn rate_limit_pipeline(key: &str, window_secs: u64) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET").arg(key).arg(0).arg("EX").arg(window_secs).arg("NX").ignore()
        .incr(key, 1u64);
    pipe
}

fn open_socket_pipeline(key: &str) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .incr(key, 1i64)
        .expire(key, PRESENCE_TTL_SECS as i64).ignore();
    pipe
}

#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!(url = %url, "connected to Redis");
        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    pub async fn exists_multi(&self, keys: &[String]) -> Result<Vec<bool>, redis::RedisError> {
        if keys.is_empty() {
            return Ok(vec![]);
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.exists(key.as_str());
        }
        pipe.query_async(&mut conn).await
    }

    /// Fixed-window counter. Returns `true` while the caller is within `limit`.
    /// The window is opened and counted in one transaction, so a counter can
    /// never outlive its window.
    pub async fn rate_limit_check(
        &self,
        key: &str,
        limit: u64,
        window_secs: u64,
    ) -> Result<bool, redis::RedisError> {
        let mut conn = self.conn.clone();
        let (count,): (u64,) = rate_limit_pipeline(key, window_secs).query_async(&mut conn).await?;
        Ok(count <= limit)
    }

    /// Counts one more open socket for `profile_id` and returns the total.
    pub async fn open_socket(&self, profile_id: Uuid) -> Result<i64, redis::RedisError> {
        let mut conn = self.conn.clone();
        let (open,): (i64,) = open_socket_pipeline(&presence_key(profile_id)).query_async(&mut conn).await?;
        Ok(open)
    }

    /// Extends presence; recreates it if it lapsed while the socket stayed open.
    pub async fn refresh_presence(&self, profile_id: Uuid) -> Result<(), redis::RedisError> {
        let key = presence_key(profile_id);
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .cmd("SET").arg(&key).arg(1).arg("EX").arg(PRESENCE_TTL_SECS).arg("NX").ignore()
            .expire(&key, PRESENCE_TTL_SECS as i64).ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Counts one socket closed and returns how many remain. The key is removed
    /// with the last one.
    pub async fn close_socket(&self, profile_id: Uuid) -> Result<i64, redis::RedisError> {
        let script = redis::Script::new(CLOSE_SOCKET_SCRIPT);
        let mut conn = self.conn.clone();
        let remaining: i64 = script
            .key(presence_key(profile_id))
            .invoke_async(&mut conn)
            .await?;
        Ok(remaining)
    }

    /// Online flags for `profile_ids`, in the same order.
    pub async fn online_flags(&self, profile_ids: &[Uuid]) -> Result<Vec<bool>, redis::RedisError> {
        let keys: Vec<String> = profile_ids.iter().copied().map(presence_key).collect();
        self.exists_multi(&keys).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        let id = Uuid::nil();
        assert_eq!(presence_key(id), "online:00000000-0000-0000-0000-000000000000");
        assert_eq!(
            rate_limit_key("reviews", id),
            "rl:reviews:00000000-0000-0000-0000-000000000000"
        );
    }

    fn packed(pipe: &redis::Pipeline) -> String {
        String::from_utf8_lossy(&pipe.get_packed_pipeline()).into_owned()
    }

    fn position(haystack: &str, needle: &str) -> usize {
        haystack.find(needle).unwrap_or_else(|| panic!("{needle} missing from {haystack:?}"))
    }

    #[test]
    fn rate_limit_window_and_count_share_a_transaction() {
        let wire = packed(&rate_limit_pipeline("rl:messages:x", 60));
        let multi = position(&wire, "MULTI");
        let set = position(&wire, "SET");
        let nx = position(&wire, "NX");
        let incr = position(&wire, "INCR");
        let exec = position(&wire, "EXEC");
        assert!(multi < set && set < nx && nx < incr && incr < exec);
        assert!(wire.contains("\r\n60\r\n"));
    }

    #[test]
    fn opening_a_socket_counts_and_refreshes_ttl_atomically() {
        let wire = packed(&open_socket_pipeline("online:x"));
        let multi = position(&wire, "MULTI");
        let incr = position(&wire, "INCR");
        let expire = position(&wire, "EXPIRE");
        let exec = position(&wire, "EXEC");
        assert!(multi < incr && incr < expire && expire < exec);
        assert!(wire.contains(&PRESENCE_TTL_SECS.to_string()));
    }
}
