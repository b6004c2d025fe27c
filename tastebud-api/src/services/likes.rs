use serde::Serialize;

/// Result of toggling a like, as returned to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeToggle {
    pub liked: bool,
    pub like_count: i64,
}

impl LikeToggle {
    /// The caller's new like state with the count read back after the write.
    pub fn settled(liked: bool, like_count: i64) -> Self {
        Self { liked, like_count: like_count.max(0) }
    }
}

/// What a like targets; used in realtime payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeTarget {
    Restaurant,
    Review,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_reports_the_recounted_total() {
        assert_eq!(LikeToggle::settled(true, 8), LikeToggle { liked: true, like_count: 8 });
    }

    #[test]
    fn unlike_reports_the_recounted_total() {
        assert_eq!(LikeToggle::settled(false, 7), LikeToggle { liked: false, like_count: 7 });
    }

    #[test]
    fn concurrent_likes_are_not_collapsed() {
        // Two callers start from 5 likes; the second commits after the first.
        let first = LikeToggle::settled(true, 6);
        let second = LikeToggle::settled(true, 7);
        assert_eq!(second.like_count, first.like_count + 1);
    }

    #[test]
    fn count_never_goes_negative() {
        assert_eq!(LikeToggle::settled(false, -1).like_count, 0);
    }

    #[test]
    fn like_target_serializes_lowercase() {
        assert_eq!(serde_json::to_value(LikeTarget::Review).unwrap(), serde_json::json!("review"));
    }
}
