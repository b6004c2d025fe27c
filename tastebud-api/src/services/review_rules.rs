use tastebud_shared::errors::{AppError, ErrorCode};

use super::rating::{MAX_RATING, MIN_RATING};

pub const MAX_COMMENT_CHARS: usize = 2000;

/// A review that passed client-facing validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidReview {
    pub rating: i16,
    pub comment: String,
}

/// Rating must be present and in range; comment must be non-blank.
pub fn validate_review(rating: Option<i16>, comment: Option<&str>) -> Result<ValidReview, AppError> {
    let rating = rating.ok_or_else(|| AppError::new(ErrorCode::InvalidRating, "a rating is required"))?;
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::new(
            ErrorCode::InvalidRating,
            format!("rating must be between {MIN_RATING} and {MAX_RATING}"),
        ));
    }

    let comment = comment.map(str::trim).unwrap_or_default();
    if comment.is_empty() {
        return Err(AppError::new(ErrorCode::EmptyComment, "a comment is required"));
    }
    if comment.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            format!("comment must be at most {MAX_COMMENT_CHARS} characters"),
        ));
    }

    Ok(ValidReview {
        rating,
        comment: comment.to_string(),
    })
}

/// Parses the multipart `rating` field; a blank field counts as missing.
pub fn parse_rating(raw: &str) -> Result<Option<i16>, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i16>()
        .map(Some)
        .map_err(|_| AppError::new(ErrorCode::InvalidRating, "rating must be a whole number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rating_is_rejected() {
        let err = validate_review(None, Some("great dumplings")).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidRating);
    }

    #[test]
    fn out_of_range_rating_is_rejected() {
        for rating in [0, 6, -1] {
            let err = validate_review(Some(rating), Some("ok")).unwrap_err();
            assert_eq!(err.error_code(), ErrorCode::InvalidRating, "{rating}");
        }
    }

    #[test]
    fn blank_comment_is_rejected() {
        for comment in [None, Some(""), Some("   \n\t")] {
            let err = validate_review(Some(4), comment).unwrap_err();
            assert_eq!(err.error_code(), ErrorCode::EmptyComment);
        }
    }

    #[test]
    fn overlong_comment_is_rejected() {
        let comment = "a".repeat(MAX_COMMENT_CHARS + 1);
        let err = validate_review(Some(3), Some(&comment)).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ValidationError);
    }

    #[test]
    fn valid_review_is_trimmed() {
        let review = validate_review(Some(5), Some("  best ramen in town  ")).unwrap();
        assert_eq!(review, ValidReview { rating: 5, comment: "best ramen in town".into() });
    }

    #[test]
    fn rating_field_parsing() {
        assert_eq!(parse_rating(" 4 ").unwrap(), Some(4));
        assert_eq!(parse_rating("").unwrap(), None);
        assert!(parse_rating("four").is_err());
    }
}
