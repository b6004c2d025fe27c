use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth errors
/// - E2xxx: Profile errors
/// - E3xxx: Restaurant and review errors
/// - E4xxx: Social errors (friendships, likes)
/// - E5xxx: Messaging errors
/// - E6xxx: Post errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    RateLimited,
    ServiceUnavailable,
    BadRequest,
    PayloadTooLarge,

    // Auth (E1xxx)
    InvalidCredentials,
    EmailAlreadyExists,
    TokenExpired,
    TokenInvalid,
    RefreshTokenRevoked,
    PasswordTooWeak,

    // Profile (E2xxx)
    ProfileNotFound,
    UsernameTaken,
    InvalidUsername,
    UploadFailed,
    UnsupportedMedia,

    // Restaurants & reviews (E3xxx)
    RestaurantNotFound,
    ReviewNotFound,
    InvalidRating,
    EmptyComment,
    MenuItemNotFound,
    InvalidPrice,

    // Social (E4xxx)
    FriendshipExists,
    FriendshipNotFound,
    FriendshipNotPending,
    CannotFriendSelf,

    // Messaging (E5xxx)
    CannotMessageSelf,
    EmptyMessage,

    // Posts (E6xxx)
    PostNotFound,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::RateLimited => "E0006",
            Self::ServiceUnavailable => "E0007",
            Self::BadRequest => "E0008",
            Self::PayloadTooLarge => "E0009",

            // Auth
            Self::InvalidCredentials => "E1001",
            Self::EmailAlreadyExists => "E1002",
            Self::TokenExpired => "E1003",
            Self::TokenInvalid => "E1004",
            Self::RefreshTokenRevoked => "E1005",
            Self::PasswordTooWeak => "E1006",

            // Profile
            Self::ProfileNotFound => "E2001",
            Self::UsernameTaken => "E2002",
            Self::InvalidUsername => "E2003",
            Self::UploadFailed => "E2004",
            Self::UnsupportedMedia => "E2005",

            // Restaurants & reviews
            Self::RestaurantNotFound => "E3001",
            Self::ReviewNotFound => "E3002",
            Self::InvalidRating => "E3003",
            Self::EmptyComment => "E3004",
            Self::MenuItemNotFound => "E3005",
            Self::InvalidPrice => "E3006",

            // Social
            Self::FriendshipExists => "E4001",
            Self::FriendshipNotFound => "E4002",
            Self::FriendshipNotPending => "E4003",
            Self::CannotFriendSelf => "E4004",

            // Messaging
            Self::CannotMessageSelf => "E5001",
            Self::EmptyMessage => "E5002",

            // Posts
            Self::PostNotFound => "E6001",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError | Self::ServiceUnavailable | Self::UploadFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::ValidationError | Self::BadRequest | Self::PasswordTooWeak
            | Self::InvalidUsername | Self::InvalidRating | Self::EmptyComment
            | Self::InvalidPrice | Self::EmptyMessage => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMedia => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::NotFound | Self::ProfileNotFound | Self::RestaurantNotFound
            | Self::ReviewNotFound | Self::MenuItemNotFound | Self::FriendshipNotFound
            | Self::PostNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::Unauthorized | Self::InvalidCredentials | Self::TokenExpired
            | Self::TokenInvalid | Self::RefreshTokenRevoked => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::CannotFriendSelf | Self::CannotMessageSelf => {
                StatusCode::FORBIDDEN
            }
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::EmailAlreadyExists | Self::UsernameTaken | Self::FriendshipExists
            | Self::FriendshipNotPending => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The code reported to clients for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Database(diesel::result::Error::NotFound) => ErrorCode::NotFound,
            AppError::Validation(_) => ErrorCode::ValidationError,
            AppError::Internal(_) | AppError::Database(_) | AppError::Pool(_) => ErrorCode::InternalError,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
            AppError::Pool(err) => {
                tracing::error!(error = %err, "database pool exhausted");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ApiErrorResponse::new("E0007", "database unavailable"),
                )
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn known_error_renders_code_and_status() {
        let (status, body) = render(AppError::new(ErrorCode::InvalidRating, "rating must be between 1 and 5")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "E3003");
        assert_eq!(body["error"]["message"], "rating must be between 1 and 5");
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn details_are_passed_through() {
        let err = AppError::with_details(
            ErrorCode::ValidationError,
            "invalid signup",
            serde_json::json!({ "field": "email" }),
        );
        let (status, body) = render(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["field"], "email");
    }

    #[tokio::test]
    async fn diesel_not_found_maps_to_404() {
        let (status, body) = render(AppError::Database(diesel::result::Error::NotFound)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "E0003");
    }

    #[tokio::test]
    async fn internal_error_hides_cause() {
        let (status, body) = render(AppError::Internal(anyhow::anyhow!("s3 exploded"))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "internal server error");
    }

    #[test]
    fn conflict_codes() {
        for code in [
            ErrorCode::EmailAlreadyExists,
            ErrorCode::UsernameTaken,
            ErrorCode::FriendshipExists,
            ErrorCode::FriendshipNotPending,
        ] {
            assert_eq!(code.status_code(), StatusCode::CONFLICT, "{code:?}");
        }
    }

    #[test]
    fn menu_codes() {
        assert_eq!(ErrorCode::MenuItemNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::InvalidPrice.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InvalidPrice.code(), "E3006");
    }

    #[test]
    fn error_code_of_wrapped_errors() {
        assert_eq!(AppError::Validation("x".into()).error_code(), ErrorCode::ValidationError);
        assert_eq!(
            AppError::Database(diesel::result::Error::NotFound).error_code(),
            ErrorCode::NotFound
        );
        assert_eq!(AppError::forbidden("no").error_code(), ErrorCode::Forbidden);
    }
}
