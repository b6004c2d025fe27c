use serde::Serialize;
use uuid::Uuid;

use tastebud_shared::errors::{AppError, ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

/// Maps an upload content type to its kind and file extension.
pub fn classify(content_type: &str) -> Result<(MediaKind, &'static str), AppError> {
    let kind_ext = match content_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => (MediaKind::Image, "jpg"),
        "image/png" => (MediaKind::Image, "png"),
        "image/webp" => (MediaKind::Image, "webp"),
        "image/gif" => (MediaKind::Image, "gif"),
        "video/mp4" => (MediaKind::Video, "mp4"),
        "video/quicktime" => (MediaKind::Video, "mov"),
        "video/webm" => (MediaKind::Video, "webm"),
        _ => {
            return Err(AppError::new(
                ErrorCode::UnsupportedMedia,
                "unsupported format, accepted: jpeg, png, webp, gif, mp4, quicktime, webm",
            ));
        }
    };
    Ok(kind_ext)
}

/// Like `classify`, but only images are accepted (avatars, review photos).
pub fn image_extension(content_type: &str) -> Result<&'static str, AppError> {
    match classify(content_type) {
        Ok((MediaKind::Image, ext)) => Ok(ext),
        _ => Err(AppError::new(
            ErrorCode::UnsupportedMedia,
            "unsupported image format, accepted: jpeg, png, webp, gif",
        )),
    }
}

/// `{folder}/{owner}/{uuid}.{ext}`
pub fn object_key(folder: &str, owner: Uuid, ext: &str) -> String {
    format!("{folder}/{owner}/{}.{ext}", Uuid::now_v7())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_and_videos_are_classified() {
        assert_eq!(classify("image/png").unwrap(), (MediaKind::Image, "png"));
        assert_eq!(classify("IMAGE/JPEG").unwrap(), (MediaKind::Image, "jpg"));
        assert_eq!(classify("video/quicktime").unwrap(), (MediaKind::Video, "mov"));
    }

    #[test]
    fn unknown_types_are_unsupported() {
        let err = classify("application/pdf").unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::UnsupportedMedia);
    }

    #[test]
    fn image_only_rejects_video() {
        assert_eq!(image_extension("image/webp").unwrap(), "webp");
        assert!(image_extension("video/mp4").is_err());
    }

    #[test]
    fn object_keys_are_scoped_by_owner() {
        let owner = Uuid::new_v4();
        let key = object_key("reviews", owner, "jpg");
        assert!(key.starts_with(&format!("reviews/{owner}/")));
        assert!(key.ends_with(".jpg"));
        assert_ne!(key, object_key("reviews", owner, "jpg"));
    }
}
