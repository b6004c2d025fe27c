use std::collections::HashMap;
use std::future::Future;

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;

use tastebud_shared::errors::{AppError, AppResult, ErrorCode};

use crate::AppState;

pub struct UploadedFile {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A multipart body split into its (at most one) file part and text fields.
#[derive(Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// A part counts as the file when it carries a filename or is named `file_field`.
    pub async fn read(mut multipart: Multipart, file_field: &str) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            let is_file = field.file_name().is_some() || name == file_field;

            if is_file {
                if form.file.is_some() {
                    return Err(AppError::bad_request("only one file may be uploaded"));
                }
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if !bytes.is_empty() {
                    form.file = Some(UploadedFile { content_type, bytes: bytes.to_vec() });
                }
            } else {
                let value = field.text().await.map_err(multipart_error)?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn require_file(self) -> AppResult<(UploadedFile, HashMap<String, String>)> {
        match self.file {
            Some(file) => Ok((file, self.fields)),
            None => Err(AppError::bad_request("no file provided")),
        }
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(ErrorCode::PayloadTooLarge, "upload is too large")
    } else {
        AppError::bad_request(format!("failed to read multipart: {e}"))
    }
}

/// Stores an object and returns its public URL.
pub async fn store(state: &AppState, key: &str, file: UploadedFile) -> AppResult<String> {
    let url = state
        .storage
        .upload(key, file.bytes, &file.content_type)
        .await
        .map_err(|e| AppError::new(ErrorCode::UploadFailed, e.to_string()))?;
    tracing::debug!(key = %key, "object stored");
    Ok(url)
}

/// Deletes the object behind `url`, if it lives in our bucket. Failures are logged only.
pub async fn discard(state: &AppState, url: &str) {
    let Some(key) = state.storage.key_for_url(url) else {
        return;
    };
    if let Err(e) = state.storage.delete(key).await {
        tracing::warn!(key = %key, error = %e, "failed to delete stored object");
    }
}

/// Runs `undo` when `result` failed, then hands `result` back unchanged.
pub async fn undo_on_error<T>(result: AppResult<T>, undo: impl Future<Output = ()>) -> AppResult<T> {
    if result.is_err() {
        undo.await;
    }
    result
}

/// Like [`discard`], for an optional upload.
pub async fn discard_opt(state: &AppState, url: Option<&str>) {
    if let Some(url) = url {
        discard(state, url).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-TASTEBUD-BOUNDARY";

    fn body(parts: &[(&str, Option<(&str, &str)>, &str)]) -> String {
        let mut out = String::new();
        for (name, file, value) in parts {
            out.push_str(&format!("--{BOUNDARY}\r\n"));
            match file {
                Some((filename, content_type)) => out.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )),
                None => out.push_str(&format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")),
            }
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str(&format!("--{BOUNDARY}--\r\n"));
        out
    }

    async fn summarize(multipart: Multipart) -> String {
        match UploadForm::read(multipart, "image").await {
            Ok(form) => format!(
                "rating={:?} file={:?}",
                form.field("rating"),
                form.file.as_ref().map(|f| (f.content_type.clone(), f.bytes.len()))
            ),
            Err(e) => format!("error={}", e.error_code().code()),
        }
    }

    async fn call(payload: String) -> String {
        let app = Router::new().route("/", post(summarize));
        let req = Request::post("/")
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(payload))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn splits_text_fields_from_file() {
        let payload = body(&[
            ("rating", None, "4"),
            ("image", Some(("plate.png", "image/png")), "PNGDATA"),
        ]);
        assert_eq!(call(payload).await, "rating=Some(\"4\") file=Some((\"image/png\", 7))");
    }

    #[tokio::test]
    async fn text_only_form_has_no_file() {
        let payload = body(&[("rating", None, "5"), ("comment", None, "great")]);
        assert_eq!(call(payload).await, "rating=Some(\"5\") file=None");
    }

    #[tokio::test]
    async fn two_files_are_rejected() {
        let payload = body(&[
            ("image", Some(("a.png", "image/png")), "A"),
            ("other", Some(("b.png", "image/png")), "B"),
        ]);
        assert_eq!(call(payload).await, "error=E0008");
    }

    #[tokio::test]
    async fn undo_runs_only_when_the_write_failed() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let undone = AtomicBool::new(false);
        let ok: AppResult<u32> = Ok(7);
        let kept = undo_on_error(ok, async { undone.store(true, Ordering::SeqCst) }).await;
        assert_eq!(kept.unwrap(), 7);
        assert!(!undone.load(Ordering::SeqCst));

        let failed: AppResult<u32> = Err(AppError::internal("insert failed"));
        let err = undo_on_error(failed, async { undone.store(true, Ordering::SeqCst) }).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InternalError);
        assert!(undone.load(Ordering::SeqCst));
    }
}
