use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use tastebud_shared::errors::{AppError, AppResult, ErrorCode};
use tastebud_shared::types::auth::AuthUser;
use tastebud_shared::types::pagination::{Paginated, PaginationParams};
use tastebud_shared::types::ApiResponse;

use crate::models::{NewPost, Post};
use crate::schema::posts;
use crate::services::{media, profile_service};
use crate::AppState;

use super::upload::{self, UploadForm};

pub const MAX_CAPTION_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
pub struct PostsQuery {
    pub author: Option<Uuid>,
}

/// Blank captions are stored as none.
pub fn normalize_caption(raw: Option<&str>) -> AppResult<Option<String>> {
    let caption = match raw.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => c,
        None => return Ok(None),
    };
    if caption.chars().count() > MAX_CAPTION_CHARS {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            format!("caption must be at most {MAX_CAPTION_CHARS} characters"),
        ));
    }
    Ok(Some(caption.to_string()))
}

fn insert_post(state: &AppState, new_post: &NewPost) -> AppResult<Post> {
    let mut conn = state.db.get()?;
    Ok(diesel::insert_into(posts::table)
        .values(new_post)
        .get_result(&mut conn)?)
}

// --- POST /posts --- (multipart: file, caption?)

pub async fn create_post(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Post>>> {
    let author = {
        let mut conn = state.db.get()?;
        profile_service::current_profile(&mut conn, user.id)?
    };

    let (file, fields) = UploadForm::read(multipart, "file").await?.require_file()?;
    let caption = normalize_caption(fields.get("caption").map(String::as_str))?;
    let (kind, ext) = media::classify(&file.content_type)?;

    let key = media::object_key("posts", author.id, ext);
    let media_url = upload::store(&state, &key, file).await?;

    let inserted = insert_post(
        &state,
        &NewPost {
            author_id: author.id,
            media_url: media_url.clone(),
            media_kind: kind.as_str().to_string(),
            caption,
        },
    );
    let post = upload::undo_on_error(inserted, upload::discard(&state, &media_url)).await?;

    tracing::info!(post_id = %post.id, author_id = %author.id, media_kind = %post.media_kind, "post created");

    Ok(Json(ApiResponse::ok(post)))
}

// --- GET /posts?author= ---

pub async fn list_posts(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<PostsQuery>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<Post>>>> {
    let mut conn = state.db.get()?;

    let author = match query.author {
        Some(id) => Some(profile_service::find_profile(&mut conn, id)?.id),
        None => None,
    };

    let mut count = posts::table.into_boxed();
    let mut page = posts::table.into_boxed();
    if let Some(author_id) = author {
        count = count.filter(posts::author_id.eq(author_id));
        page = page.filter(posts::author_id.eq(author_id));
    }

    let total: i64 = count.count().get_result(&mut conn)?;
    let items = page
        .order(posts::created_at.desc())
        .offset(params.offset() as i64)
        .limit(params.limit() as i64)
        .load::<Post>(&mut conn)?;

    Ok(Json(ApiResponse::ok(Paginated::new(items, total as u64, &params))))
}

// --- DELETE /posts/:id ---

pub async fn delete_post(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    let post = {
        let mut conn = state.db.get()?;
        let me = profile_service::current_profile(&mut conn, user.id)?;

        let post: Post = posts::table
            .find(post_id)
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| AppError::new(ErrorCode::PostNotFound, "post not found"))?;

        if post.author_id != me.id {
            return Err(AppError::forbidden("only the author can delete a post"));
        }

        diesel::delete(posts::table.find(post.id)).execute(&mut conn)?;
        post
    };

    upload::discard(&state, &post.media_url).await;

    tracing::info!(post_id = %post.id, "post deleted");

    Ok(Json(ApiResponse::ok("post deleted")))
}
