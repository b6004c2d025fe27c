use axum::extract::{Multipart, Path, State};
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use tastebud_shared::errors::{AppError, AppResult, ErrorCode};
use tastebud_shared::types::auth::AuthUser;
use tastebud_shared::types::ApiResponse;

use crate::models::{MenuItem, NewMenuItem};
use crate::schema::menu_items;
use crate::services::menu::{self, MenuCategory, MenuItemView, ValidMenuItem};
use crate::services::{media, profile_service};
use crate::AppState;

use super::restaurants::find_restaurant;
use super::upload::{self, UploadForm, UploadedFile};

fn read_item(form: &UploadForm) -> AppResult<ValidMenuItem> {
    menu::validate_item(
        form.field("name"),
        form.field("description"),
        form.field("price"),
        form.field("category"),
    )
}

/// Stores the optional image under `menu/{restaurant_id}/`.
async fn store_image(state: &AppState, restaurant_id: Uuid, file: Option<UploadedFile>) -> AppResult<Option<String>> {
    let Some(file) = file else {
        return Ok(None);
    };
    let ext = media::image_extension(&file.content_type)?;
    let key = media::object_key("menu", restaurant_id, ext);
    Ok(Some(upload::store(state, &key, file).await?))
}

// --- GET /restaurants/:id/menu ---

pub async fn list_menu(
    State(state): State<Arc<AppState>>,
    Path(restaurant_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<MenuCategory>>>> {
    let mut conn = state.db.get()?;
    find_restaurant(&mut conn, restaurant_id)?;

    let items = menu_items::table
        .filter(menu_items::restaurant_id.eq(restaurant_id))
        .order((menu_items::category.asc(), menu_items::name.asc()))
        .load::<MenuItem>(&mut conn)?;

    Ok(Json(ApiResponse::ok(menu::group_by_category(items))))
}

// --- POST /restaurants/:id/menu --- (multipart: name, description?, price, category, image?)

pub async fn create_menu_item(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(restaurant_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<MenuItemView>>> {
    let me = {
        let mut conn = state.db.get()?;
        find_restaurant(&mut conn, restaurant_id)?;
        profile_service::current_profile(&mut conn, user.id)?
    };

    let form = UploadForm::read(multipart, "image").await?;
    let valid = read_item(&form)?;
    let image_url = store_image(&state, restaurant_id, form.file).await?;

    let inserted = state.db.get().map_err(AppError::from).and_then(|mut conn| {
        diesel::insert_into(menu_items::table)
            .values(&NewMenuItem {
                restaurant_id,
                created_by: me.id,
                name: valid.name,
                description: valid.description,
                price_cents: valid.price_cents,
                category: valid.category,
                image_url: image_url.clone(),
            })
            .get_result::<MenuItem>(&mut conn)
            .map_err(AppError::from)
    });
    let item = upload::undo_on_error(inserted, upload::discard_opt(&state, image_url.as_deref())).await?;

    tracing::info!(menu_item_id = %item.id, restaurant_id = %restaurant_id, "menu item added");

    Ok(Json(ApiResponse::ok(MenuItemView::from(item))))
}

// --- PUT /restaurants/:id/menu/:item_id --- (same fields; image replaces the old one)

pub async fn update_menu_item(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path((restaurant_id, item_id)): Path<(Uuid, Uuid)>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<MenuItemView>>> {
    let existing = {
        let mut conn = state.db.get()?;
        let me = profile_service::current_profile(&mut conn, user.id)?;

        let existing: MenuItem = menu_items::table
            .find(item_id)
            .filter(menu_items::restaurant_id.eq(restaurant_id))
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| AppError::new(ErrorCode::MenuItemNotFound, "menu item not found"))?;

        if existing.created_by != me.id {
            return Err(AppError::forbidden("only the creator can edit a menu item"));
        }
        existing
    };

    let form = UploadForm::read(multipart, "image").await?;
    let valid = read_item(&form)?;
    let new_image = store_image(&state, restaurant_id, form.file).await?;
    let image_url = new_image.clone().or_else(|| existing.image_url.clone());

    let updated = state.db.get().map_err(AppError::from).and_then(|mut conn| {
        diesel::update(menu_items::table.find(existing.id))
            .set((
                menu_items::name.eq(&valid.name),
                menu_items::description.eq(&valid.description),
                menu_items::price_cents.eq(valid.price_cents),
                menu_items::category.eq(&valid.category),
                menu_items::image_url.eq(&image_url),
                menu_items::updated_at.eq(Utc::now()),
            ))
            .get_result::<MenuItem>(&mut conn)
            .map_err(AppError::from)
    });
    let item = upload::undo_on_error(updated, upload::discard_opt(&state, new_image.as_deref())).await?;

    if new_image.is_some() {
        upload::discard_opt(&state, existing.image_url.as_deref()).await;
    }

    tracing::info!(menu_item_id = %item.id, restaurant_id = %restaurant_id, "menu item updated");

    Ok(Json(ApiResponse::ok(MenuItemView::from(item))))
}
