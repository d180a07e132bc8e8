use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        auth::AuthenticatedUser,
        menu_item::{
            CreateMenuItemRequest, ItemRemoval, MenuItem, MenuItemFilter, UpdateMenuItemRequest,
        },
    },
    services::menu_items::MenuItemService,
    AppState,
};

/// GET /menu-items?category=&is_active=
pub async fn list_items(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(filter): Query<MenuItemFilter>,
) -> AppResult<Json<Vec<MenuItem>>> {
    MenuItemService::list(state.store.as_ref(), &filter).await.map(Json)
}

/// POST /menu-items (admin)
pub async fn create_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateMenuItemRequest>,
) -> AppResult<(StatusCode, Json<MenuItem>)> {
    user.require_admin()?;
    let item = MenuItemService::create(state.store.as_ref(), &body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /menu-items/{id} (admin)
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMenuItemRequest>,
) -> AppResult<Json<MenuItem>> {
    user.require_admin()?;
    MenuItemService::update(state.store.as_ref(), id, &body)
        .await
        .map(Json)
}

/// DELETE /menu-items/{id} (admin). Referenced items are only deactivated.
pub async fn delete_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    user.require_admin()?;
    let removal = MenuItemService::remove(state.store.as_ref(), id).await?;
    let message = match removal {
        ItemRemoval::Deleted => "Item deleted",
        ItemRemoval::Deactivated => "Item is in use and has been deactivated",
    };
    Ok(Json(json!({ "message": message, "result": removal })))
}
