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
        menu::{CreateMenuRequest, Menu, MenuAvailability, MenuFilter, UpdateMenuRequest},
        selection::Selection,
    },
    services::{menu::MenuService, selection::SelectionService},
    AppState,
};

/// GET /menus?status=&meal_type=&start_date=&end_date= (admin)
pub async fn list_menus(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(filter): Query<MenuFilter>,
) -> AppResult<Json<Vec<Menu>>> {
    user.require_admin()?;
    MenuService::list(state.store.as_ref(), &filter).await.map(Json)
}

/// GET /menus/active: menus still open or about to open
pub async fn active_menus(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<Vec<Menu>>> {
    MenuService::list_active(state.store.as_ref(), state.clock.now())
        .await
        .map(Json)
}

/// POST /menus (admin)
pub async fn create_menu(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateMenuRequest>,
) -> AppResult<(StatusCode, Json<Menu>)> {
    user.require_admin()?;
    let menu = MenuService::create(state.store.as_ref(), &state.windows, &body, user.user_id).await?;
    Ok((StatusCode::CREATED, Json(menu)))
}

pub async fn get_menu(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Menu>> {
    MenuService::get(state.store.as_ref(), id).await.map(Json)
}

/// GET /menus/{id}/availability
pub async fn availability(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MenuAvailability>> {
    MenuService::availability(state.store.as_ref(), id, state.clock.now())
        .await
        .map(Json)
}

/// PUT /menus/{id} (admin)
pub async fn update_menu(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMenuRequest>,
) -> AppResult<Json<Menu>> {
    user.require_admin()?;
    MenuService::update(state.store.as_ref(), id, &body)
        .await
        .map(Json)
}

/// POST /menus/{id}/close (admin)
pub async fn close_menu(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    user.require_admin()?;
    let closed = MenuService::close(state.store.as_ref(), id).await?;
    Ok(Json(json!({
        "menu": closed.menu,
        "locked_selections": closed.locked_selections,
    })))
}

/// DELETE /menus/{id} (admin)
pub async fn delete_menu(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    user.require_admin()?;
    MenuService::delete(state.store.as_ref(), id).await?;
    Ok(Json(json!({ "message": "Menu deleted" })))
}

/// GET /menus/{id}/selections (admin)
pub async fn menu_selections(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Selection>>> {
    user.require_admin()?;
    SelectionService::list_by_menu(state.store.as_ref(), id)
        .await
        .map(Json)
}

/// POST /menus/{id}/lock-selections (admin)
pub async fn lock_selections(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    user.require_admin()?;
    let locked = SelectionService::lock_menu(state.store.as_ref(), id).await?;
    Ok(Json(json!({ "locked": locked })))
}

/// GET /meal-windows
pub async fn meal_windows(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Json<Value> {
    Json(json!({
        "timezone": state.windows.timezone().name(),
        "windows": state.windows.entries(),
    }))
}
