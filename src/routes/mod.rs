pub mod analytics;
pub mod health;
pub mod menu_items;
pub mod menus;
pub mod selections;

use axum::{
    routing::{get, post, put},
    Extension, Router,
};

use crate::{middleware::auth::JwtSecret, AppState};

/// Every route of the API. Transport layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let jwt_secret = JwtSecret(state.config.jwt_secret.clone());

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/meal-windows", get(menus::meal_windows))
        // Menu items
        .route("/menu-items", get(menu_items::list_items).post(menu_items::create_item))
        .route("/menu-items/{id}", put(menu_items::update_item).delete(menu_items::delete_item))
        // Menus
        .route("/menus", get(menus::list_menus).post(menus::create_menu))
        .route("/menus/active", get(menus::active_menus))
        .route("/menus/{id}", get(menus::get_menu).put(menus::update_menu).delete(menus::delete_menu))
        .route("/menus/{id}/availability", get(menus::availability))
        .route("/menus/{id}/close", post(menus::close_menu))
        .route("/menus/{id}/selections", get(menus::menu_selections))
        .route("/menus/{id}/lock-selections", post(menus::lock_selections))
        // Selections
        .route("/selections", post(selections::submit))
        .route("/selections/mine", get(selections::mine))
        .route("/selections/menu/{menu_id}", get(selections::for_menu))
        .route("/selections/{id}/lock", post(selections::lock))
        // Analytics
        .route("/analytics/overview", get(analytics::overview))
        .route("/analytics/menu/{id}", get(analytics::menu))
        .route("/analytics/menu/{id}/kitchen.csv", get(analytics::kitchen_sheet))
        .layer(Extension(jwt_secret))
        .with_state(state)
}
