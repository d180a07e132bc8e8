pub mod analytics;
pub mod auth;
pub mod menu;
pub mod menu_item;
pub mod selection;
pub mod user;
