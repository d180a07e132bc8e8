pub mod analytics;
pub mod menu;
pub mod menu_items;
pub mod metrics;
pub mod selection;
pub mod window;
