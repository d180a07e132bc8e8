// Library exports for binary tools and tests
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use clock::Clock;
use config::Config;
use db::MessStore;
use services::window::WindowCalculator;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MessStore>,
    pub clock: Arc<dyn Clock>,
    pub windows: Arc<WindowCalculator>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn MessStore>, clock: Arc<dyn Clock>, config: Config) -> Self {
        let windows = WindowCalculator::new(config.schedule, config.timezone);
        Self {
            store,
            clock,
            windows: Arc::new(windows),
            config: Arc::new(config),
        }
    }
}
