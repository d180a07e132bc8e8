use std::env;

use chrono_tz::Tz;

use crate::services::window::{ClockWindow, MealSchedule};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub app_base_url: String,
    /// Timezone the meal windows are expressed in.
    pub timezone: Tz,
    pub schedule: MealSchedule,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok().filter(|v| !v.is_empty()))
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            get(key).ok_or_else(|| anyhow::anyhow!("Missing required env var: {}", key))
        };
        let window = |key: &str, default: ClockWindow| -> anyhow::Result<ClockWindow> {
            match get(key) {
                Some(v) => ClockWindow::parse(&v).map_err(|e| anyhow::anyhow!("{key}: {e}")),
                None => Ok(default),
            }
        };

        let defaults = MealSchedule::default();
        let timezone = get("MESS_TIMEZONE").unwrap_or_else(|| "Asia/Kolkata".into());

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            db_max_connections: get("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "20".into())
                .parse()?,
            jwt_secret: required("JWT_SECRET")?,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: get("PORT").unwrap_or_else(|| "8080".into()).parse()?,
            app_base_url: get("APP_BASE_URL").unwrap_or_else(|| "http://localhost".into()),
            timezone: timezone
                .parse()
                .map_err(|e| anyhow::anyhow!("MESS_TIMEZONE: {e}"))?,
            schedule: MealSchedule {
                breakfast: window("BREAKFAST_WINDOW", defaults.breakfast)?,
                lunch: window("LUNCH_WINDOW", defaults.lunch)?,
                dinner: window("DINNER_WINDOW", defaults.dinner)?,
            },
        })
    }
}
