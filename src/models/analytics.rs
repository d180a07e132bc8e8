use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    menu::{MealType, MenuStatus},
    menu_item::{ItemCategory, MenuItem},
};

#[derive(Debug, Clone, Serialize)]
pub struct MenuSummary {
    pub id: Uuid,
    pub meal_type: MealType,
    pub date: NaiveDate,
    pub status: MenuStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipationSummary {
    pub total_students: i64,
    pub total_selections: i64,
    /// Percentage, two decimal places.
    pub participation_rate: f64,
    pub selection_window_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemRef {
    pub id: Uuid,
    pub name: String,
    pub category: ItemCategory,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemStudent {
    pub name: String,
    pub roll_number: Option<String>,
    pub quantity: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemStat {
    pub item: ItemRef,
    pub total_selections: i64,
    pub total_quantity: i64,
    pub percentage: f64,
    pub students: Vec<ItemStudent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentSelection {
    pub student: String,
    pub roll_number: Option<String>,
    pub items: usize,
    pub selected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuAnalytics {
    pub menu: MenuSummary,
    pub summary: ParticipationSummary,
    pub item_stats: Vec<ItemStat>,
    pub hostel_breakdown: BTreeMap<String, i64>,
    pub recent_selections: Vec<RecentSelection>,
}

/// Query params for GET /analytics/overview.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverviewQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverviewCounts {
    pub total_menus: i64,
    pub active_menus: i64,
    pub closed_menus: i64,
    pub total_students: i64,
    pub total_selections: i64,
    pub average_participation: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PopularItem {
    /// `None` when the item row no longer exists.
    pub item: Option<MenuItem>,
    pub item_id: Uuid,
    pub total_selections: i64,
    pub total_quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverviewAnalytics {
    pub overview: OverviewCounts,
    pub popular_items: Vec<PopularItem>,
}
