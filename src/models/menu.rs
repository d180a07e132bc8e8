use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declaration order is serving order within a day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    pub const ALL: [MealType; 3] = [MealType::Breakfast, MealType::Lunch, MealType::Dinner];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
        }
    }
}

impl std::fmt::Display for MealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MealType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            _ => Err(anyhow::anyhow!("Invalid meal type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MenuStatus {
    Draft,
    Active,
    Closed,
}

impl MenuStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MenuStatus::Draft => "draft",
            MenuStatus::Active => "active",
            MenuStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for MenuStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MenuStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(MenuStatus::Draft),
            "active" => Ok(MenuStatus::Active),
            "closed" => Ok(MenuStatus::Closed),
            _ => Err(anyhow::anyhow!("Unknown menu status: {s}")),
        }
    }
}

/// Where an instant falls relative to a selection window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    NotYetOpen,
    Open,
    Closed,
}

/// Half-open `[start, end)` range during which students may select.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SelectionWindow {
    pub fn phase(&self, now: DateTime<Utc>) -> WindowPhase {
        if now >= self.end {
            WindowPhase::Closed
        } else if now < self.start {
            WindowPhase::NotYetOpen
        } else {
            WindowPhase::Open
        }
    }
}

/// A published menu for one meal on one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Menu {
    pub id: Uuid,
    pub meal_type: MealType,
    /// Calendar day the meal is served, in the mess timezone.
    pub date: NaiveDate,
    /// Ordered as the admin listed them.
    pub item_ids: Vec<Uuid>,
    pub published_by: Uuid,
    pub window: SelectionWindow,
    pub is_published: bool,
    pub status: MenuStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Menu {
    pub fn offers(&self, item_id: Uuid) -> bool {
        self.item_ids.contains(&item_id)
    }
}

/// Body for POST /menus.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMenuRequest {
    pub meal_type: String,
    pub date: NaiveDate,
    pub item_ids: Vec<Uuid>,
}

/// Body for PUT /menus/{id}.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMenuRequest {
    pub item_ids: Option<Vec<Uuid>>,
}

/// Query params for GET /menus.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MenuFilter {
    pub status: Option<MenuStatus>,
    pub meal_type: Option<MealType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl MenuFilter {
    pub fn matches(&self, menu: &Menu) -> bool {
        self.status.map_or(true, |s| menu.status == s)
            && self.meal_type.map_or(true, |m| menu.meal_type == m)
            && self.start_date.map_or(true, |d| menu.date >= d)
            && self.end_date.map_or(true, |d| menu.date <= d)
    }
}

/// Client-facing view of the selection gate for one menu.
#[derive(Debug, Clone, Serialize)]
pub struct MenuAvailability {
    pub menu_id: Uuid,
    pub open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_remaining: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> SelectionWindow {
        SelectionWindow {
            start: Utc.with_ymd_and_hms(2024, 5, 1, 14, 30, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 5, 1, 16, 0, 0).unwrap(),
        }
    }

    #[test]
    fn window_is_half_open() {
        let w = window();
        assert_eq!(w.phase(w.start - chrono::Duration::seconds(1)), WindowPhase::NotYetOpen);
        assert_eq!(w.phase(w.start), WindowPhase::Open);
        assert_eq!(w.phase(w.end - chrono::Duration::seconds(1)), WindowPhase::Open);
        assert_eq!(w.phase(w.end), WindowPhase::Closed);
    }

    #[test]
    fn meal_type_round_trips_through_str() {
        for meal in MealType::ALL {
            assert_eq!(meal.as_str().parse::<MealType>().unwrap(), meal);
        }
        assert!("brunch".parse::<MealType>().is_err());
    }

    #[test]
    fn meal_types_sort_in_serving_order() {
        let mut meals = vec![MealType::Dinner, MealType::Breakfast, MealType::Lunch];
        meals.sort();
        assert_eq!(meals, MealType::ALL.to_vec());
    }
}
