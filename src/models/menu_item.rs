use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Main,
    Side,
    Beverage,
    Dessert,
}

impl ItemCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::Main => "main",
            ItemCategory::Side => "side",
            ItemCategory::Beverage => "beverage",
            ItemCategory::Dessert => "dessert",
        }
    }
}

impl std::fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(ItemCategory::Main),
            "side" => Ok(ItemCategory::Side),
            "beverage" => Ok(ItemCategory::Beverage),
            "dessert" => Ok(ItemCategory::Dessert),
            _ => Err(anyhow::anyhow!("Unknown item category: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: ItemCategory,
    pub is_vegetarian: bool,
    pub is_vegan: bool,
    pub allergens: Vec<String>,
    pub calories: Option<i32>,
    /// Cleared instead of deleting once the item is referenced.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMenuItemRequest {
    pub name: String,
    pub description: Option<String>,
    pub category: ItemCategory,
    #[serde(default = "default_true")]
    pub is_vegetarian: bool,
    #[serde(default)]
    pub is_vegan: bool,
    #[serde(default)]
    pub allergens: Vec<String>,
    pub calories: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMenuItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ItemCategory>,
    pub is_vegetarian: Option<bool>,
    pub is_vegan: Option<bool>,
    pub allergens: Option<Vec<String>>,
    pub calories: Option<i32>,
    pub is_active: Option<bool>,
}

/// Query params for GET /menu-items.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MenuItemFilter {
    pub category: Option<ItemCategory>,
    pub is_active: Option<bool>,
}

impl MenuItemFilter {
    pub fn matches(&self, item: &MenuItem) -> bool {
        self.category.map_or(true, |c| item.category == c)
            && self.is_active.map_or(true, |a| item.is_active == a)
    }
}

/// What `DELETE /menu-items/{id}` actually did.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemRemoval {
    Deleted,
    Deactivated,
}
