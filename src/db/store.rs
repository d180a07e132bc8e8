use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{
    menu::{MealType, Menu, MenuFilter, SelectionWindow},
    menu_item::{CreateMenuItemRequest, ItemRemoval, MenuItem, MenuItemFilter, UpdateMenuItemRequest},
    selection::{Selection, SelectionWrite, UpsertOutcome},
    user::Student,
};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Backend(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            let constraint = db.constraint().unwrap_or("unknown").to_string();
            if db.is_unique_violation() {
                return StoreError::UniqueViolation { constraint };
            }
            if db.is_foreign_key_violation() {
                return StoreError::ForeignKeyViolation { constraint };
            }
        }
        StoreError::Backend(e)
    }
}

/// Insert payload for a menu whose window has already been computed.
#[derive(Debug, Clone)]
pub struct NewMenu {
    pub meal_type: MealType,
    pub date: NaiveDate,
    pub item_ids: Vec<Uuid>,
    pub published_by: Uuid,
    pub window: SelectionWindow,
}

#[derive(Debug, Clone)]
pub struct ClosedMenu {
    pub menu: Menu,
    /// Selections that were still unlocked when the menu closed.
    pub locked_selections: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuDeletion {
    Deleted,
    NotFound,
    HasSelections(i64),
}

/// Persistence collaborator. Every method is one atomic unit; the
/// uniqueness rules on menus (meal type, date) and selections
/// (student, menu) are enforced here, not by callers.
#[async_trait]
pub trait MessStore: Send + Sync {
    /// Cheap liveness probe for /health.
    async fn ping(&self) -> StoreResult<()>;

    // ── Menu items ──────────────────────────────────────────────────────────
    async fn insert_menu_item(&self, req: &CreateMenuItemRequest) -> StoreResult<MenuItem>;

    async fn find_menu_item(&self, id: Uuid) -> StoreResult<Option<MenuItem>>;

    /// Sorted by category, then name.
    async fn list_menu_items(&self, filter: &MenuItemFilter) -> StoreResult<Vec<MenuItem>>;

    async fn menu_items_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<MenuItem>>;

    async fn update_menu_item(
        &self,
        id: Uuid,
        changes: &UpdateMenuItemRequest,
    ) -> StoreResult<Option<MenuItem>>;

    /// Deactivates the item if any menu or selection references it,
    /// deletes it otherwise. `None` when the item does not exist.
    async fn remove_menu_item(&self, id: Uuid) -> StoreResult<Option<ItemRemoval>>;

    // ── Menus ───────────────────────────────────────────────────────────────
    /// Fails with `UniqueViolation` when the (meal type, date) slot is taken.
    async fn insert_menu(&self, menu: NewMenu) -> StoreResult<Menu>;

    async fn find_menu(&self, id: Uuid) -> StoreResult<Option<Menu>>;

    async fn find_menu_by_slot(
        &self,
        meal_type: MealType,
        date: NaiveDate,
    ) -> StoreResult<Option<Menu>>;

    /// Newest date first, then serving order.
    async fn list_menus(&self, filter: &MenuFilter) -> StoreResult<Vec<Menu>>;

    /// Active menus whose window ends after `now`; soonest date first.
    async fn list_open_menus(&self, now: DateTime<Utc>) -> StoreResult<Vec<Menu>>;

    /// Only applies to menus that are not closed.
    async fn replace_menu_items(&self, id: Uuid, item_ids: &[Uuid]) -> StoreResult<Option<Menu>>;

    /// Moves an active menu to closed and locks its selections together.
    /// `None` when the menu is absent or not active.
    async fn close_menu(&self, id: Uuid) -> StoreResult<Option<ClosedMenu>>;

    async fn delete_menu(&self, id: Uuid) -> StoreResult<MenuDeletion>;

    // ── Selections ──────────────────────────────────────────────────────────
    /// Create-or-replace on (student, menu). A locked row is left untouched.
    async fn upsert_selection(&self, write: &SelectionWrite) -> StoreResult<UpsertOutcome>;

    async fn find_selection(&self, student_id: Uuid, menu_id: Uuid)
        -> StoreResult<Option<Selection>>;

    async fn lock_selection(&self, id: Uuid) -> StoreResult<Option<Selection>>;

    /// Returns how many selections were newly locked.
    async fn lock_menu_selections(&self, menu_id: Uuid) -> StoreResult<u64>;

    /// Newest first.
    async fn selections_by_student(&self, student_id: Uuid) -> StoreResult<Vec<Selection>>;

    /// Newest first.
    async fn selections_by_menus(&self, menu_ids: &[Uuid]) -> StoreResult<Vec<Selection>>;

    // ── Student directory (read-only) ───────────────────────────────────────
    async fn count_active_students(&self) -> StoreResult<i64>;

    async fn students_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Student>>;
}
