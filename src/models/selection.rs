use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_QUANTITY: i64 = 1;
pub const MAX_QUANTITY: i64 = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectedItem {
    pub item_id: Uuid,
    pub quantity: u8,
}

/// A student's choice for one menu. One per (student, menu).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Selection {
    pub id: Uuid,
    pub student_id: Uuid,
    pub menu_id: Uuid,
    pub items: Vec<SelectedItem>,
    /// Time of the latest accepted submission.
    pub selected_at: DateTime<Utc>,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of a submission; quantity is checked, never clamped.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectedItemInput {
    pub item_id: Uuid,
    pub quantity: Option<i64>,
}

/// Body for POST /selections.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitSelectionRequest {
    pub menu_id: Uuid,
    pub items: Vec<SelectedItemInput>,
}

/// Validated write handed to the store.
#[derive(Debug, Clone)]
pub struct SelectionWrite {
    pub student_id: Uuid,
    pub menu_id: Uuid,
    pub items: Vec<SelectedItem>,
    pub selected_at: DateTime<Utc>,
}

/// Result of an upsert against the (student, menu) uniqueness key.
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    Created(Selection),
    Replaced(Selection),
    /// The existing row is locked; nothing was written.
    Locked,
    /// The menu is no longer active; nothing was written.
    MenuClosed,
}
