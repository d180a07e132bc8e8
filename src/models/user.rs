use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Student,
    Admin,
}

/// Student directory entry, as far as analytics needs it.
/// Accounts themselves are owned by the auth service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub roll_number: Option<String>,
    pub hostel_block: Option<String>,
    pub is_active: bool,
}
