use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::error;

use crate::db::store::StoreError;
use crate::models::menu::MenuStatus;

pub type AppResult<T> = Result<T, AppError>;

/// Why the selection gate refused a menu.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateRejection {
    #[error("This menu is not available for selection")]
    NotActive { status: MenuStatus },

    #[error("Selection window has not opened yet")]
    NotYetOpen { opens_at: DateTime<Utc> },

    #[error("Selection window has closed for this menu")]
    Closed { closed_at: DateTime<Utc> },
}

impl GateRejection {
    /// Stable label used in responses and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            GateRejection::NotActive { .. } => "not_active",
            GateRejection::NotYetOpen { .. } => "not_yet_open",
            GateRejection::Closed { .. } => "closed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed or missing input (400)
    #[error("{0}")]
    Validation(String),

    /// Menu, item or selection absent (404)
    #[error("{0}")]
    NotFound(String),

    /// Duplicate menu slot, delete with selections (409)
    #[error("{0}")]
    Conflict(String),

    /// Locked selection, wrong role (403)
    #[error("{0}")]
    Forbidden(String),

    /// Selection gate refused the menu (403)
    #[error(transparent)]
    Gate(#[from] GateRejection),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) | AppError::Gate(_) => StatusCode::FORBIDDEN,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation { constraint } => {
                AppError::Conflict(format!("Duplicate entry ({constraint})"))
            }
            StoreError::ForeignKeyViolation { constraint } => {
                AppError::Conflict(format!("Record is still referenced ({constraint})"))
            }
            StoreError::Corrupt(msg) => AppError::Internal(msg),
            StoreError::Backend(e) => AppError::Database(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Gate(gate) => match gate {
                GateRejection::NotActive { status } => json!({
                    "error": gate.to_string(),
                    "reason": gate.reason(),
                    "status": status,
                }),
                GateRejection::NotYetOpen { opens_at } => json!({
                    "error": gate.to_string(),
                    "reason": gate.reason(),
                    "opens_at": opens_at,
                }),
                GateRejection::Closed { closed_at } => json!({
                    "error": gate.to_string(),
                    "reason": gate.reason(),
                    "closed_at": closed_at,
                }),
            },
            AppError::Database(msg) => {
                error!(target: "database", error = %msg, "Database error occurred");
                json!({ "error": "Database error" })
            }
            AppError::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error occurred");
                json!({ "error": "Internal server error" })
            }
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
