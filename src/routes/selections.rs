use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        auth::AuthenticatedUser,
        selection::{Selection, SubmitSelectionRequest},
    },
    services::selection::SelectionService,
    AppState,
};

/// POST /selections (student). 201 on first submit, 200 on replace.
pub async fn submit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<SubmitSelectionRequest>,
) -> AppResult<(StatusCode, Json<Selection>)> {
    user.require_student()?;
    let submission =
        SelectionService::submit(state.store.as_ref(), user.user_id, &body, state.clock.now())
            .await?;
    let status = if submission.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(submission.selection)))
}

/// GET /selections/mine (student)
pub async fn mine(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<Selection>>> {
    user.require_student()?;
    SelectionService::list_mine(state.store.as_ref(), user.user_id)
        .await
        .map(Json)
}

/// GET /selections/menu/{menu_id} (student)
pub async fn for_menu(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(menu_id): Path<Uuid>,
) -> AppResult<Json<Selection>> {
    user.require_student()?;
    SelectionService::get_for_menu(state.store.as_ref(), user.user_id, menu_id)
        .await
        .map(Json)
}

/// POST /selections/{id}/lock (admin)
pub async fn lock(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Selection>> {
    user.require_admin()?;
    SelectionService::lock(state.store.as_ref(), id).await.map(Json)
}
