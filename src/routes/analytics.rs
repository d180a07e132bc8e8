use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        analytics::{MenuAnalytics, OverviewAnalytics, OverviewQuery},
        auth::AuthenticatedUser,
    },
    services::analytics::AnalyticsService,
    AppState,
};

/// GET /analytics/menu/{id} (admin)
pub async fn menu(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MenuAnalytics>> {
    user.require_admin()?;
    AnalyticsService::menu(state.store.as_ref(), id).await.map(Json)
}

/// GET /analytics/menu/{id}/kitchen.csv (admin)
pub async fn kitchen_sheet(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    user.require_admin()?;
    let csv = AnalyticsService::kitchen_sheet(state.store.as_ref(), id).await?;
    let disposition = format!("attachment; filename=\"kitchen-{id}.csv\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}

/// GET /analytics/overview?start_date=&end_date= (admin)
pub async fn overview(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<OverviewQuery>,
) -> AppResult<Json<OverviewAnalytics>> {
    user.require_admin()?;
    AnalyticsService::overview(state.store.as_ref(), &query)
        .await
        .map(Json)
}
