// src/handlers/dashboard.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};

use crate::{error::AppError, models::user::Caller, services::DashboardService};

/// Role-dependent statistics for the caller.
pub async fn dashboard(
    State(dashboard): State<DashboardService>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(dashboard.for_caller(caller).await?))
}
