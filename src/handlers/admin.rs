// src/handlers/admin.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{AdminCreateUserRequest, AdminUpdateUserRequest, Caller, UserListParams},
    services::{ExamService, UserService},
};

/// Lists users, optionally filtered by role.
/// Admin only.
pub async fn list_users(
    State(users): State<UserService>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(users.list_users(caller, params.role).await?))
}

pub async fn get_user(
    State(users): State<UserService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(users.get_user(caller, id).await?))
}

/// Creates a new user with specific role.
/// Admin only.
pub async fn create_user(
    State(users): State<UserService>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = users.create_user(caller, payload).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Updates name, password or assigned teacher. The role never changes.
pub async fn update_user(
    State(users): State<UserService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    Ok(Json(users.update_user(caller, id, payload).await?))
}

/// Deletes a user along with their dependent records.
pub async fn delete_user(
    State(users): State<UserService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    users.delete_user(caller, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Deletes an exam in any status.
pub async fn force_delete_exam(
    State(exams): State<ExamService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    exams.force_delete(caller, id).await?;

    Ok(StatusCode::NO_CONTENT)
}
