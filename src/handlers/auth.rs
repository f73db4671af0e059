// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{Caller, ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest},
    services::UserService,
};

/// Registers a new student or teacher.
///
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(users): State<UserService>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = users.register(payload).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
pub async fn login(
    State(users): State<UserService>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let response = users.login(payload).await?;

    Ok(Json(response))
}

pub async fn me(
    State(users): State<UserService>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(users.profile(caller).await?))
}

pub async fn update_me(
    State(users): State<UserService>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    Ok(Json(users.update_profile(caller, payload.name).await?))
}

pub async fn change_password(
    State(users): State<UserService>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    users
        .change_password(caller, &payload.old_password, &payload.new_password)
        .await?;

    Ok(Json(json!({ "message": "Password updated" })))
}
