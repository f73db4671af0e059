// src/handlers/student.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{exam_data::SubmitAnswerRequest, user::Caller},
    services::GradingService,
};

/// The caller's assigned exams.
pub async fn assignments(
    State(grading): State<GradingService>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(grading.assignments(caller).await?))
}

/// Opens a published exam, creating the caller's record on first visit.
pub async fn open_exam(
    State(grading): State<GradingService>,
    Extension(caller): Extension<Caller>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(grading.open_exam(caller, exam_id).await?))
}

pub async fn submit_answer(
    State(grading): State<GradingService>,
    Extension(caller): Extension<Caller>,
    Path(exam_id): Path<i64>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    Ok(Json(grading.submit_answer(caller, exam_id, &payload.answer).await?))
}

pub async fn result(
    State(grading): State<GradingService>,
    Extension(caller): Extension<Caller>,
    Path(exam_data_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(grading.result(caller, exam_data_id).await?))
}
