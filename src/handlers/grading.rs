// src/handlers/grading.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{exam_data::GradeRequest, user::Caller},
    services::GradingService,
};

pub async fn list_students(
    State(grading): State<GradingService>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(grading.list_students(caller).await?))
}

pub async fn student_exams(
    State(grading): State<GradingService>,
    Extension(caller): Extension<Caller>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(grading.student_exams(caller, student_id).await?))
}

pub async fn review_submission(
    State(grading): State<GradingService>,
    Extension(caller): Extension<Caller>,
    Path(exam_data_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(grading.review(caller, exam_data_id).await?))
}

/// Grades a submission with a score in [0, 100] and an optional remark.
pub async fn grade_submission(
    State(grading): State<GradingService>,
    Extension(caller): Extension<Caller>,
    Path(exam_data_id): Path<i64>,
    Json(payload): Json<GradeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let graded = grading
        .grade(caller, exam_data_id, payload.score, payload.comment)
        .await?;

    Ok(Json(graded))
}
