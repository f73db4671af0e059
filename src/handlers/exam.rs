// src/handlers/exam.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        comment::CreateCommentRequest,
        exam::{CreateExamRequest, ExamFilter, ExamStatus, ReviewRequest, UpdateExamRequest},
        exam_data::{DistributeRequest, DistributeResponse},
        user::Caller,
    },
    services::{ExamService, GradingService, PaperService},
};

/// Lists all exams, optionally filtered by status, creator or course.
/// Admin only.
pub async fn list_exams(
    State(exams): State<ExamService>,
    Extension(caller): Extension<Caller>,
    Query(filter): Query<ExamFilter>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(exams.list_all(caller, filter).await?))
}

/// Creates a draft exam. Teacher only.
pub async fn create_exam(
    State(exams): State<ExamService>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let exam = exams.create(caller, payload).await?;

    Ok((StatusCode::CREATED, Json(exam)))
}

/// Creates an exam that is published and assigned immediately.
pub async fn quick_publish(
    State(exams): State<ExamService>,
    Extension(caller): Extension<Caller>,
    Json(mut payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    payload.status = Some(ExamStatus::Published);

    let exam = exams.create(caller, payload).await?;

    Ok((StatusCode::CREATED, Json(exam)))
}

pub async fn my_exams(
    State(exams): State<ExamService>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(exams.list_mine(caller).await?))
}

pub async fn pending_exams(
    State(exams): State<ExamService>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(exams.list_pending(caller).await?))
}

pub async fn published_exams(State(exams): State<ExamService>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(exams.list_published().await?))
}

pub async fn get_exam(
    State(exams): State<ExamService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(exams.get(caller, id).await?))
}

pub async fn update_exam(
    State(exams): State<ExamService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    Ok(Json(exams.update(caller, id, payload).await?))
}

pub async fn delete_exam(
    State(exams): State<ExamService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    exams.delete(caller, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_exam(
    State(exams): State<ExamService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(exams.submit(caller, id).await?))
}

pub async fn approve_exam(
    State(exams): State<ExamService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
    payload: Option<Json<ReviewRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let review = payload.map(|Json(review)| review).unwrap_or_default();
    review.validate()?;

    Ok(Json(exams.approve(caller, id, review.comment).await?))
}

pub async fn reject_exam(
    State(exams): State<ExamService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
    Json(review): Json<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    review.validate()?;

    Ok(Json(exams.reject(caller, id, review.comment).await?))
}

pub async fn publish_exam(
    State(exams): State<ExamService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(exams.publish(caller, id).await?))
}

/// Assigns the exam to the listed students (all students when empty).
pub async fn distribute_exam(
    State(grading): State<GradingService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
    payload: Option<Json<DistributeRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    let assigned = grading.distribute(caller, id, request.student_ids).await?;

    Ok(Json(DistributeResponse {
        exam_id: id,
        assigned,
    }))
}

pub async fn list_comments(
    State(exams): State<ExamService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(exams.list_comments(caller, id).await?))
}

pub async fn add_comment(
    State(exams): State<ExamService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let comment = exams.add_review_comment(caller, id, &payload.content).await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": comment.id }))))
}

pub async fn list_exam_papers(
    State(papers): State<PaperService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(papers.list_for_exam(caller, id).await?))
}
