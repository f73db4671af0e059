// src/handlers/paper.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        paper::{CreatePaperRequest, UpdatePaperRequest, VerifyResponse},
        user::Caller,
    },
    services::PaperService,
};

pub async fn create_paper(
    State(papers): State<PaperService>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreatePaperRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let paper = papers.create(caller, payload).await?;

    Ok((StatusCode::CREATED, Json(paper)))
}

pub async fn get_paper(
    State(papers): State<PaperService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(papers.get(caller, id).await?))
}

pub async fn update_paper(
    State(papers): State<PaperService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePaperRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    Ok(Json(papers.update(caller, id, payload).await?))
}

pub async fn delete_paper(
    State(papers): State<PaperService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    papers.delete(caller, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Signs an approved paper.
pub async fn sign_paper(
    State(papers): State<PaperService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(papers.sign(caller, id).await?))
}

/// Checks a paper's stored signature against its current content.
pub async fn verify_paper(
    State(papers): State<PaperService>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let valid = papers.verify(caller, id).await?;

    Ok(Json(VerifyResponse { paper_id: id, valid }))
}
