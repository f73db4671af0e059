// src/models/paper.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::exam::ExamStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
}

text_enum!(PaperStatus, "paper status", {
    Draft => "draft",
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

impl PaperStatus {
    /// The paper status that follows its exam into `exam_status`.
    /// Publishing leaves papers approved.
    pub fn mirroring(exam_status: ExamStatus) -> Option<PaperStatus> {
        match exam_status {
            ExamStatus::Draft => Some(PaperStatus::Draft),
            ExamStatus::Pending => Some(PaperStatus::Pending),
            ExamStatus::Approved => Some(PaperStatus::Approved),
            ExamStatus::Rejected => Some(PaperStatus::Rejected),
            ExamStatus::Published => None,
        }
    }
}

/// Represents the 'papers' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Paper {
    pub id: i64,
    pub exam_id: i64,
    pub title: String,
    pub content: String,

    /// Serialized question set, stored as opaque text.
    pub questions: String,

    /// Minutes.
    pub duration: i32,
    pub total_score: f64,
    pub passing_score: f64,

    #[sqlx(try_from = "String")]
    pub status: PaperStatus,

    /// Hex HMAC-SHA256, see `utils::signature`.
    pub signature: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
    pub signed_by: Option<i64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaper {
    pub exam_id: i64,
    pub title: String,
    pub content: String,
    pub questions: String,
    pub duration: i32,
    pub total_score: f64,
    pub passing_score: f64,
}

/// Column changes applied by `Store::update_paper`.
#[derive(Debug, Clone, Default)]
pub struct PaperChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub questions: Option<String>,
    pub duration: Option<i32>,
    pub total_score: Option<f64>,
    pub passing_score: Option<f64>,
}

/// Signature columns written by `Store::set_paper_signature`.
#[derive(Debug, Clone)]
pub struct PaperSignature {
    pub signature: String,
    pub signed_at: DateTime<Utc>,
    pub signed_by: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaperRequest {
    pub exam_id: i64,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub questions: String,
    #[validate(range(min = 1, message = "Duration must be positive."))]
    pub duration: i32,
    #[validate(range(exclusive_min = 0.0, message = "Total score must be positive."))]
    pub total_score: f64,
    #[validate(range(exclusive_min = 0.0, message = "Passing score must be positive."))]
    pub passing_score: f64,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePaperRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub content: Option<String>,
    pub questions: Option<String>,
    #[validate(range(min = 1))]
    pub duration: Option<i32>,
    #[validate(range(exclusive_min = 0.0))]
    pub total_score: Option<f64>,
    #[validate(range(exclusive_min = 0.0))]
    pub passing_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub paper_id: i64,
    pub valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn papers_follow_exam_review_outcome() {
        assert_eq!(PaperStatus::mirroring(ExamStatus::Pending), Some(PaperStatus::Pending));
        assert_eq!(PaperStatus::mirroring(ExamStatus::Approved), Some(PaperStatus::Approved));
        assert_eq!(PaperStatus::mirroring(ExamStatus::Rejected), Some(PaperStatus::Rejected));
        assert_eq!(PaperStatus::mirroring(ExamStatus::Published), None);
    }
}
