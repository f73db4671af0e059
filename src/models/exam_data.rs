// src/models/exam_data.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Progress of one student's copy of an exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamDataStatus {
    /// Distributed, nothing submitted yet.
    Assigned,
    /// Answer submitted, waiting for grading.
    Pending,
    /// Graded.
    Approved,
    Rejected,
}

text_enum!(ExamDataStatus, "exam data status", {
    Assigned => "assigned",
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

/// Represents the 'exam_data' table: one row per (exam, student).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamData {
    pub id: i64,
    pub exam_id: i64,
    pub student_id: i64,

    /// Snapshot of the exam at assignment time.
    pub title: String,
    pub course: String,

    pub total_score: f64,

    #[sqlx(try_from = "String")]
    pub status: ExamDataStatus,

    /// The teacher who graded the submission.
    pub approver_id: Option<i64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewExamData {
    pub exam_id: i64,
    pub student_id: i64,
    pub title: String,
    pub course: String,
}

/// Column changes applied by `Store::update_exam_data`.
#[derive(Debug, Clone, Default)]
pub struct ExamDataChanges {
    pub status: Option<ExamDataStatus>,
    pub total_score: Option<f64>,
    pub approver_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ExamDataFilter {
    pub exam_id: Option<i64>,
    pub student_id: Option<i64>,
    pub status: Option<ExamDataStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DistributeRequest {
    /// Empty means every student.
    #[serde(default)]
    pub student_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct DistributeResponse {
    pub exam_id: i64,
    pub assigned: usize,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1, max = 20000, message = "Answer must not be empty."))]
    pub answer: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GradeRequest {
    pub score: f64,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

/// What a student sees of their own graded record.
#[derive(Debug, Clone, Serialize)]
pub struct ExamResult {
    pub exam_data_id: i64,
    pub exam_id: i64,
    pub title: String,
    pub course: String,
    pub status: ExamDataStatus,
    pub score: f64,
    pub comment: String,
}

/// An ExamData row together with the latest answer and grading remark.
#[derive(Debug, Clone, Serialize)]
pub struct ExamDataDetail {
    #[serde(flatten)]
    pub exam_data: ExamData,
    pub answer: Option<String>,
    pub grading_comment: Option<String>,
}

/// Student dashboard rollup computed from the student's ExamData.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssignmentSummary {
    pub assigned: usize,
    pub pending: usize,
    pub graded: usize,
    pub average_score: f64,
}

impl AssignmentSummary {
    pub fn from_rows(rows: &[ExamData]) -> Self {
        let mut summary = AssignmentSummary::default();
        let mut graded_total = 0.0;

        for row in rows {
            match row.status {
                ExamDataStatus::Assigned => summary.assigned += 1,
                ExamDataStatus::Pending => summary.pending += 1,
                ExamDataStatus::Approved => {
                    summary.graded += 1;
                    graded_total += row.total_score;
                }
                ExamDataStatus::Rejected => {}
            }
        }

        if summary.graded > 0 {
            summary.average_score = graded_total / summary.graded as f64;
        }
        summary
    }
}
