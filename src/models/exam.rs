// src/models/exam.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Lifecycle status of an exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Published,
}

text_enum!(ExamStatus, "exam status", {
    Draft => "draft",
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Published => "published",
});

/// The transitions an exam can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamAction {
    Submit,
    Approve,
    Reject,
    Publish,
}

text_enum!(ExamAction, "exam action", {
    Submit => "submit",
    Approve => "approve",
    Reject => "reject",
    Publish => "publish",
});

impl ExamStatus {
    /// Returns the status reached by applying `action`, or `InvalidState`
    /// when the transition is not part of the lifecycle.
    ///
    /// ```text
    /// draft    --submit--> pending
    /// rejected --submit--> pending
    /// pending  --approve-> approved
    /// pending  --reject--> rejected
    /// approved --publish-> published
    /// ```
    pub fn apply(self, action: ExamAction) -> Result<ExamStatus, AppError> {
        match (self, action) {
            (ExamStatus::Draft | ExamStatus::Rejected, ExamAction::Submit) => Ok(ExamStatus::Pending),
            (ExamStatus::Pending, ExamAction::Approve) => Ok(ExamStatus::Approved),
            (ExamStatus::Pending, ExamAction::Reject) => Ok(ExamStatus::Rejected),
            (ExamStatus::Approved, ExamAction::Publish) => Ok(ExamStatus::Published),
            (status, action) => Err(AppError::InvalidState(format!(
                "Cannot {} an exam in status '{}'",
                action, status
            ))),
        }
    }

    /// Content (fields and papers) may only change while the exam is editable.
    pub fn is_editable(self) -> bool {
        matches!(self, ExamStatus::Draft | ExamStatus::Rejected)
    }
}

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub course: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    /// The teacher who owns the exam.
    pub creator_id: i64,

    #[sqlx(try_from = "String")]
    pub status: ExamStatus,

    /// Admin who approved or rejected it.
    pub approver_id: Option<i64>,

    pub total_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for the store.
#[derive(Debug, Clone)]
pub struct NewExam {
    pub title: String,
    pub description: String,
    pub course: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub creator_id: i64,
    pub status: ExamStatus,
    pub total_score: f64,
}

/// Column changes applied by `Store::update_exam`. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ExamChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub course: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_score: Option<f64>,
    pub status: Option<ExamStatus>,
    pub approver_id: Option<i64>,
}

/// Pure filter used by every exam listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExamFilter {
    pub creator_id: Option<i64>,
    pub status: Option<ExamStatus>,
    pub course: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters."))]
    pub title: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 100))]
    pub course: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub total_score: f64,
    /// Only `published` is accepted here (the quick-publish shortcut).
    pub status: Option<ExamStatus>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub course: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[validate(range(min = 0.0))]
    pub total_score: Option<f64>,
}

/// Body of approve/reject calls.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [ExamStatus; 5] = [
        ExamStatus::Draft,
        ExamStatus::Pending,
        ExamStatus::Approved,
        ExamStatus::Rejected,
        ExamStatus::Published,
    ];

    const ALL_ACTIONS: [ExamAction; 4] = [
        ExamAction::Submit,
        ExamAction::Approve,
        ExamAction::Reject,
        ExamAction::Publish,
    ];

    #[test]
    fn lifecycle_edges() {
        assert_eq!(ExamStatus::Draft.apply(ExamAction::Submit).unwrap(), ExamStatus::Pending);
        assert_eq!(ExamStatus::Rejected.apply(ExamAction::Submit).unwrap(), ExamStatus::Pending);
        assert_eq!(ExamStatus::Pending.apply(ExamAction::Approve).unwrap(), ExamStatus::Approved);
        assert_eq!(ExamStatus::Pending.apply(ExamAction::Reject).unwrap(), ExamStatus::Rejected);
        assert_eq!(ExamStatus::Approved.apply(ExamAction::Publish).unwrap(), ExamStatus::Published);
    }

    #[test]
    fn every_other_pair_is_invalid() {
        let valid = [
            (ExamStatus::Draft, ExamAction::Submit),
            (ExamStatus::Rejected, ExamAction::Submit),
            (ExamStatus::Pending, ExamAction::Approve),
            (ExamStatus::Pending, ExamAction::Reject),
            (ExamStatus::Approved, ExamAction::Publish),
        ];

        for status in ALL_STATUSES {
            for action in ALL_ACTIONS {
                if valid.contains(&(status, action)) {
                    continue;
                }
                assert!(
                    matches!(status.apply(action), Err(AppError::InvalidState(_))),
                    "{} -> {} should be rejected",
                    status,
                    action
                );
            }
        }
    }

    #[test]
    fn published_is_terminal() {
        for action in ALL_ACTIONS {
            assert!(ExamStatus::Published.apply(action).is_err());
        }
    }

    #[test]
    fn only_draft_and_rejected_are_editable() {
        let editable: Vec<_> = ALL_STATUSES.into_iter().filter(|s| s.is_editable()).collect();
        assert_eq!(editable, vec![ExamStatus::Draft, ExamStatus::Rejected]);
    }

    #[test]
    fn status_parses_from_query_text() {
        assert_eq!("published".parse::<ExamStatus>().unwrap(), ExamStatus::Published);
        assert!("archived".parse::<ExamStatus>().is_err());
    }
}
