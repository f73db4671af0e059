// src/models/comment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// What a comment row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentKind {
    /// Approval decision or free review note on an exam.
    Review,
    /// A student's submitted answer.
    Answer,
    /// A teacher's grading remark.
    Grading,
}

text_enum!(CommentKind, "comment kind", {
    Review => "review",
    Answer => "answer",
    Grading => "grading",
});

/// Represents the 'comments' table in the database. Rows are append-only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub exam_id: i64,
    pub user_id: i64,

    #[sqlx(try_from = "String")]
    pub kind: CommentKind,

    /// Set for answer and grading comments.
    pub exam_data_id: Option<i64>,

    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub exam_id: i64,
    pub user_id: i64,
    pub kind: CommentKind,
    pub exam_data_id: Option<i64>,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    pub exam_id: Option<i64>,
    pub user_id: Option<i64>,
    pub exam_data_id: Option<i64>,
    pub kind: Option<CommentKind>,
}

/// DTO for creating a review note.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(
        min = 1,
        max = 2000,
        message = "Comment must be between 1 and 2000 characters"
    ))]
    pub content: String,
}
