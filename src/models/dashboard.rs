// src/models/dashboard.rs

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{
    exam::Exam,
    exam_data::{AssignmentSummary, ExamData},
    paper::Paper,
    user::User,
};

/// Role-dependent rollup returned by `GET /api/dashboard`.
/// The optional blocks are only present for the role that owns them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardStats {
    pub total_papers: usize,
    pub approved_papers: usize,
    pub pending_papers: usize,
    pub rejected_papers: usize,
    pub recent_papers: Vec<Exam>,
    pub pending_paper_list: Vec<Exam>,
    pub papers_by_subject: BTreeMap<String, usize>,
    pub average_score: f64,
    pub total_students: usize,
    pub exam_data_list: Vec<ExamData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_summary: Option<AssignmentSummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub grading_queue: Option<Vec<ExamData>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub papers: Option<Vec<Paper>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<User>>,
}
