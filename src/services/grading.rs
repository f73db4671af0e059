// src/services/grading.rs

use std::sync::Arc;

use crate::{
    error::AppError,
    models::{
        comment::{CommentFilter, CommentKind, NewComment},
        exam::{Exam, ExamChanges, ExamStatus},
        exam_data::{ExamData, ExamDataChanges, ExamDataDetail, ExamDataFilter, ExamDataStatus, ExamResult, NewExamData},
        user::{Caller, Role, StudentSummary},
    },
    services::{load_exam, require_role},
    store::Store,
    utils::sanitize::plain_text,
};

/// Shown in place of the grading remark until the submission is graded.
const RESULT_PENDING_MESSAGE: &str = "Your submission has not been graded yet.";

/// Assigns `exam` to the given students, or to every student when `student_ids`
/// is empty. Ids that are unknown or not students are skipped. Existing
/// assignments are left alone. Returns the number of rows created.
pub(crate) async fn assign_students(store: &dyn Store, exam: &Exam, student_ids: &[i64]) -> Result<usize, AppError> {
    let students = store.list_users(Some(Role::Student)).await?;

    let mut created = 0;
    for student in students
        .iter()
        .filter(|s| student_ids.is_empty() || student_ids.contains(&s.id))
    {
        let (_, inserted) = store
            .find_or_create_exam_data(NewExamData {
                exam_id: exam.id,
                student_id: student.id,
                title: exam.title.clone(),
                course: exam.course.clone(),
            })
            .await?;
        if inserted {
            created += 1;
        }
    }

    Ok(created)
}

/// Distribution, submission and grading of per-student exam records.
#[derive(Clone)]
pub struct GradingService {
    store: Arc<dyn Store>,
}

impl GradingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Assigns an approved or published exam to students. An approved exam is
    /// published as part of distribution.
    pub async fn distribute(&self, caller: Caller, exam_id: i64, student_ids: Vec<i64>) -> Result<usize, AppError> {
        let exam = load_exam(self.store.as_ref(), exam_id).await?;
        if caller.role != Role::Admin && exam.creator_id != caller.id {
            return Err(AppError::Forbidden(
                "Only the exam's creator or an admin can distribute it".to_string(),
            ));
        }

        let exam = match exam.status {
            ExamStatus::Published => exam,
            ExamStatus::Approved => {
                self.store
                    .update_exam(
                        exam_id,
                        ExamChanges {
                            status: Some(ExamStatus::Published),
                            ..Default::default()
                        },
                    )
                    .await?
            }
            status => {
                return Err(AppError::InvalidState(format!(
                    "Exam in status '{}' cannot be distributed",
                    status
                )));
            }
        };

        let assigned = assign_students(self.store.as_ref(), &exam, &student_ids).await?;
        tracing::info!(exam_id, assigned, "exam distributed");
        Ok(assigned)
    }

    /// A student opens a published exam, creating their record on first visit.
    pub async fn open_exam(&self, caller: Caller, exam_id: i64) -> Result<ExamData, AppError> {
        require_role(caller, Role::Student, "take exams")?;
        let exam = self.published_exam(exam_id).await?;

        let (data, created) = self.record_for(&exam, caller.id).await?;
        if created {
            tracing::info!(exam_id, student_id = caller.id, "exam data created on open");
        }
        Ok(data)
    }

    /// Stores an answer and moves the record to `pending`. The newest answer
    /// comment is the current answer.
    pub async fn submit_answer(&self, caller: Caller, exam_id: i64, answer: &str) -> Result<ExamData, AppError> {
        require_role(caller, Role::Student, "submit answers")?;

        let answer = plain_text(answer);
        if answer.is_empty() {
            return Err(AppError::BadRequest("Answer must not be empty".to_string()));
        }

        let exam = self.published_exam(exam_id).await?;
        let (data, _) = self.record_for(&exam, caller.id).await?;

        if data.status == ExamDataStatus::Approved {
            return Err(AppError::InvalidState(
                "This exam has already been graded".to_string(),
            ));
        }

        self.store
            .create_comment(NewComment {
                exam_id,
                user_id: caller.id,
                kind: CommentKind::Answer,
                exam_data_id: Some(data.id),
                content: answer,
            })
            .await?;

        let updated = self
            .store
            .update_exam_data(
                data.id,
                ExamDataChanges {
                    status: Some(ExamDataStatus::Pending),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(exam_id, student_id = caller.id, exam_data_id = data.id, "answer submitted");
        Ok(updated)
    }

    /// Grades a submission. Regrading an already graded record is allowed.
    pub async fn grade(
        &self,
        caller: Caller,
        exam_data_id: i64,
        score: f64,
        comment: Option<String>,
    ) -> Result<ExamData, AppError> {
        require_role(caller, Role::Teacher, "grade exams")?;

        if !score.is_finite() || !(0.0..=100.0).contains(&score) {
            return Err(AppError::BadRequest(
                "Score must be between 0 and 100".to_string(),
            ));
        }

        let data = self.load_exam_data(exam_data_id).await?;
        self.require_grader(caller, &data).await?;

        match data.status {
            ExamDataStatus::Pending | ExamDataStatus::Approved => {}
            ExamDataStatus::Assigned | ExamDataStatus::Rejected => {
                return Err(AppError::InvalidState(
                    "There is no submission to grade".to_string(),
                ));
            }
        }

        let updated = self
            .store
            .update_exam_data(
                exam_data_id,
                ExamDataChanges {
                    status: Some(ExamDataStatus::Approved),
                    total_score: Some(score),
                    approver_id: Some(caller.id),
                },
            )
            .await?;

        let comment = comment.map(|c| plain_text(&c)).filter(|c| !c.is_empty());
        if let Some(content) = comment {
            self.store
                .create_comment(NewComment {
                    exam_id: data.exam_id,
                    user_id: caller.id,
                    kind: CommentKind::Grading,
                    exam_data_id: Some(exam_data_id),
                    content,
                })
                .await?;
        }

        tracing::info!(exam_data_id, grader_id = caller.id, score, "submission graded");
        Ok(updated)
    }

    /// A student's view of their own record. Score and remark are withheld
    /// until the record is graded.
    pub async fn result(&self, caller: Caller, exam_data_id: i64) -> Result<ExamResult, AppError> {
        let data = self.load_exam_data(exam_data_id).await?;
        if data.student_id != caller.id {
            return Err(AppError::Forbidden(
                "You can only view your own results".to_string(),
            ));
        }

        let exam = load_exam(self.store.as_ref(), data.exam_id).await?;
        if exam.status != ExamStatus::Published {
            return Err(AppError::InvalidState("Exam is not published".to_string()));
        }

        let (score, comment) = if data.status == ExamDataStatus::Approved {
            let remark = self.grading_comment(&data).await?.unwrap_or_default();
            (data.total_score, remark)
        } else {
            (0.0, RESULT_PENDING_MESSAGE.to_string())
        };

        Ok(ExamResult {
            exam_data_id: data.id,
            exam_id: data.exam_id,
            title: data.title,
            course: data.course,
            status: data.status,
            score,
            comment,
        })
    }

    /// Teacher view of one record with the current answer.
    pub async fn review(&self, caller: Caller, exam_data_id: i64) -> Result<ExamDataDetail, AppError> {
        require_role(caller, Role::Teacher, "review submissions")?;
        let data = self.load_exam_data(exam_data_id).await?;
        self.require_grader(caller, &data).await?;

        self.detail(data).await
    }

    pub async fn assignments(&self, caller: Caller) -> Result<Vec<ExamData>, AppError> {
        require_role(caller, Role::Student, "view assignments")?;
        self.store
            .list_exam_data(&ExamDataFilter {
                student_id: Some(caller.id),
                ..Default::default()
            })
            .await
    }

    pub async fn list_students(&self, caller: Caller) -> Result<Vec<StudentSummary>, AppError> {
        require_staff(caller)?;
        let students = self.store.list_users(Some(Role::Student)).await?;
        Ok(students.into_iter().map(StudentSummary::from).collect())
    }

    /// One student's records with the current answer and remark per row.
    pub async fn student_exams(&self, caller: Caller, student_id: i64) -> Result<Vec<ExamDataDetail>, AppError> {
        require_staff(caller)?;

        match self.store.get_user(student_id).await? {
            Some(user) if user.role == Role::Student => {}
            _ => return Err(AppError::NotFound(format!("Student {} not found", student_id))),
        }

        let rows = self
            .store
            .list_exam_data(&ExamDataFilter {
                student_id: Some(student_id),
                ..Default::default()
            })
            .await?;

        let mut details = Vec::with_capacity(rows.len());
        for row in rows {
            details.push(self.detail(row).await?);
        }
        Ok(details)
    }

    async fn published_exam(&self, exam_id: i64) -> Result<Exam, AppError> {
        let exam = load_exam(self.store.as_ref(), exam_id).await?;
        if exam.status != ExamStatus::Published {
            return Err(AppError::InvalidState("Exam is not published".to_string()));
        }
        Ok(exam)
    }

    async fn record_for(&self, exam: &Exam, student_id: i64) -> Result<(ExamData, bool), AppError> {
        self.store
            .find_or_create_exam_data(NewExamData {
                exam_id: exam.id,
                student_id,
                title: exam.title.clone(),
                course: exam.course.clone(),
            })
            .await
    }

    async fn load_exam_data(&self, id: i64) -> Result<ExamData, AppError> {
        self.store
            .get_exam_data(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam data {} not found", id)))
    }

    /// The grader must have created the exam or be the student's teacher.
    async fn require_grader(&self, caller: Caller, data: &ExamData) -> Result<(), AppError> {
        let exam = load_exam(self.store.as_ref(), data.exam_id).await?;
        if exam.creator_id == caller.id {
            return Ok(());
        }

        let student = self.store.get_user(data.student_id).await?;
        if student.and_then(|s| s.teacher_id) == Some(caller.id) {
            return Ok(());
        }

        Err(AppError::Forbidden(
            "Only the exam's creator or the student's teacher can grade this".to_string(),
        ))
    }

    async fn detail(&self, data: ExamData) -> Result<ExamDataDetail, AppError> {
        let answer = self
            .store
            .list_comments(&CommentFilter {
                exam_data_id: Some(data.id),
                kind: Some(CommentKind::Answer),
                ..Default::default()
            })
            .await?
            .pop()
            .map(|c| c.content);
        let grading_comment = self.grading_comment(&data).await?;

        Ok(ExamDataDetail {
            exam_data: data,
            answer,
            grading_comment,
        })
    }

    /// Newest grading remark written by the record's approver.
    async fn grading_comment(&self, data: &ExamData) -> Result<Option<String>, AppError> {
        let Some(approver_id) = data.approver_id else {
            return Ok(None);
        };

        Ok(self
            .store
            .list_comments(&CommentFilter {
                exam_data_id: Some(data.id),
                user_id: Some(approver_id),
                kind: Some(CommentKind::Grading),
                ..Default::default()
            })
            .await?
            .pop()
            .map(|c| c.content))
    }
}

fn require_staff(caller: Caller) -> Result<(), AppError> {
    match caller.role {
        Role::Teacher | Role::Admin => Ok(()),
        Role::Student => Err(AppError::Forbidden(
            "Only teachers and admins can view students".to_string(),
        )),
    }
}
