// src/services/exam.rs

use std::sync::Arc;

use crate::{
    error::AppError,
    models::{
        comment::{Comment, CommentFilter, CommentKind, NewComment},
        exam::{CreateExamRequest, Exam, ExamAction, ExamChanges, ExamFilter, ExamStatus, NewExam, UpdateExamRequest},
        paper::PaperStatus,
        user::{Caller, Role},
    },
    services::{grading::assign_students, load_exam, require_creator, require_role},
    store::Store,
    utils::sanitize::plain_text,
};

/// Exam lifecycle: authoring, review and publication.
#[derive(Clone)]
pub struct ExamService {
    store: Arc<dyn Store>,
}

impl ExamService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Creates a draft exam owned by the calling teacher.
    ///
    /// A request pre-set to `published` skips review: the exam is stored as
    /// published and assigned to every student right away.
    pub async fn create(&self, caller: Caller, req: CreateExamRequest) -> Result<Exam, AppError> {
        require_role(caller, Role::Teacher, "create exams")?;

        let status = match req.status {
            None | Some(ExamStatus::Draft) => ExamStatus::Draft,
            Some(ExamStatus::Published) => ExamStatus::Published,
            Some(other) => {
                return Err(AppError::BadRequest(format!(
                    "A new exam cannot start in status '{}'",
                    other
                )));
            }
        };

        if req.end_time < req.start_time {
            return Err(AppError::BadRequest(
                "End time must not be before start time".to_string(),
            ));
        }

        let exam = self
            .store
            .create_exam(NewExam {
                title: req.title,
                description: req.description,
                course: req.course,
                start_time: req.start_time,
                end_time: req.end_time,
                creator_id: caller.id,
                status,
                total_score: req.total_score,
            })
            .await?;

        tracing::info!(exam_id = exam.id, creator_id = caller.id, status = %exam.status, "exam created");

        if exam.status == ExamStatus::Published {
            let assigned = assign_students(self.store.as_ref(), &exam, &[]).await?;
            tracing::info!(exam_id = exam.id, assigned, "quick-published exam assigned");
        }

        Ok(exam)
    }

    pub async fn update(&self, caller: Caller, id: i64, req: UpdateExamRequest) -> Result<Exam, AppError> {
        let exam = load_exam(self.store.as_ref(), id).await?;
        require_creator(caller, &exam)?;
        require_editable(&exam)?;

        let start = req.start_time.unwrap_or(exam.start_time);
        let end = req.end_time.unwrap_or(exam.end_time);
        if end < start {
            return Err(AppError::BadRequest(
                "End time must not be before start time".to_string(),
            ));
        }

        self.store
            .update_exam(
                id,
                ExamChanges {
                    title: req.title,
                    description: req.description,
                    course: req.course,
                    start_time: req.start_time,
                    end_time: req.end_time,
                    total_score: req.total_score,
                    ..Default::default()
                },
            )
            .await
    }

    /// Deletes an editable exam owned by the caller, with everything hanging off it.
    pub async fn delete(&self, caller: Caller, id: i64) -> Result<(), AppError> {
        let exam = load_exam(self.store.as_ref(), id).await?;
        require_creator(caller, &exam)?;
        require_editable(&exam)?;

        cascade_delete_exam(self.store.as_ref(), id).await
    }

    /// Admin delete, allowed in any status.
    pub async fn force_delete(&self, caller: Caller, id: i64) -> Result<(), AppError> {
        require_role(caller, Role::Admin, "force-delete exams")?;
        load_exam(self.store.as_ref(), id).await?;

        cascade_delete_exam(self.store.as_ref(), id).await
    }

    pub async fn submit(&self, caller: Caller, id: i64) -> Result<Exam, AppError> {
        let exam = load_exam(self.store.as_ref(), id).await?;
        require_creator(caller, &exam)?;

        self.transition(&exam, ExamAction::Submit, None).await
    }

    /// Approves a pending exam. A non-empty comment is kept as a review note.
    pub async fn approve(&self, caller: Caller, id: i64, comment: Option<String>) -> Result<Exam, AppError> {
        require_role(caller, Role::Admin, "approve exams")?;
        let exam = load_exam(self.store.as_ref(), id).await?;
        exam.status.apply(ExamAction::Approve)?;

        let comment = comment.map(|c| plain_text(&c)).filter(|c| !c.is_empty());
        if let Some(content) = comment {
            self.append_review(caller, id, content).await?;
        }

        self.transition(&exam, ExamAction::Approve, Some(caller.id)).await
    }

    /// Rejects a pending exam. The reason is mandatory.
    pub async fn reject(&self, caller: Caller, id: i64, comment: Option<String>) -> Result<Exam, AppError> {
        require_role(caller, Role::Admin, "reject exams")?;
        let exam = load_exam(self.store.as_ref(), id).await?;

        let content = comment
            .map(|c| plain_text(&c))
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::BadRequest("A rejection comment is required".to_string()))?;

        exam.status.apply(ExamAction::Reject)?;
        self.append_review(caller, id, content).await?;

        self.transition(&exam, ExamAction::Reject, Some(caller.id)).await
    }

    /// Publishes an approved exam and assigns it to every student.
    pub async fn publish(&self, caller: Caller, id: i64) -> Result<Exam, AppError> {
        require_role(caller, Role::Admin, "publish exams")?;
        let exam = load_exam(self.store.as_ref(), id).await?;

        let updated = self.transition(&exam, ExamAction::Publish, None).await?;
        let assigned = assign_students(self.store.as_ref(), &updated, &[]).await?;
        tracing::info!(exam_id = id, assigned, "published exam assigned");

        Ok(updated)
    }

    pub async fn get(&self, caller: Caller, id: i64) -> Result<Exam, AppError> {
        let exam = load_exam(self.store.as_ref(), id).await?;
        if caller.role == Role::Student && exam.status != ExamStatus::Published {
            return Err(AppError::NotFound(format!("Exam {} not found", id)));
        }
        Ok(exam)
    }

    /// Exams created by the caller.
    pub async fn list_mine(&self, caller: Caller) -> Result<Vec<Exam>, AppError> {
        self.store
            .list_exams(&ExamFilter {
                creator_id: Some(caller.id),
                ..Default::default()
            })
            .await
    }

    /// The admin review queue.
    pub async fn list_pending(&self, caller: Caller) -> Result<Vec<Exam>, AppError> {
        require_role(caller, Role::Admin, "view the review queue")?;
        self.list_by_status(ExamStatus::Pending).await
    }

    pub async fn list_published(&self) -> Result<Vec<Exam>, AppError> {
        self.list_by_status(ExamStatus::Published).await
    }

    pub async fn list_by_status(&self, status: ExamStatus) -> Result<Vec<Exam>, AppError> {
        self.store
            .list_exams(&ExamFilter {
                status: Some(status),
                ..Default::default()
            })
            .await
    }

    pub async fn list_all(&self, caller: Caller, filter: ExamFilter) -> Result<Vec<Exam>, AppError> {
        require_role(caller, Role::Admin, "list all exams")?;
        self.store.list_exams(&filter).await
    }

    /// Free review note by the exam's creator or an admin.
    pub async fn add_review_comment(&self, caller: Caller, id: i64, content: &str) -> Result<Comment, AppError> {
        let exam = load_exam(self.store.as_ref(), id).await?;
        if caller.role != Role::Admin {
            require_creator(caller, &exam)?;
        }

        let content = plain_text(content);
        if content.is_empty() {
            return Err(AppError::BadRequest("Comment must not be empty".to_string()));
        }

        self.append_review(caller, id, content).await
    }

    /// Comments visible to the caller. Only admins and the creator see answers
    /// and grading remarks; everyone else sees review notes.
    pub async fn list_comments(&self, caller: Caller, id: i64) -> Result<Vec<Comment>, AppError> {
        let exam = self.get(caller, id).await?;

        let kind = if caller.role == Role::Admin || exam.creator_id == caller.id {
            None
        } else {
            Some(CommentKind::Review)
        };

        self.store
            .list_comments(&CommentFilter {
                exam_id: Some(id),
                kind,
                ..Default::default()
            })
            .await
    }

    async fn transition(&self, exam: &Exam, action: ExamAction, approver_id: Option<i64>) -> Result<Exam, AppError> {
        let next = exam.status.apply(action)?;

        let updated = self
            .store
            .update_exam(
                exam.id,
                ExamChanges {
                    status: Some(next),
                    approver_id,
                    ..Default::default()
                },
            )
            .await?;

        if let Some(paper_status) = PaperStatus::mirroring(next) {
            self.store.set_paper_status_for_exam(exam.id, paper_status).await?;
        }

        tracing::info!(exam_id = exam.id, from = %exam.status, to = %next, "exam {}", action);
        Ok(updated)
    }

    async fn append_review(&self, caller: Caller, exam_id: i64, content: String) -> Result<Comment, AppError> {
        self.store
            .create_comment(NewComment {
                exam_id,
                user_id: caller.id,
                kind: CommentKind::Review,
                exam_data_id: None,
                content,
            })
            .await
    }
}

fn require_editable(exam: &Exam) -> Result<(), AppError> {
    if exam.status.is_editable() {
        Ok(())
    } else {
        Err(AppError::InvalidState(format!(
            "Exam in status '{}' can no longer be modified",
            exam.status
        )))
    }
}

/// Removes an exam and its dependents in the order ExamData, Comment, Paper,
/// Exam. Dependent failures are logged and skipped; only a failure to remove
/// the exam itself is returned.
pub(crate) async fn cascade_delete_exam(store: &dyn Store, exam_id: i64) -> Result<(), AppError> {
    if let Err(e) = store.delete_exam_data_by_exam(exam_id).await {
        tracing::warn!(exam_id, "failed to delete exam data: {}", e);
    }
    if let Err(e) = store.delete_comments_by_exam(exam_id).await {
        tracing::warn!(exam_id, "failed to delete comments: {}", e);
    }
    if let Err(e) = store.delete_papers_by_exam(exam_id).await {
        tracing::warn!(exam_id, "failed to delete papers: {}", e);
    }

    if !store.delete_exam(exam_id).await? {
        return Err(AppError::NotFound(format!("Exam {} not found", exam_id)));
    }

    tracing::info!(exam_id, "exam deleted");
    Ok(())
}
