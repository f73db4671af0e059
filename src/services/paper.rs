// src/services/paper.rs

use std::sync::Arc;

use chrono::{SubsecRound, Utc};

use crate::{
    error::AppError,
    models::{
        exam::{Exam, ExamStatus},
        paper::{CreatePaperRequest, NewPaper, Paper, PaperChanges, PaperSignature, PaperStatus, UpdatePaperRequest},
        user::{Caller, Role},
    },
    services::{load_exam, require_creator},
    store::Store,
    utils::{sanitize::clean_html, signature::PaperSigner},
};

/// Paper content management plus signing and verification.
#[derive(Clone)]
pub struct PaperService {
    store: Arc<dyn Store>,
    signer: PaperSigner,
}

impl PaperService {
    pub fn new(store: Arc<dyn Store>, signer: PaperSigner) -> Self {
        Self { store, signer }
    }

    pub async fn create(&self, caller: Caller, req: CreatePaperRequest) -> Result<Paper, AppError> {
        let exam = load_exam(self.store.as_ref(), req.exam_id).await?;
        require_creator(caller, &exam)?;
        require_editable_exam(&exam)?;
        check_scores(req.total_score, req.passing_score)?;

        let paper = self
            .store
            .create_paper(NewPaper {
                exam_id: req.exam_id,
                title: req.title,
                content: clean_html(&req.content),
                questions: req.questions,
                duration: req.duration,
                total_score: req.total_score,
                passing_score: req.passing_score,
            })
            .await?;

        tracing::info!(paper_id = paper.id, exam_id = exam.id, "paper created");
        Ok(paper)
    }

    pub async fn get(&self, caller: Caller, id: i64) -> Result<Paper, AppError> {
        let paper = self.load(id).await?;
        let exam = load_exam(self.store.as_ref(), paper.exam_id).await?;
        require_readable(caller, &exam)?;
        Ok(paper)
    }

    /// Papers of one exam. Students only see papers of published exams.
    pub async fn list_for_exam(&self, caller: Caller, exam_id: i64) -> Result<Vec<Paper>, AppError> {
        let exam = load_exam(self.store.as_ref(), exam_id).await?;
        require_readable(caller, &exam)?;
        self.store.list_papers(Some(exam_id)).await
    }

    pub async fn update(&self, caller: Caller, id: i64, req: UpdatePaperRequest) -> Result<Paper, AppError> {
        let paper = self.load(id).await?;
        let exam = load_exam(self.store.as_ref(), paper.exam_id).await?;
        require_creator(caller, &exam)?;
        require_editable_exam(&exam)?;
        check_scores(
            req.total_score.unwrap_or(paper.total_score),
            req.passing_score.unwrap_or(paper.passing_score),
        )?;

        self.store
            .update_paper(
                id,
                PaperChanges {
                    title: req.title,
                    content: req.content.as_deref().map(clean_html),
                    questions: req.questions,
                    duration: req.duration,
                    total_score: req.total_score,
                    passing_score: req.passing_score,
                },
            )
            .await
    }

    pub async fn delete(&self, caller: Caller, id: i64) -> Result<(), AppError> {
        let paper = self.load(id).await?;
        let exam = load_exam(self.store.as_ref(), paper.exam_id).await?;
        require_creator(caller, &exam)?;
        require_editable_exam(&exam)?;

        if !self.store.delete_paper(id).await? {
            return Err(AppError::NotFound(format!("Paper {} not found", id)));
        }
        tracing::info!(paper_id = id, "paper deleted");
        Ok(())
    }

    /// Signs an approved paper on behalf of the exam's creator or an admin.
    pub async fn sign(&self, caller: Caller, id: i64) -> Result<Paper, AppError> {
        let paper = self.load(id).await?;

        if paper.status != PaperStatus::Approved {
            return Err(AppError::InvalidState(format!(
                "Only approved papers can be signed (status '{}')",
                paper.status
            )));
        }

        let exam = load_exam(self.store.as_ref(), paper.exam_id).await?;
        if caller.role != Role::Admin {
            require_creator(caller, &exam)?;
        }

        // The signed payload carries whole seconds.
        let signed_at = Utc::now().trunc_subsecs(0);
        let signature = self.signer.sign(&paper, signed_at)?;

        let signed = self
            .store
            .set_paper_signature(
                id,
                PaperSignature {
                    signature,
                    signed_at,
                    signed_by: caller.id,
                },
            )
            .await?;

        tracing::info!(paper_id = id, signed_by = caller.id, "paper signed");
        Ok(signed)
    }

    /// Recomputes the stored signature. A mismatch is `Ok(false)`.
    pub async fn verify(&self, caller: Caller, id: i64) -> Result<bool, AppError> {
        let paper = self.load(id).await?;
        let exam = load_exam(self.store.as_ref(), paper.exam_id).await?;
        require_readable(caller, &exam)?;

        let (Some(signature), Some(signed_at)) = (paper.signature.as_deref(), paper.signed_at) else {
            return Err(AppError::InvalidState("paper not signed".to_string()));
        };

        let valid = self.signer.verify(&paper, signed_at, signature)?;
        if !valid {
            tracing::warn!(paper_id = id, "paper signature mismatch");
        }
        Ok(valid)
    }

    async fn load(&self, id: i64) -> Result<Paper, AppError> {
        self.store
            .get_paper(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Paper {} not found", id)))
    }
}

fn require_editable_exam(exam: &Exam) -> Result<(), AppError> {
    if exam.status.is_editable() {
        Ok(())
    } else {
        Err(AppError::InvalidState(format!(
            "Papers of an exam in status '{}' cannot be changed",
            exam.status
        )))
    }
}

fn require_readable(caller: Caller, exam: &Exam) -> Result<(), AppError> {
    match caller.role {
        Role::Admin => Ok(()),
        Role::Teacher => require_creator(caller, exam),
        Role::Student if exam.status == ExamStatus::Published => Ok(()),
        Role::Student => Err(AppError::NotFound(format!("Exam {} not found", exam.id))),
    }
}

fn check_scores(total: f64, passing: f64) -> Result<(), AppError> {
    if passing > total {
        return Err(AppError::BadRequest(
            "Passing score must not exceed total score".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::{World, world};

    fn paper_request(exam_id: i64) -> CreatePaperRequest {
        CreatePaperRequest {
            exam_id,
            title: "Paper A".into(),
            content: "Solve for x".into(),
            questions: r#"[{"q":"x+1=2"}]"#.into(),
            duration: 45,
            total_score: 100.0,
            passing_score: 60.0,
        }
    }

    /// A paper whose exam has been approved.
    async fn approved_paper(w: &World, teacher: Caller, admin: Caller) -> Paper {
        let exam = w.draft(teacher, "Algebra").await;
        let paper = w.services.papers.create(teacher, paper_request(exam.id)).await.unwrap();
        w.services.exams.submit(teacher, exam.id).await.unwrap();
        w.services.exams.approve(admin, exam.id, None).await.unwrap();
        w.store.get_paper(paper.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn sign_requires_approved_paper() {
        let w = world();
        let (_, teacher) = w.user("t", Role::Teacher).await;
        let exam = w.draft(teacher, "Algebra").await;
        let paper = w.services.papers.create(teacher, paper_request(exam.id)).await.unwrap();

        assert!(matches!(
            w.services.papers.sign(teacher, paper.id).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            w.services.papers.sign(teacher, 999).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn sign_then_verify() {
        let w = world();
        let (_, teacher) = w.user("t", Role::Teacher).await;
        let (_, admin) = w.user("a", Role::Admin).await;
        let paper = approved_paper(&w, teacher, admin).await;

        let signed = w.services.papers.sign(teacher, paper.id).await.unwrap();
        assert_eq!(signed.signed_by, Some(teacher.id));
        assert!(signed.signature.is_some());
        assert!(w.services.papers.verify(teacher, paper.id).await.unwrap());
    }

    #[tokio::test]
    async fn only_creator_or_admin_signs() {
        let w = world();
        let (_, teacher) = w.user("t", Role::Teacher).await;
        let (_, other) = w.user("t2", Role::Teacher).await;
        let (_, admin) = w.user("a", Role::Admin).await;
        let paper = approved_paper(&w, teacher, admin).await;

        assert!(matches!(
            w.services.papers.sign(other, paper.id).await,
            Err(AppError::Forbidden(_))
        ));
        w.services.papers.sign(admin, paper.id).await.unwrap();
    }

    #[tokio::test]
    async fn tampering_invalidates_signature() {
        let w = world();
        let (_, teacher) = w.user("t", Role::Teacher).await;
        let (_, admin) = w.user("a", Role::Admin).await;
        let paper = approved_paper(&w, teacher, admin).await;
        w.services.papers.sign(teacher, paper.id).await.unwrap();

        w.store
            .update_paper(
                paper.id,
                PaperChanges {
                    content: Some("Solve for y".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(!w.services.papers.verify(teacher, paper.id).await.unwrap());
    }

    #[tokio::test]
    async fn verify_unsigned_or_missing() {
        let w = world();
        let (_, teacher) = w.user("t", Role::Teacher).await;
        let exam = w.draft(teacher, "Algebra").await;
        let paper = w.services.papers.create(teacher, paper_request(exam.id)).await.unwrap();

        assert!(matches!(
            w.services.papers.verify(teacher, paper.id).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            w.services.papers.verify(teacher, 12345).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn passing_score_cannot_exceed_total() {
        let w = world();
        let (_, teacher) = w.user("t", Role::Teacher).await;
        let exam = w.draft(teacher, "Algebra").await;
        let mut req = paper_request(exam.id);
        req.passing_score = 120.0;

        assert!(matches!(
            w.services.papers.create(teacher, req).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn papers_frozen_after_submit() {
        let w = world();
        let (_, teacher) = w.user("t", Role::Teacher).await;
        let exam = w.draft(teacher, "Algebra").await;
        let paper = w.services.papers.create(teacher, paper_request(exam.id)).await.unwrap();
        w.services.exams.submit(teacher, exam.id).await.unwrap();

        assert!(matches!(
            w.services.papers.update(teacher, paper.id, UpdatePaperRequest::default()).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            w.services.papers.delete(teacher, paper.id).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            w.services.papers.create(teacher, paper_request(exam.id)).await,
            Err(AppError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn students_read_papers_of_published_exams_only() {
        let w = world();
        let (_, teacher) = w.user("t", Role::Teacher).await;
        let (_, admin) = w.user("a", Role::Admin).await;
        let (_, student) = w.user("s", Role::Student).await;
        let paper = approved_paper(&w, teacher, admin).await;

        assert!(matches!(
            w.services.papers.list_for_exam(student, paper.exam_id).await,
            Err(AppError::NotFound(_))
        ));

        w.services.exams.publish(admin, paper.exam_id).await.unwrap();
        let papers = w.services.papers.list_for_exam(student, paper.exam_id).await.unwrap();
        assert_eq!(papers.len(), 1);
    }

    #[tokio::test]
    async fn verify_is_hidden_like_reads() {
        let w = world();
        let (_, teacher) = w.user("t", Role::Teacher).await;
        let (_, other) = w.user("t2", Role::Teacher).await;
        let (_, admin) = w.user("a", Role::Admin).await;
        let (_, student) = w.user("s", Role::Student).await;
        let paper = approved_paper(&w, teacher, admin).await;
        w.services.papers.sign(teacher, paper.id).await.unwrap();

        assert!(matches!(
            w.services.papers.verify(student, paper.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            w.services.papers.verify(other, paper.id).await,
            Err(AppError::Forbidden(_))
        ));

        w.services.exams.publish(admin, paper.exam_id).await.unwrap();
        assert!(w.services.papers.verify(student, paper.id).await.unwrap());
    }

    #[tokio::test]
    async fn paper_content_markup_is_cleaned() {
        let w = world();
        let (_, teacher) = w.user("t", Role::Teacher).await;
        let exam = w.draft(teacher, "Algebra").await;
        let mut req = paper_request(exam.id);
        req.content = "<p>Solve</p><script>alert(1)</script>".into();

        let paper = w.services.papers.create(teacher, req).await.unwrap();
        assert_eq!(paper.content, "<p>Solve</p>");
    }
}
