// src/store/memory.rs

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    error::AppError,
    models::{
        comment::{Comment, CommentFilter, NewComment},
        exam::{Exam, ExamChanges, ExamFilter, NewExam},
        exam_data::{ExamData, ExamDataChanges, ExamDataFilter, ExamDataStatus, NewExamData},
        paper::{NewPaper, Paper, PaperChanges, PaperSignature, PaperStatus},
        user::{NewUser, Role, User, UserChanges},
    },
    store::{Store, StoreResult},
};

#[derive(Default)]
struct Tables {
    seq: i64,
    users: BTreeMap<i64, User>,
    exams: BTreeMap<i64, Exam>,
    papers: BTreeMap<i64, Paper>,
    exam_data: BTreeMap<i64, ExamData>,
    comments: BTreeMap<i64, Comment>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.seq += 1;
        self.seq
    }
}

/// Process-local store. Every operation runs under a single lock, which makes
/// check-and-insert sequences atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::InternalServerError("memory store lock poisoned".to_string()))
    }
}

fn newest_first<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
    rows
}

fn missing(entity: &str, id: i64) -> AppError {
    AppError::NotFound(format!("{} {} not found", entity, id))
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut t = self.lock()?;
        if t.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                user.username
            )));
        }
        let id = t.next_id();
        let now = Utc::now();
        let row = User {
            id,
            username: user.username,
            password: user.password_hash,
            name: user.name,
            role: user.role,
            teacher_id: user.teacher_id,
            created_at: now,
            updated_at: now,
        };
        t.users.insert(id, row.clone());
        Ok(row)
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        let rows: Vec<User> = self
            .lock()?
            .users
            .values()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .cloned()
            .collect();
        Ok(newest_first(rows, |u| u.id))
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> StoreResult<User> {
        let mut t = self.lock()?;
        let user = t.users.get_mut(&id).ok_or_else(|| missing("User", id))?;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(hash) = changes.password_hash {
            user.password = hash;
        }
        if let Some(teacher_id) = changes.teacher_id {
            user.teacher_id = Some(teacher_id);
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn link_students(&self, teacher_id: i64) -> StoreResult<u64> {
        let mut t = self.lock()?;
        let mut linked = 0;
        for user in t.users.values_mut().filter(|u| u.role == Role::Student) {
            user.teacher_id = Some(teacher_id);
            linked += 1;
        }
        Ok(linked)
    }

    async fn unlink_students(&self, teacher_id: i64) -> StoreResult<u64> {
        let mut t = self.lock()?;
        let mut unlinked = 0;
        for user in t.users.values_mut() {
            if user.role == Role::Student && user.teacher_id == Some(teacher_id) {
                user.teacher_id = None;
                unlinked += 1;
            }
        }
        Ok(unlinked)
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        let mut t = self.lock()?;
        if t.users.remove(&id).is_none() {
            return Ok(false);
        }

        // ON DELETE SET NULL
        for user in t.users.values_mut().filter(|u| u.teacher_id == Some(id)) {
            user.teacher_id = None;
        }
        for exam in t.exams.values_mut().filter(|e| e.approver_id == Some(id)) {
            exam.approver_id = None;
        }
        for data in t.exam_data.values_mut().filter(|d| d.approver_id == Some(id)) {
            data.approver_id = None;
        }
        for paper in t.papers.values_mut().filter(|p| p.signed_by == Some(id)) {
            paper.signed_by = None;
        }
        Ok(true)
    }

    async fn create_exam(&self, exam: NewExam) -> StoreResult<Exam> {
        let mut t = self.lock()?;
        let id = t.next_id();
        let now = Utc::now();
        let row = Exam {
            id,
            title: exam.title,
            description: exam.description,
            course: exam.course,
            start_time: exam.start_time,
            end_time: exam.end_time,
            creator_id: exam.creator_id,
            status: exam.status,
            approver_id: None,
            total_score: exam.total_score,
            created_at: now,
            updated_at: now,
        };
        t.exams.insert(id, row.clone());
        Ok(row)
    }

    async fn get_exam(&self, id: i64) -> StoreResult<Option<Exam>> {
        Ok(self.lock()?.exams.get(&id).cloned())
    }

    async fn list_exams(&self, filter: &ExamFilter) -> StoreResult<Vec<Exam>> {
        let rows: Vec<Exam> = self
            .lock()?
            .exams
            .values()
            .filter(|e| filter.creator_id.is_none_or(|c| e.creator_id == c))
            .filter(|e| filter.status.is_none_or(|s| e.status == s))
            .filter(|e| filter.course.as_ref().is_none_or(|c| &e.course == c))
            .cloned()
            .collect();
        Ok(newest_first(rows, |e| (e.created_at, e.id)))
    }

    async fn update_exam(&self, id: i64, changes: ExamChanges) -> StoreResult<Exam> {
        let mut t = self.lock()?;
        let exam = t.exams.get_mut(&id).ok_or_else(|| missing("Exam", id))?;
        if let Some(title) = changes.title {
            exam.title = title;
        }
        if let Some(description) = changes.description {
            exam.description = description;
        }
        if let Some(course) = changes.course {
            exam.course = course;
        }
        if let Some(start_time) = changes.start_time {
            exam.start_time = start_time;
        }
        if let Some(end_time) = changes.end_time {
            exam.end_time = end_time;
        }
        if let Some(total_score) = changes.total_score {
            exam.total_score = total_score;
        }
        if let Some(status) = changes.status {
            exam.status = status;
        }
        if let Some(approver_id) = changes.approver_id {
            exam.approver_id = Some(approver_id);
        }
        exam.updated_at = Utc::now();
        Ok(exam.clone())
    }

    async fn delete_exam(&self, id: i64) -> StoreResult<bool> {
        Ok(self.lock()?.exams.remove(&id).is_some())
    }

    async fn create_paper(&self, paper: NewPaper) -> StoreResult<Paper> {
        let mut t = self.lock()?;
        let id = t.next_id();
        let now = Utc::now();
        let row = Paper {
            id,
            exam_id: paper.exam_id,
            title: paper.title,
            content: paper.content,
            questions: paper.questions,
            duration: paper.duration,
            total_score: paper.total_score,
            passing_score: paper.passing_score,
            status: PaperStatus::Draft,
            signature: None,
            signed_at: None,
            signed_by: None,
            created_at: now,
            updated_at: now,
        };
        t.papers.insert(id, row.clone());
        Ok(row)
    }

    async fn get_paper(&self, id: i64) -> StoreResult<Option<Paper>> {
        Ok(self.lock()?.papers.get(&id).cloned())
    }

    async fn list_papers(&self, exam_id: Option<i64>) -> StoreResult<Vec<Paper>> {
        let rows: Vec<Paper> = self
            .lock()?
            .papers
            .values()
            .filter(|p| exam_id.is_none_or(|e| p.exam_id == e))
            .cloned()
            .collect();
        Ok(newest_first(rows, |p| (p.created_at, p.id)))
    }

    async fn update_paper(&self, id: i64, changes: PaperChanges) -> StoreResult<Paper> {
        let mut t = self.lock()?;
        let paper = t.papers.get_mut(&id).ok_or_else(|| missing("Paper", id))?;
        if let Some(title) = changes.title {
            paper.title = title;
        }
        if let Some(content) = changes.content {
            paper.content = content;
        }
        if let Some(questions) = changes.questions {
            paper.questions = questions;
        }
        if let Some(duration) = changes.duration {
            paper.duration = duration;
        }
        if let Some(total_score) = changes.total_score {
            paper.total_score = total_score;
        }
        if let Some(passing_score) = changes.passing_score {
            paper.passing_score = passing_score;
        }
        paper.updated_at = Utc::now();
        Ok(paper.clone())
    }

    async fn set_paper_status_for_exam(&self, exam_id: i64, status: PaperStatus) -> StoreResult<u64> {
        let mut t = self.lock()?;
        let now = Utc::now();
        let mut changed = 0;
        for paper in t.papers.values_mut().filter(|p| p.exam_id == exam_id) {
            paper.status = status;
            paper.updated_at = now;
            changed += 1;
        }
        Ok(changed)
    }

    async fn set_paper_signature(&self, id: i64, signature: PaperSignature) -> StoreResult<Paper> {
        let mut t = self.lock()?;
        let paper = t.papers.get_mut(&id).ok_or_else(|| missing("Paper", id))?;
        paper.signature = Some(signature.signature);
        paper.signed_at = Some(signature.signed_at);
        paper.signed_by = Some(signature.signed_by);
        paper.updated_at = Utc::now();
        Ok(paper.clone())
    }

    async fn delete_paper(&self, id: i64) -> StoreResult<bool> {
        Ok(self.lock()?.papers.remove(&id).is_some())
    }

    async fn delete_papers_by_exam(&self, exam_id: i64) -> StoreResult<u64> {
        let mut t = self.lock()?;
        let before = t.papers.len();
        t.papers.retain(|_, p| p.exam_id != exam_id);
        Ok((before - t.papers.len()) as u64)
    }

    async fn find_or_create_exam_data(&self, data: NewExamData) -> StoreResult<(ExamData, bool)> {
        let mut t = self.lock()?;
        if let Some(existing) = t
            .exam_data
            .values()
            .find(|d| d.exam_id == data.exam_id && d.student_id == data.student_id)
        {
            return Ok((existing.clone(), false));
        }
        let id = t.next_id();
        let now = Utc::now();
        let row = ExamData {
            id,
            exam_id: data.exam_id,
            student_id: data.student_id,
            title: data.title,
            course: data.course,
            total_score: 0.0,
            status: ExamDataStatus::Assigned,
            approver_id: None,
            created_at: now,
            updated_at: now,
        };
        t.exam_data.insert(id, row.clone());
        Ok((row, true))
    }

    async fn get_exam_data(&self, id: i64) -> StoreResult<Option<ExamData>> {
        Ok(self.lock()?.exam_data.get(&id).cloned())
    }

    async fn list_exam_data(&self, filter: &ExamDataFilter) -> StoreResult<Vec<ExamData>> {
        let rows: Vec<ExamData> = self
            .lock()?
            .exam_data
            .values()
            .filter(|d| filter.exam_id.is_none_or(|e| d.exam_id == e))
            .filter(|d| filter.student_id.is_none_or(|s| d.student_id == s))
            .filter(|d| filter.status.is_none_or(|s| d.status == s))
            .cloned()
            .collect();
        Ok(newest_first(rows, |d| (d.created_at, d.id)))
    }

    async fn update_exam_data(&self, id: i64, changes: ExamDataChanges) -> StoreResult<ExamData> {
        let mut t = self.lock()?;
        let row = t.exam_data.get_mut(&id).ok_or_else(|| missing("Exam data", id))?;
        if let Some(status) = changes.status {
            row.status = status;
        }
        if let Some(total_score) = changes.total_score {
            row.total_score = total_score;
        }
        if let Some(approver_id) = changes.approver_id {
            row.approver_id = Some(approver_id);
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete_exam_data_by_exam(&self, exam_id: i64) -> StoreResult<u64> {
        let mut t = self.lock()?;
        let removed: Vec<i64> = t
            .exam_data
            .values()
            .filter(|d| d.exam_id == exam_id)
            .map(|d| d.id)
            .collect();
        t.exam_data.retain(|_, d| d.exam_id != exam_id);
        // Mirrors ON DELETE CASCADE on comments.exam_data_id.
        t.comments
            .retain(|_, c| c.exam_data_id.is_none_or(|id| !removed.contains(&id)));
        Ok(removed.len() as u64)
    }

    async fn delete_exam_data_by_student(&self, student_id: i64) -> StoreResult<u64> {
        let mut t = self.lock()?;
        let removed: Vec<i64> = t
            .exam_data
            .values()
            .filter(|d| d.student_id == student_id)
            .map(|d| d.id)
            .collect();
        t.exam_data.retain(|_, d| d.student_id != student_id);
        // Mirrors ON DELETE CASCADE on comments.exam_data_id.
        t.comments
            .retain(|_, c| c.exam_data_id.is_none_or(|id| !removed.contains(&id)));
        Ok(removed.len() as u64)
    }

    async fn create_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut t = self.lock()?;
        let id = t.next_id();
        let row = Comment {
            id,
            exam_id: comment.exam_id,
            user_id: comment.user_id,
            kind: comment.kind,
            exam_data_id: comment.exam_data_id,
            content: comment.content,
            created_at: Utc::now(),
        };
        t.comments.insert(id, row.clone());
        Ok(row)
    }

    async fn list_comments(&self, filter: &CommentFilter) -> StoreResult<Vec<Comment>> {
        // BTreeMap iteration is id order, which is insertion order.
        Ok(self
            .lock()?
            .comments
            .values()
            .filter(|c| filter.exam_id.is_none_or(|e| c.exam_id == e))
            .filter(|c| filter.user_id.is_none_or(|u| c.user_id == u))
            .filter(|c| filter.exam_data_id.is_none_or(|d| c.exam_data_id == Some(d)))
            .filter(|c| filter.kind.is_none_or(|k| c.kind == k))
            .cloned()
            .collect())
    }

    async fn delete_comments_by_exam(&self, exam_id: i64) -> StoreResult<u64> {
        let mut t = self.lock()?;
        let before = t.comments.len();
        t.comments.retain(|_, c| c.exam_id != exam_id);
        Ok((before - t.comments.len()) as u64)
    }

    async fn delete_comments_by_user(&self, user_id: i64) -> StoreResult<u64> {
        let mut t = self.lock()?;
        let before = t.comments.len();
        t.comments.retain(|_, c| c.user_id != user_id);
        Ok((before - t.comments.len()) as u64)
    }
}
