// src/store/mod.rs

//! Persistence seam. Services only talk to `dyn Store`; `PgStore` backs the
//! running service and `MemoryStore` backs tests and the no-database mode.

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        comment::{Comment, CommentFilter, NewComment},
        exam::{Exam, ExamChanges, ExamFilter, NewExam},
        exam_data::{ExamData, ExamDataChanges, ExamDataFilter, NewExamData},
        paper::{NewPaper, Paper, PaperChanges, PaperSignature, PaperStatus},
        user::{NewUser, Role, User, UserChanges},
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, AppError>;

/// Entity store used by every workflow service.
///
/// `update_*` methods return `NotFound` when the row is missing. Lists are
/// ordered newest first, except comments, which are returned oldest first.
#[async_trait]
pub trait Store: Send + Sync {
    // users
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn get_user(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>>;
    async fn update_user(&self, id: i64, changes: UserChanges) -> StoreResult<User>;
    /// Assigns every student to `teacher_id`.
    async fn link_students(&self, teacher_id: i64) -> StoreResult<u64>;
    /// Clears `teacher_id` on every student assigned to `teacher_id`.
    async fn unlink_students(&self, teacher_id: i64) -> StoreResult<u64>;
    async fn delete_user(&self, id: i64) -> StoreResult<bool>;

    // exams
    async fn create_exam(&self, exam: NewExam) -> StoreResult<Exam>;
    async fn get_exam(&self, id: i64) -> StoreResult<Option<Exam>>;
    async fn list_exams(&self, filter: &ExamFilter) -> StoreResult<Vec<Exam>>;
    async fn update_exam(&self, id: i64, changes: ExamChanges) -> StoreResult<Exam>;
    async fn delete_exam(&self, id: i64) -> StoreResult<bool>;

    // papers
    async fn create_paper(&self, paper: NewPaper) -> StoreResult<Paper>;
    async fn get_paper(&self, id: i64) -> StoreResult<Option<Paper>>;
    async fn list_papers(&self, exam_id: Option<i64>) -> StoreResult<Vec<Paper>>;
    async fn update_paper(&self, id: i64, changes: PaperChanges) -> StoreResult<Paper>;
    async fn set_paper_status_for_exam(&self, exam_id: i64, status: PaperStatus) -> StoreResult<u64>;
    async fn set_paper_signature(&self, id: i64, signature: PaperSignature) -> StoreResult<Paper>;
    async fn delete_paper(&self, id: i64) -> StoreResult<bool>;
    async fn delete_papers_by_exam(&self, exam_id: i64) -> StoreResult<u64>;

    // exam data
    /// Returns the row for (exam, student), inserting it when absent.
    /// The boolean is true when this call created it.
    async fn find_or_create_exam_data(&self, data: NewExamData) -> StoreResult<(ExamData, bool)>;
    async fn get_exam_data(&self, id: i64) -> StoreResult<Option<ExamData>>;
    async fn list_exam_data(&self, filter: &ExamDataFilter) -> StoreResult<Vec<ExamData>>;
    async fn update_exam_data(&self, id: i64, changes: ExamDataChanges) -> StoreResult<ExamData>;
    async fn delete_exam_data_by_exam(&self, exam_id: i64) -> StoreResult<u64>;
    async fn delete_exam_data_by_student(&self, student_id: i64) -> StoreResult<u64>;

    // comments
    async fn create_comment(&self, comment: NewComment) -> StoreResult<Comment>;
    async fn list_comments(&self, filter: &CommentFilter) -> StoreResult<Vec<Comment>>;
    async fn delete_comments_by_exam(&self, exam_id: i64) -> StoreResult<u64>;
    async fn delete_comments_by_user(&self, user_id: i64) -> StoreResult<u64>;
}
