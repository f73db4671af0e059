// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::{
        comment::{Comment, CommentFilter, NewComment},
        exam::{Exam, ExamChanges, ExamFilter, NewExam},
        exam_data::{ExamData, ExamDataChanges, ExamDataFilter, NewExamData},
        paper::{NewPaper, Paper, PaperChanges, PaperSignature, PaperStatus},
        user::{NewUser, Role, User, UserChanges},
    },
    store::{Store, StoreResult},
};

const USER_COLUMNS: &str = "id, username, password, name, role, teacher_id, created_at, updated_at";
const EXAM_COLUMNS: &str = "id, title, description, course, start_time, end_time, creator_id, status, approver_id, total_score, created_at, updated_at";
const PAPER_COLUMNS: &str = "id, exam_id, title, content, questions, duration, total_score, passing_score, status, signature, signed_at, signed_by, created_at, updated_at";
const EXAM_DATA_COLUMNS: &str = "id, exam_id, student_id, title, course, total_score, status, approver_id, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, exam_id, user_id, kind, exam_data_id, content, created_at";

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        tracing::error!("{}: {:?}", context, e);
        AppError::InternalServerError(e.to_string())
    }
}

fn missing(entity: &str, id: i64) -> AppError {
    AppError::NotFound(format!("{} {} not found", entity, id))
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (username, password, name, role, teacher_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(user.role.as_str())
            .bind(user.teacher_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db) = &e {
                    if db.is_unique_violation() {
                        return AppError::Conflict(format!(
                            "Username '{}' already exists",
                            user.username
                        ));
                    }
                }
                db_error("Failed to create user")(e)
            })
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to fetch user"))
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to fetch user by username"))
    }

    async fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM users", USER_COLUMNS));
        if let Some(role) = role {
            builder.push(" WHERE role = ").push_bind(role.as_str());
        }
        builder.push(" ORDER BY id DESC");

        builder
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list users"))
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> StoreResult<User> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
        let mut separated = builder.separated(", ");
        separated.push("updated_at = NOW()");

        if let Some(name) = changes.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name);
        }
        if let Some(hash) = changes.password_hash {
            separated.push("password = ");
            separated.push_bind_unseparated(hash);
        }
        if let Some(teacher_id) = changes.teacher_id {
            separated.push("teacher_id = ");
            separated.push_bind_unseparated(teacher_id);
        }

        builder.push(" WHERE id = ").push_bind(id);
        builder.push(format!(" RETURNING {}", USER_COLUMNS));

        builder
            .build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to update user"))?
            .ok_or_else(|| missing("User", id))
    }

    async fn link_students(&self, teacher_id: i64) -> StoreResult<u64> {
        sqlx::query("UPDATE users SET teacher_id = $1, updated_at = NOW() WHERE role = 'student'")
            .bind(teacher_id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(db_error("Failed to link students"))
    }

    async fn unlink_students(&self, teacher_id: i64) -> StoreResult<u64> {
        sqlx::query(
            "UPDATE users SET teacher_id = NULL, updated_at = NOW() \
             WHERE role = 'student' AND teacher_id = $1",
        )
        .bind(teacher_id)
        .execute(&self.pool)
        .await
        .map(|r| r.rows_affected())
        .map_err(db_error("Failed to unlink students"))
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected() > 0)
            .map_err(db_error("Failed to delete user"))
    }

    async fn create_exam(&self, exam: NewExam) -> StoreResult<Exam> {
        let sql = format!(
            "INSERT INTO exams (title, description, course, start_time, end_time, creator_id, status, total_score) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            EXAM_COLUMNS
        );
        sqlx::query_as::<_, Exam>(&sql)
            .bind(exam.title)
            .bind(exam.description)
            .bind(exam.course)
            .bind(exam.start_time)
            .bind(exam.end_time)
            .bind(exam.creator_id)
            .bind(exam.status.as_str())
            .bind(exam.total_score)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to create exam"))
    }

    async fn get_exam(&self, id: i64) -> StoreResult<Option<Exam>> {
        let sql = format!("SELECT {} FROM exams WHERE id = $1", EXAM_COLUMNS);
        sqlx::query_as::<_, Exam>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to fetch exam"))
    }

    async fn list_exams(&self, filter: &ExamFilter) -> StoreResult<Vec<Exam>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM exams WHERE 1 = 1", EXAM_COLUMNS));
        if let Some(creator_id) = filter.creator_id {
            builder.push(" AND creator_id = ").push_bind(creator_id);
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(course) = &filter.course {
            builder.push(" AND course = ").push_bind(course.clone());
        }
        builder.push(" ORDER BY created_at DESC, id DESC");

        builder
            .build_query_as::<Exam>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list exams"))
    }

    async fn update_exam(&self, id: i64, changes: ExamChanges) -> StoreResult<Exam> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE exams SET ");
        let mut separated = builder.separated(", ");
        separated.push("updated_at = NOW()");

        if let Some(title) = changes.title {
            separated.push("title = ");
            separated.push_bind_unseparated(title);
        }
        if let Some(description) = changes.description {
            separated.push("description = ");
            separated.push_bind_unseparated(description);
        }
        if let Some(course) = changes.course {
            separated.push("course = ");
            separated.push_bind_unseparated(course);
        }
        if let Some(start_time) = changes.start_time {
            separated.push("start_time = ");
            separated.push_bind_unseparated(start_time);
        }
        if let Some(end_time) = changes.end_time {
            separated.push("end_time = ");
            separated.push_bind_unseparated(end_time);
        }
        if let Some(total_score) = changes.total_score {
            separated.push("total_score = ");
            separated.push_bind_unseparated(total_score);
        }
        if let Some(status) = changes.status {
            separated.push("status = ");
            separated.push_bind_unseparated(status.as_str());
        }
        if let Some(approver_id) = changes.approver_id {
            separated.push("approver_id = ");
            separated.push_bind_unseparated(approver_id);
        }

        builder.push(" WHERE id = ").push_bind(id);
        builder.push(format!(" RETURNING {}", EXAM_COLUMNS));

        builder
            .build_query_as::<Exam>()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to update exam"))?
            .ok_or_else(|| missing("Exam", id))
    }

    async fn delete_exam(&self, id: i64) -> StoreResult<bool> {
        sqlx::query("DELETE FROM exams WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected() > 0)
            .map_err(db_error("Failed to delete exam"))
    }

    async fn create_paper(&self, paper: NewPaper) -> StoreResult<Paper> {
        let sql = format!(
            "INSERT INTO papers (exam_id, title, content, questions, duration, total_score, passing_score) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            PAPER_COLUMNS
        );
        sqlx::query_as::<_, Paper>(&sql)
            .bind(paper.exam_id)
            .bind(paper.title)
            .bind(paper.content)
            .bind(paper.questions)
            .bind(paper.duration)
            .bind(paper.total_score)
            .bind(paper.passing_score)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to create paper"))
    }

    async fn get_paper(&self, id: i64) -> StoreResult<Option<Paper>> {
        let sql = format!("SELECT {} FROM papers WHERE id = $1", PAPER_COLUMNS);
        sqlx::query_as::<_, Paper>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to fetch paper"))
    }

    async fn list_papers(&self, exam_id: Option<i64>) -> StoreResult<Vec<Paper>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM papers", PAPER_COLUMNS));
        if let Some(exam_id) = exam_id {
            builder.push(" WHERE exam_id = ").push_bind(exam_id);
        }
        builder.push(" ORDER BY created_at DESC, id DESC");

        builder
            .build_query_as::<Paper>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list papers"))
    }

    async fn update_paper(&self, id: i64, changes: PaperChanges) -> StoreResult<Paper> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE papers SET ");
        let mut separated = builder.separated(", ");
        separated.push("updated_at = NOW()");

        if let Some(title) = changes.title {
            separated.push("title = ");
            separated.push_bind_unseparated(title);
        }
        if let Some(content) = changes.content {
            separated.push("content = ");
            separated.push_bind_unseparated(content);
        }
        if let Some(questions) = changes.questions {
            separated.push("questions = ");
            separated.push_bind_unseparated(questions);
        }
        if let Some(duration) = changes.duration {
            separated.push("duration = ");
            separated.push_bind_unseparated(duration);
        }
        if let Some(total_score) = changes.total_score {
            separated.push("total_score = ");
            separated.push_bind_unseparated(total_score);
        }
        if let Some(passing_score) = changes.passing_score {
            separated.push("passing_score = ");
            separated.push_bind_unseparated(passing_score);
        }

        builder.push(" WHERE id = ").push_bind(id);
        builder.push(format!(" RETURNING {}", PAPER_COLUMNS));

        builder
            .build_query_as::<Paper>()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to update paper"))?
            .ok_or_else(|| missing("Paper", id))
    }

    async fn set_paper_status_for_exam(&self, exam_id: i64, status: PaperStatus) -> StoreResult<u64> {
        sqlx::query("UPDATE papers SET status = $1, updated_at = NOW() WHERE exam_id = $2")
            .bind(status.as_str())
            .bind(exam_id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(db_error("Failed to update paper status"))
    }

    async fn set_paper_signature(&self, id: i64, signature: PaperSignature) -> StoreResult<Paper> {
        let sql = format!(
            "UPDATE papers SET signature = $1, signed_at = $2, signed_by = $3, updated_at = NOW() \
             WHERE id = $4 RETURNING {}",
            PAPER_COLUMNS
        );
        sqlx::query_as::<_, Paper>(&sql)
            .bind(signature.signature)
            .bind(signature.signed_at)
            .bind(signature.signed_by)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to store paper signature"))?
            .ok_or_else(|| missing("Paper", id))
    }

    async fn delete_paper(&self, id: i64) -> StoreResult<bool> {
        sqlx::query("DELETE FROM papers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected() > 0)
            .map_err(db_error("Failed to delete paper"))
    }

    async fn delete_papers_by_exam(&self, exam_id: i64) -> StoreResult<u64> {
        sqlx::query("DELETE FROM papers WHERE exam_id = $1")
            .bind(exam_id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(db_error("Failed to delete papers"))
    }

    async fn find_or_create_exam_data(&self, data: NewExamData) -> StoreResult<(ExamData, bool)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let insert = format!(
            "INSERT INTO exam_data (exam_id, student_id, title, course) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (exam_id, student_id) DO NOTHING RETURNING {}",
            EXAM_DATA_COLUMNS
        );
        let inserted = sqlx::query_as::<_, ExamData>(&insert)
            .bind(data.exam_id)
            .bind(data.student_id)
            .bind(&data.title)
            .bind(&data.course)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("Failed to insert exam data"))?;

        let result = match inserted {
            Some(row) => (row, true),
            None => {
                let select = format!(
                    "SELECT {} FROM exam_data WHERE exam_id = $1 AND student_id = $2",
                    EXAM_DATA_COLUMNS
                );
                let row = sqlx::query_as::<_, ExamData>(&select)
                    .bind(data.exam_id)
                    .bind(data.student_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(db_error("Failed to fetch exam data"))?;
                (row, false)
            }
        };

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))?;
        Ok(result)
    }

    async fn get_exam_data(&self, id: i64) -> StoreResult<Option<ExamData>> {
        let sql = format!("SELECT {} FROM exam_data WHERE id = $1", EXAM_DATA_COLUMNS);
        sqlx::query_as::<_, ExamData>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to fetch exam data"))
    }

    async fn list_exam_data(&self, filter: &ExamDataFilter) -> StoreResult<Vec<ExamData>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM exam_data WHERE 1 = 1", EXAM_DATA_COLUMNS));
        if let Some(exam_id) = filter.exam_id {
            builder.push(" AND exam_id = ").push_bind(exam_id);
        }
        if let Some(student_id) = filter.student_id {
            builder.push(" AND student_id = ").push_bind(student_id);
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        builder.push(" ORDER BY created_at DESC, id DESC");

        builder
            .build_query_as::<ExamData>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list exam data"))
    }

    async fn update_exam_data(&self, id: i64, changes: ExamDataChanges) -> StoreResult<ExamData> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE exam_data SET ");
        let mut separated = builder.separated(", ");
        separated.push("updated_at = NOW()");

        if let Some(status) = changes.status {
            separated.push("status = ");
            separated.push_bind_unseparated(status.as_str());
        }
        if let Some(total_score) = changes.total_score {
            separated.push("total_score = ");
            separated.push_bind_unseparated(total_score);
        }
        if let Some(approver_id) = changes.approver_id {
            separated.push("approver_id = ");
            separated.push_bind_unseparated(approver_id);
        }

        builder.push(" WHERE id = ").push_bind(id);
        builder.push(format!(" RETURNING {}", EXAM_DATA_COLUMNS));

        builder
            .build_query_as::<ExamData>()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to update exam data"))?
            .ok_or_else(|| missing("Exam data", id))
    }

    async fn delete_exam_data_by_exam(&self, exam_id: i64) -> StoreResult<u64> {
        sqlx::query("DELETE FROM exam_data WHERE exam_id = $1")
            .bind(exam_id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(db_error("Failed to delete exam data"))
    }

    async fn delete_exam_data_by_student(&self, student_id: i64) -> StoreResult<u64> {
        sqlx::query("DELETE FROM exam_data WHERE student_id = $1")
            .bind(student_id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(db_error("Failed to delete exam data"))
    }

    async fn create_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let sql = format!(
            "INSERT INTO comments (exam_id, user_id, kind, exam_data_id, content) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            COMMENT_COLUMNS
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(comment.exam_id)
            .bind(comment.user_id)
            .bind(comment.kind.as_str())
            .bind(comment.exam_data_id)
            .bind(comment.content)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to create comment"))
    }

    async fn list_comments(&self, filter: &CommentFilter) -> StoreResult<Vec<Comment>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM comments WHERE 1 = 1", COMMENT_COLUMNS));
        if let Some(exam_id) = filter.exam_id {
            builder.push(" AND exam_id = ").push_bind(exam_id);
        }
        if let Some(user_id) = filter.user_id {
            builder.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(exam_data_id) = filter.exam_data_id {
            builder.push(" AND exam_data_id = ").push_bind(exam_data_id);
        }
        if let Some(kind) = filter.kind {
            builder.push(" AND kind = ").push_bind(kind.as_str());
        }
        builder.push(" ORDER BY created_at ASC, id ASC");

        builder
            .build_query_as::<Comment>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list comments"))
    }

    async fn delete_comments_by_exam(&self, exam_id: i64) -> StoreResult<u64> {
        sqlx::query("DELETE FROM comments WHERE exam_id = $1")
            .bind(exam_id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(db_error("Failed to delete comments"))
    }

    async fn delete_comments_by_user(&self, user_id: i64) -> StoreResult<u64> {
        sqlx::query("DELETE FROM comments WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(db_error("Failed to delete comments"))
    }
}
