// src/services/mod.rs

//! Workflow services. Each one owns a handle to the store and receives an
//! already-resolved `Caller` for every operation.

use std::sync::Arc;

use crate::{
    config::Config,
    error::AppError,
    models::{
        exam::Exam,
        user::{Caller, Role},
    },
    store::Store,
    utils::signature::PaperSigner,
};

pub mod dashboard;
pub mod exam;
pub mod grading;
pub mod paper;
pub mod user;

pub use dashboard::DashboardService;
pub use exam::ExamService;
pub use grading::GradingService;
pub use paper::PaperService;
pub use user::UserService;

/// All services, wired once at startup.
#[derive(Clone)]
pub struct Services {
    pub exams: ExamService,
    pub papers: PaperService,
    pub grading: GradingService,
    pub dashboard: DashboardService,
    pub users: UserService,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        Self {
            exams: ExamService::new(store.clone()),
            papers: PaperService::new(store.clone(), PaperSigner::new(&config.signing_secret)),
            grading: GradingService::new(store.clone()),
            dashboard: DashboardService::new(store.clone()),
            users: UserService::new(store, config.jwt_secret.clone(), config.jwt_expiration),
        }
    }
}

pub(crate) fn require_role(caller: Caller, role: Role, action: &str) -> Result<(), AppError> {
    if caller.role == role {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("Only {}s can {}", role, action)))
    }
}

pub(crate) async fn load_exam(store: &dyn Store, id: i64) -> Result<Exam, AppError> {
    store
        .get_exam(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", id)))
}

pub(crate) fn require_creator(caller: Caller, exam: &Exam) -> Result<(), AppError> {
    if exam.creator_id == caller.id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the exam's creator can do this".to_string(),
        ))
    }
}
