// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    services::{DashboardService, ExamService, GradingService, PaperService, Services, UserService},
    store::Store,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub services: Services,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        let services = Services::new(store.clone(), &config);
        Self {
            config,
            store,
            services,
        }
    }
}

impl FromRef<AppState> for ExamService {
    fn from_ref(state: &AppState) -> Self {
        state.services.exams.clone()
    }
}

impl FromRef<AppState> for PaperService {
    fn from_ref(state: &AppState) -> Self {
        state.services.papers.clone()
    }
}

impl FromRef<AppState> for GradingService {
    fn from_ref(state: &AppState) -> Self {
        state.services.grading.clone()
    }
}

impl FromRef<AppState> for DashboardService {
    fn from_ref(state: &AppState) -> Self {
        state.services.dashboard.clone()
    }
}

impl FromRef<AppState> for UserService {
    fn from_ref(state: &AppState) -> Self {
        state.services.users.clone()
    }
}
