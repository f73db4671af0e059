// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, dashboard, exam, grading, paper, student},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public routes: register and login.
/// * Everything else sits behind `auth_middleware`; `/api/admin` also behind `admin_middleware`.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let require_auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/me", get(auth::me).put(auth::update_me))
                .route("/password", post(auth::change_password))
                .layer(require_auth.clone()),
        );

    let exam_routes = Router::new()
        .route("/", get(exam::list_exams).post(exam::create_exam))
        .route("/quick-publish", post(exam::quick_publish))
        .route("/my", get(exam::my_exams))
        .route("/pending", get(exam::pending_exams))
        .route("/published", get(exam::published_exams))
        .route(
            "/{id}",
            get(exam::get_exam)
                .put(exam::update_exam)
                .delete(exam::delete_exam),
        )
        .route("/{id}/submit", post(exam::submit_exam))
        .route("/{id}/approve", post(exam::approve_exam))
        .route("/{id}/reject", post(exam::reject_exam))
        .route("/{id}/publish", post(exam::publish_exam))
        .route("/{id}/distribute", post(exam::distribute_exam))
        .route(
            "/{id}/comments",
            get(exam::list_comments).post(exam::add_comment),
        )
        .route("/{id}/papers", get(exam::list_exam_papers))
        .layer(require_auth.clone());

    let paper_routes = Router::new()
        .route("/", post(paper::create_paper))
        .route(
            "/{id}",
            get(paper::get_paper)
                .put(paper::update_paper)
                .delete(paper::delete_paper),
        )
        .route("/{id}/sign", post(paper::sign_paper))
        .route("/{id}/verify", get(paper::verify_paper))
        .layer(require_auth.clone());

    let student_routes = Router::new()
        .route("/assignments", get(student::assignments))
        .route("/exams/{id}/open", post(student::open_exam))
        .route("/exams/{id}/submit", post(student::submit_answer))
        .route("/results/{id}", get(student::result))
        .layer(require_auth.clone());

    let grading_routes = Router::new()
        .route("/students", get(grading::list_students))
        .route("/students/{id}/exams", get(grading::student_exams))
        .route("/exam-data/{id}", get(grading::review_submission))
        .route("/exam-data/{id}/grade", post(grading::grade_submission))
        .layer(require_auth.clone());

    let dashboard_routes = Router::new()
        .route("/", get(dashboard::dashboard))
        .layer(require_auth.clone());

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/users/{id}",
            get(admin::get_user)
                .put(admin::update_user)
                .delete(admin::delete_user),
        )
        .route("/exams/{id}", delete(admin::force_delete_exam))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(require_auth);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/exams", exam_routes)
        .nest("/api/papers", paper_routes)
        .nest("/api/student", student_routes)
        .nest("/api/grading", grading_routes)
        .nest("/api/dashboard", dashboard_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
