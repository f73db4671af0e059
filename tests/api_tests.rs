// tests/api_tests.rs

use std::sync::Arc;

use exam_approval::{
    config::Config,
    routes,
    state::AppState,
    store::{MemoryStore, Store},
};
use serde_json::{Value, json};

const ADMIN_USERNAME: &str = "root_admin";
const ADMIN_PASSWORD: &str = "root_password";

struct TestApp {
    address: String,
    client: reqwest::Client,
}

/// Helper function to spawn the app on a random port for testing.
/// Uses the in-memory store, so every test starts from an empty system
/// with one seeded admin.
async fn spawn_app() -> TestApp {
    let config = Config {
        database_url: None,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        signing_secret: "test_signing_secret".to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let state = AppState::new(config, store);
    state
        .services
        .users
        .ensure_admin(ADMIN_USERNAME, ADMIN_PASSWORD)
        .await
        .expect("Failed to seed admin");

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn register(&self, role: &str) -> (i64, String) {
        let username = format!("{}_{}", &role[..1], &uuid::Uuid::new_v4().to_string()[..8]);
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "username": username,
                "password": "password123",
                "name": username,
                "role": role,
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        (body["id"].as_i64().unwrap(), username)
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    /// Registers a user of `role` and returns (id, token).
    async fn user(&self, role: &str) -> (i64, String) {
        let (id, username) = self.register(role).await;
        (id, self.login(&username, "password123").await)
    }

    async fn admin(&self) -> String {
        self.login(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn create_exam(&self, teacher: &str) -> i64 {
        let response = self
            .post(
                teacher,
                "/api/exams",
                json!({
                    "title": "Algebra midterm",
                    "description": "Chapters 1-4",
                    "course": "math",
                    "start_time": "2030-01-10T09:00:00Z",
                    "end_time": "2030-01-10T11:00:00Z",
                    "total_score": 100.0
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "draft");
        body["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn health_check_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_fails_validation() {
    let app = spawn_app().await;

    // Act: Send a username that is too short
    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "username": "yo",
            "password": "password123",
            "name": "Yo",
            "role": "student"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_username_is_conflict() {
    let app = spawn_app().await;
    let (_, username) = app.register("student").await;

    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "username": username,
            "password": "password123",
            "name": "Again",
            "role": "teacher"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/api/exams/my")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = app.get("not-a-token", "/api/dashboard").await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn admin_routes_reject_non_admins() {
    let app = spawn_app().await;
    let (_, teacher) = app.user("teacher").await;

    let response = app.get(&teacher, "/api/admin/users").await;
    assert_eq!(response.status().as_u16(), 403);

    let admin = app.admin().await;
    let response = app.get(&admin, "/api/admin/users").await;
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn students_cannot_create_exams() {
    let app = spawn_app().await;
    let (_, student) = app.user("student").await;

    let response = app
        .post(
            &student,
            "/api/exams",
            json!({
                "title": "Sneaky",
                "course": "math",
                "start_time": "2030-01-10T09:00:00Z",
                "end_time": "2030-01-10T11:00:00Z"
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn invalid_transition_is_conflict() {
    let app = spawn_app().await;
    let (_, teacher) = app.user("teacher").await;
    let admin = app.admin().await;
    let exam_id = app.create_exam(&teacher).await;

    let response = app
        .post(&admin, &format!("/api/exams/{}/approve", exam_id), json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 409);

    let body: Value = app
        .get(&teacher, &format!("/api/exams/{}", exam_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "draft");
}

#[tokio::test]
async fn approve_with_comment_then_publish_assigns_students() {
    let app = spawn_app().await;
    let (_, s1) = app.user("student").await;
    let (_, s2) = app.user("student").await;
    let (_, teacher) = app.user("teacher").await;
    let admin = app.admin().await;

    let exam_id = app.create_exam(&teacher).await;

    let response = app
        .post(&teacher, &format!("/api/exams/{}/submit", exam_id), json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let pending: Value = app.get(&admin, "/api/exams/pending").await.json().await.unwrap();
    assert!(pending.as_array().unwrap().iter().any(|e| e["id"] == exam_id));

    let response = app
        .post(
            &admin,
            &format!("/api/exams/{}/approve", exam_id),
            json!({ "comment": "ok" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let approved: Value = response.json().await.unwrap();
    assert_eq!(approved["status"], "approved");

    let comments: Value = app
        .get(&admin, &format!("/api/exams/{}/comments", exam_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(comments[0]["content"], "ok");
    assert_eq!(comments[0]["kind"], "review");

    let response = app
        .post(&admin, &format!("/api/exams/{}/publish", exam_id), json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let published: Value = response.json().await.unwrap();
    assert_eq!(published["status"], "published");

    for student in [&s1, &s2] {
        let assignments: Value = app
            .get(student, "/api/student/assignments")
            .await
            .json()
            .await
            .unwrap();
        let rows = assignments.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["exam_id"], exam_id);
        assert_eq!(rows[0]["status"], "assigned");
    }
}

#[tokio::test]
async fn submit_grade_and_view_result() {
    let app = spawn_app().await;
    let (_, student) = app.user("student").await;
    let (_, teacher) = app.user("teacher").await;

    let response = app
        .post(
            &teacher,
            "/api/exams/quick-publish",
            json!({
                "title": "Pop quiz",
                "course": "math",
                "start_time": "2030-01-10T09:00:00Z",
                "end_time": "2030-01-10T09:30:00Z",
                "total_score": 100.0
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let exam_id = response.json::<Value>().await.unwrap()["id"].as_i64().unwrap();

    let response = app
        .post(
            &student,
            &format!("/api/student/exams/{}/submit", exam_id),
            json!({ "answer": "42" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let data: Value = response.json().await.unwrap();
    assert_eq!(data["status"], "pending");
    let exam_data_id = data["id"].as_i64().unwrap();

    let before: Value = app
        .get(&student, &format!("/api/student/results/{}", exam_data_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(before["score"], 0.0);

    let response = app
        .post(
            &teacher,
            &format!("/api/grading/exam-data/{}/grade", exam_data_id),
            json!({ "score": 150.0 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .post(
            &teacher,
            &format!("/api/grading/exam-data/{}/grade", exam_data_id),
            json!({ "score": 88.0, "comment": "good" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let result: Value = app
        .get(&student, &format!("/api/student/results/{}", exam_data_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(result["score"], 88.0);
    assert_eq!(result["comment"], "good");
    assert_eq!(result["status"], "approved");
}

#[tokio::test]
async fn sign_and_verify_paper() {
    let app = spawn_app().await;
    let (_, teacher) = app.user("teacher").await;
    let admin = app.admin().await;
    let exam_id = app.create_exam(&teacher).await;

    let response = app
        .post(
            &teacher,
            "/api/papers",
            json!({
                "exam_id": exam_id,
                "title": "Paper A",
                "content": "Solve all",
                "questions": "[]",
                "duration": 90,
                "total_score": 100.0,
                "passing_score": 60.0
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let paper_id = response.json::<Value>().await.unwrap()["id"].as_i64().unwrap();

    let response = app
        .get(&teacher, &format!("/api/papers/{}/verify", paper_id))
        .await;
    assert_eq!(response.status().as_u16(), 409);

    app.post(&teacher, &format!("/api/exams/{}/submit", exam_id), json!({}))
        .await;
    app.post(&admin, &format!("/api/exams/{}/approve", exam_id), json!({}))
        .await;

    let response = app
        .post(&teacher, &format!("/api/papers/{}/sign", paper_id), json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let verify: Value = app
        .get(&teacher, &format!("/api/papers/{}/verify", paper_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(verify["valid"], true);
}

#[tokio::test]
async fn dashboard_is_role_specific() {
    let app = spawn_app().await;
    let (_, student) = app.user("student").await;
    let (_, teacher) = app.user("teacher").await;
    app.create_exam(&teacher).await;

    let stats: Value = app.get(&teacher, "/api/dashboard").await.json().await.unwrap();
    assert_eq!(stats["total_papers"], 1);
    assert_eq!(stats["total_students"], 1);
    assert!(stats.get("grading_queue").is_some());

    let stats: Value = app.get(&student, "/api/dashboard").await.json().await.unwrap();
    assert_eq!(stats["total_papers"], 0);
    assert!(stats.get("assignment_summary").is_some());
}
