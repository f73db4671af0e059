// src/services/user.rs

use std::sync::Arc;

use serde::Serialize;

use crate::{
    error::AppError,
    models::{
        exam::ExamFilter,
        user::{
            AdminCreateUserRequest, AdminUpdateUserRequest, Caller, LoginRequest, NewUser, RegisterRequest, Role,
            User, UserChanges,
        },
    },
    services::{exam::cascade_delete_exam, require_role},
    store::Store,
    utils::{
        jwt::sign_jwt,
        password::{hash_password, verify_password},
    },
};

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub user: User,
}

/// Accounts, credentials and admin user management.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    jwt_secret: String,
    jwt_expiration: u64,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, jwt_secret: String, jwt_expiration: u64) -> Self {
        Self {
            store,
            jwt_secret,
            jwt_expiration,
        }
    }

    /// Self-service registration. A new teacher becomes the teacher of every student.
    pub async fn register(&self, req: RegisterRequest) -> Result<User, AppError> {
        if req.role == Role::Admin {
            return Err(AppError::BadRequest(
                "Admin accounts cannot be self-registered".to_string(),
            ));
        }

        let user = self
            .store
            .create_user(NewUser {
                username: req.username,
                password_hash: hash_password(&req.password)?,
                name: req.name,
                role: req.role,
                teacher_id: None,
            })
            .await?;

        if user.role == Role::Teacher {
            let linked = self.store.link_students(user.id).await?;
            tracing::info!(teacher_id = user.id, linked, "students linked to new teacher");
        }

        tracing::info!(user_id = user.id, role = %user.role, "user registered");
        Ok(user)
    }

    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        let invalid = || AppError::AuthError("Invalid username or password".to_string());

        let user = self
            .store
            .find_user_by_username(&req.username)
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&req.password, &user.password)? {
            tracing::warn!(username = %req.username, "failed login attempt");
            return Err(invalid());
        }

        if let Some(role) = req.role {
            if role != user.role {
                return Err(AppError::AuthError(format!(
                    "User is not registered as {}",
                    role
                )));
            }
        }

        let token = sign_jwt(user.id, user.role, &self.jwt_secret, self.jwt_expiration)?;
        tracing::info!(user_id = user.id, "user logged in");

        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            user,
        })
    }

    /// Resolves a token subject back to a live user.
    pub async fn authenticate(&self, user_id: i64) -> Result<User, AppError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::AuthError("User no longer exists".to_string()))
    }

    pub async fn profile(&self, caller: Caller) -> Result<User, AppError> {
        self.load(caller.id).await
    }

    pub async fn update_profile(&self, caller: Caller, name: String) -> Result<User, AppError> {
        self.store
            .update_user(
                caller.id,
                UserChanges {
                    name: Some(name),
                    ..Default::default()
                },
            )
            .await
    }

    pub async fn change_password(&self, caller: Caller, old_password: &str, new_password: &str) -> Result<(), AppError> {
        let user = self.load(caller.id).await?;
        if !verify_password(old_password, &user.password)? {
            return Err(AppError::BadRequest("Old password is incorrect".to_string()));
        }

        self.store
            .update_user(
                caller.id,
                UserChanges {
                    password_hash: Some(hash_password(new_password)?),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(user_id = caller.id, "password changed");
        Ok(())
    }

    /// Creates the configured admin account when it does not exist yet.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<bool, AppError> {
        if self.store.find_user_by_username(username).await?.is_some() {
            return Ok(false);
        }

        tracing::info!("Seeding admin user: {}", username);
        self.store
            .create_user(NewUser {
                username: username.to_string(),
                password_hash: hash_password(password)?,
                name: username.to_string(),
                role: Role::Admin,
                teacher_id: None,
            })
            .await?;
        Ok(true)
    }

    pub async fn list_users(&self, caller: Caller, role: Option<Role>) -> Result<Vec<User>, AppError> {
        require_role(caller, Role::Admin, "manage users")?;
        self.store.list_users(role).await
    }

    pub async fn get_user(&self, caller: Caller, id: i64) -> Result<User, AppError> {
        require_role(caller, Role::Admin, "manage users")?;
        self.load(id).await
    }

    pub async fn create_user(&self, caller: Caller, req: AdminCreateUserRequest) -> Result<User, AppError> {
        require_role(caller, Role::Admin, "manage users")?;

        let teacher_id = match req.teacher_id {
            Some(teacher_id) if req.role == Role::Student => Some(self.require_teacher(teacher_id).await?),
            Some(_) => {
                return Err(AppError::BadRequest(
                    "Only students can be assigned a teacher".to_string(),
                ));
            }
            None => None,
        };

        let user = self
            .store
            .create_user(NewUser {
                username: req.username,
                password_hash: hash_password(&req.password)?,
                name: req.name,
                role: req.role,
                teacher_id,
            })
            .await?;

        tracing::info!(user_id = user.id, role = %user.role, admin_id = caller.id, "user created by admin");
        Ok(user)
    }

    /// Updates name, password or (for students) the assigned teacher.
    pub async fn update_user(&self, caller: Caller, id: i64, req: AdminUpdateUserRequest) -> Result<User, AppError> {
        require_role(caller, Role::Admin, "manage users")?;
        let user = self.load(id).await?;

        let teacher_id = match req.teacher_id {
            Some(teacher_id) if user.role == Role::Student => Some(self.require_teacher(teacher_id).await?),
            Some(_) => {
                return Err(AppError::BadRequest(
                    "Only students can be assigned a teacher".to_string(),
                ));
            }
            None => None,
        };

        let password_hash = match req.password {
            Some(password) => Some(hash_password(&password)?),
            None => None,
        };

        self.store
            .update_user(
                id,
                UserChanges {
                    name: req.name,
                    password_hash,
                    teacher_id,
                },
            )
            .await
    }

    /// Deletes a user and the records that depend on them.
    ///
    /// Students lose their exam records and comments. Teachers release their
    /// students, lose every exam they created and their comments.
    pub async fn delete_user(&self, caller: Caller, id: i64) -> Result<(), AppError> {
        require_role(caller, Role::Admin, "manage users")?;
        if caller.id == id {
            return Err(AppError::BadRequest("You cannot delete yourself".to_string()));
        }

        let user = self.load(id).await?;
        let store = self.store.as_ref();

        match user.role {
            Role::Student => {
                if let Err(e) = store.delete_exam_data_by_student(id).await {
                    tracing::warn!(user_id = id, "failed to delete exam data: {}", e);
                }
            }
            Role::Teacher => {
                if let Err(e) = store.unlink_students(id).await {
                    tracing::warn!(user_id = id, "failed to unlink students: {}", e);
                }
                let exams = store
                    .list_exams(&ExamFilter {
                        creator_id: Some(id),
                        ..Default::default()
                    })
                    .await?;
                for exam in exams {
                    if let Err(e) = cascade_delete_exam(store, exam.id).await {
                        tracing::warn!(user_id = id, exam_id = exam.id, "failed to delete exam: {}", e);
                    }
                }
            }
            Role::Admin => {}
        }

        if let Err(e) = store.delete_comments_by_user(id).await {
            tracing::warn!(user_id = id, "failed to delete comments: {}", e);
        }

        if !store.delete_user(id).await? {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }

        tracing::info!(user_id = id, role = %user.role, admin_id = caller.id, "user deleted");
        Ok(())
    }

    async fn load(&self, id: i64) -> Result<User, AppError> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    async fn require_teacher(&self, id: i64) -> Result<i64, AppError> {
        match self.store.get_user(id).await? {
            Some(user) if user.role == Role::Teacher => Ok(user.id),
            _ => Err(AppError::BadRequest(format!("User {} is not a teacher", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exam_data::ExamDataFilter;
    use crate::services::fixtures::world;
    use crate::utils::jwt::verify_jwt;

    fn register(username: &str, role: Role) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            password: "secret".into(),
            name: username.into(),
            role,
        }
    }

    #[tokio::test]
    async fn register_and_login() {
        let w = world();
        let user = w.services.users.register(register("alice", Role::Student)).await.unwrap();

        let login = w
            .services
            .users
            .login(LoginRequest {
                username: "alice".into(),
                password: "secret".into(),
                role: Some(Role::Student),
            })
            .await
            .unwrap();
        assert_eq!(login.user.id, user.id);

        let claims = verify_jwt(&login.token, "test-jwt-secret").unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, Role::Student);
    }

    #[tokio::test]
    async fn login_failures() {
        let w = world();
        w.services.users.register(register("alice", Role::Student)).await.unwrap();

        let wrong_password = w
            .services
            .users
            .login(LoginRequest {
                username: "alice".into(),
                password: "nope".into(),
                role: None,
            })
            .await;
        assert!(matches!(wrong_password, Err(AppError::AuthError(_))));

        let wrong_role = w
            .services
            .users
            .login(LoginRequest {
                username: "alice".into(),
                password: "secret".into(),
                role: Some(Role::Teacher),
            })
            .await;
        assert!(matches!(wrong_role, Err(AppError::AuthError(_))));
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let w = world();
        w.services.users.register(register("alice", Role::Student)).await.unwrap();
        assert!(matches!(
            w.services.users.register(register("alice", Role::Teacher)).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn admins_cannot_self_register() {
        let w = world();
        assert!(matches!(
            w.services.users.register(register("root", Role::Admin)).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn teacher_registration_links_students() {
        let w = world();
        let s = w.services.users.register(register("s", Role::Student)).await.unwrap();
        let t = w.services.users.register(register("t", Role::Teacher)).await.unwrap();

        let s = w.store.get_user(s.id).await.unwrap().unwrap();
        assert_eq!(s.teacher_id, Some(t.id));
    }

    #[tokio::test]
    async fn change_password_checks_old_one() {
        let w = world();
        let user = w.services.users.register(register("alice", Role::Student)).await.unwrap();
        let caller = Caller::from(&user);

        assert!(matches!(
            w.services.users.change_password(caller, "wrong", "fresh").await,
            Err(AppError::BadRequest(_))
        ));
        w.services.users.change_password(caller, "secret", "fresh").await.unwrap();
        w.services
            .users
            .login(LoginRequest {
                username: "alice".into(),
                password: "fresh".into(),
                role: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ensure_admin_is_idempotent() {
        let w = world();
        assert!(w.services.users.ensure_admin("root", "rootpw").await.unwrap());
        assert!(!w.services.users.ensure_admin("root", "rootpw").await.unwrap());
        let root = w.store.find_user_by_username("root").await.unwrap().unwrap();
        assert_eq!(root.role, Role::Admin);
    }

    #[tokio::test]
    async fn admin_user_management_rules() {
        let w = world();
        let (_, admin) = w.user("a", Role::Admin).await;
        let (_, teacher) = w.user("t", Role::Teacher).await;
        let (s_user, _) = w.user("s", Role::Student).await;

        assert!(matches!(
            w.services.users.list_users(teacher, None).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            w.services.users.delete_user(admin, admin.id).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            w.services
                .users
                .update_user(
                    admin,
                    s_user.id,
                    AdminUpdateUserRequest {
                        teacher_id: Some(s_user.id),
                        ..Default::default()
                    }
                )
                .await,
            Err(AppError::BadRequest(_))
        ));

        let updated = w
            .services
            .users
            .update_user(
                admin,
                s_user.id,
                AdminUpdateUserRequest {
                    teacher_id: Some(teacher.id),
                    name: Some("Sam".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.teacher_id, Some(teacher.id));
        assert_eq!(updated.name, "Sam");
        assert_eq!(updated.role, Role::Student);

        let students = w.services.users.list_users(admin, Some(Role::Student)).await.unwrap();
        assert_eq!(students.len(), 1);
    }

    #[tokio::test]
    async fn deleting_teacher_cascades_exams_and_unlinks_students() {
        let w = world();
        let (_, admin) = w.user("a", Role::Admin).await;
        let (t_user, teacher) = w.user("t", Role::Teacher).await;
        let (s_user, student) = w.user("s", Role::Student).await;
        w.store.link_students(t_user.id).await.unwrap();

        let exam = w.published(teacher, admin, "Algebra").await;
        w.services.grading.submit_answer(student, exam.id, "42").await.unwrap();

        w.services.users.delete_user(admin, t_user.id).await.unwrap();

        assert!(w.store.get_user(t_user.id).await.unwrap().is_none());
        assert!(w.store.get_exam(exam.id).await.unwrap().is_none());
        assert_eq!(w.store.get_user(s_user.id).await.unwrap().unwrap().teacher_id, None);
        assert!(w
            .store
            .list_exam_data(&ExamDataFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn deleting_student_removes_records() {
        let w = world();
        let (_, admin) = w.user("a", Role::Admin).await;
        let (_, teacher) = w.user("t", Role::Teacher).await;
        let (s_user, student) = w.user("s", Role::Student).await;
        let exam = w.published(teacher, admin, "Algebra").await;
        w.services.grading.submit_answer(student, exam.id, "42").await.unwrap();

        w.services.users.delete_user(admin, s_user.id).await.unwrap();

        assert!(w.store.get_user(s_user.id).await.unwrap().is_none());
        assert!(w.store.get_exam(exam.id).await.unwrap().is_some());
        let rows = w
            .store
            .list_exam_data(&ExamDataFilter {
                student_id: Some(s_user.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
