use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{required_text, RequestHandler, Service, ServiceError};
use crate::auth;
use crate::models::users::{NewUser, ProfileUpdate, User};
use crate::repositories::users::UserRepository;

pub enum UserRequest {
    Signup {
        body: NewUser,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    VerifyCredentials {
        email: String,
        password: String,
        response: oneshot::Sender<Result<Option<User>, ServiceError>>,
    },
    GetProfile {
        owner: String,
        response: oneshot::Sender<Result<Option<User>, ServiceError>>,
    },
    UpdateProfile {
        owner: String,
        update: ProfileUpdate,
        response: oneshot::Sender<Result<Option<User>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: UserRepository,
}

impl UserRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        let repository = UserRepository::new(sql_conn);

        UserRequestHandler { repository }
    }

    async fn signup(&self, body: NewUser) -> Result<User, ServiceError> {
        let full_name = required_text(body.full_name, "fullName")?;
        let email = required_text(body.email, "email")?;
        let password = required_text(body.password, "password")?;
        let email = auth::normalize_email(&email);

        let existing = self
            .repository
            .find_by_email(&email)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;
        if existing.is_some() {
            return Err(ServiceError::Validation(
                "Email already registered".to_string(),
            ));
        }

        let hashed = auth::hash_password(&password)
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        self.repository
            .insert_user(
                &email,
                &full_name,
                body.phone.as_deref().unwrap_or(""),
                body.company.as_deref().unwrap_or(""),
                body.address.as_deref().unwrap_or(""),
                &hashed,
            )
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, ServiceError> {
        let email = auth::normalize_email(email);

        let user = self
            .repository
            .find_by_email(&email)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;
        let Some(user) = user else {
            return Ok(None);
        };

        let ok = auth::verify_password(password, &user.password_hash)
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        Ok(ok.then_some(user))
    }

    async fn get_profile(&self, owner: &str) -> Result<Option<User>, ServiceError> {
        self.repository
            .find_by_email(owner)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    async fn update_profile(
        &self,
        owner: &str,
        update: ProfileUpdate,
    ) -> Result<Option<User>, ServiceError> {
        self.repository
            .update_profile(
                owner,
                update.phone.as_deref().unwrap_or(""),
                update.address.as_deref().unwrap_or(""),
                update.company.as_deref().unwrap_or(""),
            )
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::Signup { body, response } => {
                let user = self.signup(body).await;
                let _ = response.send(user);
            }
            UserRequest::VerifyCredentials {
                email,
                password,
                response,
            } => {
                let user = self.verify_credentials(&email, &password).await;
                let _ = response.send(user);
            }
            UserRequest::GetProfile { owner, response } => {
                let user = self.get_profile(&owner).await;
                let _ = response.send(user);
            }
            UserRequest::UpdateProfile {
                owner,
                update,
                response,
            } => {
                let user = self.update_profile(&owner, update).await;
                let _ = response.send(user);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}
