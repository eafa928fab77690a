// src/auth/service.rs
// Registration/login/logout business logic: hashes and verifies
// passwords, and mints an opaque session row rather than a signed token.

use crate::auth::models::{AuthResponse, LoginRequest, RegisterRequest};
use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::session::SessionRepository;
use crate::user::UserRepository;

#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    sessions: SessionRepository,
    session_ttl_seconds: i64,
}

impl AuthService {
    pub fn new(users: UserRepository, sessions: SessionRepository, session_ttl_seconds: i64) -> Self {
        Self {
            users,
            sessions,
            session_ttl_seconds,
        }
    }

    /// The conflict message is "User already exists" for both duplicate
    /// username and duplicate email; callers should not depend on the
    /// exact wording.
    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthResponse> {
        if self.users.username_exists(&request.username).await? {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        if let Some(email) = &request.email {
            if self.users.email_exists(email).await? {
                return Err(AppError::Conflict("User already exists".to_string()));
            }
        }

        let password_hash =
            hash_password(&request.password).map_err(AppError::Internal)?;
        let user = self
            .users
            .create(
                &request.username,
                request.email.as_deref(),
                &password_hash,
                &request.display_name,
            )
            .await?;

        let session = self.sessions.create(&user.id, self.session_ttl_seconds).await?;

        Ok(AuthResponse {
            user,
            token: session.token,
        })
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let stored = self
            .users
            .get_by_username(&request.username)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        if !stored.is_active {
            return Err(AppError::Unauthenticated);
        }

        let matches = verify_password(&request.password, &stored.password_hash)
            .map_err(AppError::Internal)?;
        if !matches {
            return Err(AppError::Unauthenticated);
        }

        let session = self
            .sessions
            .create(&stored.id, self.session_ttl_seconds)
            .await?;

        Ok(AuthResponse {
            user: stored.into(),
            token: session.token,
        })
    }

    pub async fn logout(&self, token: &str) -> AppResult<()> {
        self.sessions.delete_by_token(token).await
    }
}
