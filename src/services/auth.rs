//! Authentication service
//!
//! Login, session lookup and refresh on top of `UserService` and
//! `JwtManager`. Both login routes go through here, so every session is an
//! access/refresh pair from the same issuer.

use crate::models::User;
use crate::services::token::{JwtManager, TokenError, TokenPair, TokenType};
use crate::services::user::{UserService, UserServiceError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("Email and password are required")]
    MissingCredentials,

    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No usable token, or its user no longer exists
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<UserServiceError> for AuthServiceError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::NotFound => AuthServiceError::Unauthenticated,
            UserServiceError::InternalError(e) => AuthServiceError::InternalError(e),
            other => AuthServiceError::InternalError(anyhow::anyhow!(other)),
        }
    }
}

impl From<TokenError> for AuthServiceError {
    fn from(err: TokenError) -> Self {
        tracing::debug!("Token rejected: {}", err);
        AuthServiceError::Unauthenticated
    }
}

pub struct AuthService {
    users: Arc<UserService>,
    jwt: JwtManager,
}

impl AuthService {
    pub fn new(users: Arc<UserService>, jwt: JwtManager) -> Self {
        Self { users, jwt }
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    /// Check credentials and open a session.
    ///
    /// Unknown email and wrong password both yield `InvalidCredentials`.
    pub async fn login(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<(User, TokenPair), AuthServiceError> {
        let (Some(email), Some(password)) = (
            email.filter(|e| !e.trim().is_empty()),
            password.filter(|p| !p.is_empty()),
        ) else {
            return Err(AuthServiceError::MissingCredentials);
        };

        let Some(user) = self.users.authenticate(email, password).await? else {
            tracing::debug!("Failed login attempt");
            return Err(AuthServiceError::InvalidCredentials);
        };

        let tokens = self.issue(&user)?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok((user, tokens))
    }

    /// Resolve an access token to its user
    pub async fn current_user(&self, access_token: &str) -> Result<User, AuthServiceError> {
        let claims = self.jwt.verify(access_token, TokenType::Access)?;
        Ok(self.users.get(claims.user_id).await?)
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// Fails if the token is not a valid refresh token or its user is gone.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(User, TokenPair), AuthServiceError> {
        let claims = self.jwt.verify(refresh_token, TokenType::Refresh)?;
        let user = self.users.get(claims.user_id).await?;
        let tokens = self.issue(&user)?;
        Ok((user, tokens))
    }

    /// Signing failures are server-side, not an authentication problem
    fn issue(&self, user: &User) -> Result<TokenPair, AuthServiceError> {
        self.jwt
            .issue_pair(user.id)
            .map_err(|e| AuthServiceError::InternalError(anyhow::Error::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::memory::InMemoryUserRepository;
    use crate::models::CreateUserInput;

    async fn setup() -> (AuthService, User) {
        let users = Arc::new(UserService::new(InMemoryUserRepository::boxed()));
        let user = users
            .register(CreateUserInput::new("Ada", "ada@example.com", "password123"))
            .await
            .unwrap();
        let auth = AuthService::new(users, JwtManager::new("test-secret", 3600, 7200));
        (auth, user)
    }

    #[tokio::test]
    async fn test_login_success() {
        let (auth, user) = setup().await;
        let (logged_in, tokens) = auth
            .login(Some("ada@example.com"), Some("password123"))
            .await
            .unwrap();

        assert_eq!(logged_in.id, user.id);
        assert_eq!(tokens.access_ttl_secs, 3600);
        assert_eq!(tokens.refresh_ttl_secs, 7200);
        let me = auth.current_user(&tokens.access_token).await.unwrap();
        assert_eq!(me.id, user.id);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (auth, _) = setup().await;

        let wrong_password = auth.login(Some("ada@example.com"), Some("nope")).await;
        let unknown_email = auth.login(Some("who@example.com"), Some("password123")).await;

        assert!(matches!(wrong_password, Err(AuthServiceError::InvalidCredentials)));
        assert!(matches!(unknown_email, Err(AuthServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_missing_fields() {
        let (auth, _) = setup().await;

        assert!(matches!(
            auth.login(None, Some("password123")).await,
            Err(AuthServiceError::MissingCredentials)
        ));
        assert!(matches!(
            auth.login(Some("ada@example.com"), Some("")).await,
            Err(AuthServiceError::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let (auth, _) = setup().await;
        let (_, tokens) = auth
            .login(Some("ada@example.com"), Some("password123"))
            .await
            .unwrap();

        assert!(matches!(
            auth.current_user(&tokens.refresh_token).await,
            Err(AuthServiceError::Unauthenticated)
        ));
        assert!(matches!(
            auth.refresh(&tokens.access_token).await,
            Err(AuthServiceError::Unauthenticated)
        ));

        let (user, rotated) = auth.refresh(&tokens.refresh_token).await.unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_ne!(rotated.refresh_token, tokens.refresh_token);
    }

    #[tokio::test]
    async fn test_token_for_deleted_user() {
        let (auth, _) = setup().await;
        let token = auth.jwt().issue(999, TokenType::Access).unwrap();

        assert!(matches!(
            auth.current_user(&token).await,
            Err(AuthServiceError::Unauthenticated)
        ));
    }
}
