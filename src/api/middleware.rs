//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error type every handler returns
//! - Authentication (access token from cookie or bearer header)

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use cookie::Cookie;
use serde_json::json;
use std::sync::Arc;

use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{AuthService, AuthServiceError, UserService, UserServiceError};

/// Cookie carrying the access token
pub const ACCESS_COOKIE: &str = "accessToken";
/// Cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub db: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub auth_service: Arc<AuthService>,
    /// Mark auth cookies `Secure` (production)
    pub secure_cookies: bool,
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))
    }
}

/// Error returned by handlers, rendered as `{"success": false, "message": ...}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Log the cause and hide it from the client
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::ValidationError(msg) => ApiError::bad_request(msg),
            UserServiceError::EmailTaken => ApiError::bad_request(err.to_string()),
            UserServiceError::NotFound => ApiError::not_found(err.to_string()),
            UserServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            UserServiceError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

impl From<AuthServiceError> for ApiError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::MissingCredentials => ApiError::bad_request(err.to_string()),
            AuthServiceError::InvalidCredentials | AuthServiceError::Unauthenticated => {
                ApiError::unauthorized(err.to_string())
            }
            AuthServiceError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

/// Value of the named cookie, if the request carries it
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|s| Cookie::split_parse(s.to_string()))
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
}

/// Extract the access token: `accessToken` cookie first, then bearer header
pub fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, ACCESS_COOKIE)
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(headers))
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_access_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    let user = state.auth_service.current_user(&token).await?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; accessToken=abc.def.ghi; refreshToken=xyz"),
        );

        assert_eq!(cookie_value(&headers, ACCESS_COOKIE).as_deref(), Some("abc.def.ghi"));
        assert_eq!(cookie_value(&headers, REFRESH_COOKIE).as_deref(), Some("xyz"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_access_token_prefers_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken=from-cookie"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_access_token(&headers).as_deref(), Some("from-cookie"));

        headers.remove(header::COOKIE);
        assert_eq!(extract_access_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_cleared_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken="));
        assert_eq!(extract_access_token(&headers), None);
    }

    #[test]
    fn test_service_error_mapping() {
        let err: ApiError = UserServiceError::EmailTaken.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Email already exists");

        let err: ApiError = UserServiceError::NotFound.into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err: ApiError = AuthServiceError::InvalidCredentials.into();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "Invalid credentials");
    }

    #[test]
    fn test_internal_error_is_not_leaked() {
        let err: ApiError =
            UserServiceError::InternalError(anyhow::anyhow!("connection refused: 10.0.0.5")).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }
}
