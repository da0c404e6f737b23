//! Authentication API endpoints
//!
//! - POST /api/v1/auth/login (also /users/login) - open a session
//! - GET /api/v1/auth/me - current user
//! - POST /api/v1/auth/logout (also /users/logout) - clear the session cookies
//! - POST /api/v1/auth/refresh - rotate the token pair

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    response::{AppendHeaders, IntoResponse},
    Json,
};
use cookie::{Cookie, SameSite};
use serde::Deserialize;

use crate::api::middleware::{
    cookie_value, ApiError, AppState, AuthenticatedUser, ACCESS_COOKIE, REFRESH_COOKIE,
};
use crate::api::responses::{ApiResponse, UserResponse};
use crate::services::TokenPair;

/// Request body for login. Fields are optional so a missing one yields the
/// "required" message instead of a deserialization error.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Build an httpOnly, `SameSite=Lax` auth cookie
fn auth_cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> String {
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
        .to_string()
}

fn secs(ttl: u64) -> i64 {
    i64::try_from(ttl).unwrap_or(i64::MAX)
}

/// `Set-Cookie` headers for a fresh token pair
pub fn session_cookies(tokens: TokenPair, secure: bool) -> AppendHeaders<[(header::HeaderName, String); 2]> {
    AppendHeaders([
        (
            header::SET_COOKIE,
            auth_cookie(ACCESS_COOKIE, tokens.access_token, secs(tokens.access_ttl_secs), secure),
        ),
        (
            header::SET_COOKIE,
            auth_cookie(REFRESH_COOKIE, tokens.refresh_token, secs(tokens.refresh_ttl_secs), secure),
        ),
    ])
}

/// `Set-Cookie` headers that expire both auth cookies
pub fn cleared_cookies(secure: bool) -> AppendHeaders<[(header::HeaderName, String); 2]> {
    AppendHeaders([
        (header::SET_COOKIE, auth_cookie(ACCESS_COOKIE, String::new(), 0, secure)),
        (header::SET_COOKIE, auth_cookie(REFRESH_COOKIE, String::new(), 0, secure)),
    ])
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let (user, tokens) = state
        .auth_service
        .login(body.email.as_deref(), body.password.as_deref())
        .await?;

    Ok((
        session_cookies(tokens, state.secure_cookies),
        Json(ApiResponse::ok(UserResponse::from(user))),
    ))
}

/// GET /api/v1/auth/me
///
/// Requires authentication.
pub async fn me(user: AuthenticatedUser) -> Json<ApiResponse<UserResponse>> {
    Json(ApiResponse::ok(user.0.into()))
}

/// POST /api/v1/auth/logout
///
/// Works without a valid session.
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        cleared_cookies(state.secure_cookies),
        Json(ApiResponse::ok(())),
    )
}

/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = cookie_value(&headers, REFRESH_COOKIE)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    let (user, tokens) = state.auth_service.refresh(&token).await?;

    Ok((
        session_cookies(tokens, state.secure_cookies),
        Json(ApiResponse::ok(UserResponse::from(user))),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_cookie_attributes() {
        let cookie = auth_cookie(ACCESS_COOKIE, "tok".to_string(), 86_400, false);

        assert!(cookie.starts_with("accessToken=tok"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn test_auth_cookie_secure_in_production() {
        let cookie = auth_cookie(REFRESH_COOKIE, "tok".to_string(), 60, true);
        assert!(cookie.contains("Secure"));
    }

    #[test]
    fn test_cleared_cookie_expires_immediately() {
        let cookie = auth_cookie(ACCESS_COOKIE, String::new(), 0, false);
        assert!(cookie.starts_with("accessToken=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
