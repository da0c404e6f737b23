//! User API endpoints
//!
//! Public:
//! - POST /api/v1/users, /api/v1/users/register - register
//!
//! Protected (require authentication):
//! - GET /api/v1/users - list
//! - GET /api/v1/users/{id} - get
//! - PUT /api/v1/users/{id} - update (self, or any user as admin)
//! - DELETE /api/v1/users/{id} - delete (self, or any user as admin)

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{ApiResponse, MessageResponse, UserResponse};
use crate::models::{CreateUserInput, UpdateUserInput, UserStatus};

/// Request body for registration
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub address: Option<String>,
}

/// Request body for updates. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub address: Option<String>,
    pub status: Option<UserStatus>,
    pub is_admin: Option<bool>,
}

impl From<UpdateUserRequest> for UpdateUserInput {
    fn from(body: UpdateUserRequest) -> Self {
        Self {
            name: body.name,
            email: body.email,
            password: body.password,
            address: body.address,
            status: body.status,
            is_admin: body.is_admin,
        }
    }
}

/// Parse the `{id}` path segment.
///
/// Non-numeric ids are a 400. Numeric ids outside the `SERIAL` range cannot
/// name a row, so they are a 404 like any other missing user.
fn parse_id(raw: &str) -> Result<i32, ApiError> {
    let id = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| ApiError::bad_request("Invalid user ID"))?;
    i32::try_from(id).map_err(|_| ApiError::not_found("User not found"))
}

/// POST /api/v1/users
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let mut input = CreateUserInput::new(
        body.name.unwrap_or_default(),
        body.email.unwrap_or_default(),
        body.password.unwrap_or_default(),
    );
    input.address = body.address;

    let user = state.user_service.register(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(UserResponse::from(user))),
    ))
}

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ApiError> {
    let users = state.user_service.list().await?;
    Ok(Json(ApiResponse::ok(
        users.into_iter().map(UserResponse::from).collect(),
    )))
}

/// GET /api/v1/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let id = parse_id(&id)?;
    let user = state.user_service.get(id).await?;
    Ok(Json(ApiResponse::ok(user.into())))
}

/// PUT /api/v1/users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<String>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let id = parse_id(&id)?;
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let user = state.user_service.update(&actor, id, body.into()).await?;
    Ok(Json(ApiResponse::ok(user.into())))
}

/// DELETE /api/v1/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id)?;
    state.user_service.delete(&actor, id).await?;
    Ok(Json(MessageResponse::ok("User deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert_eq!(parse_id("abc").unwrap_err().status, StatusCode::BAD_REQUEST);
        assert_eq!(parse_id("1.5").unwrap_err().message, "Invalid user ID");

        let too_big = parse_id("3000000000").unwrap_err();
        assert_eq!(too_big.status, StatusCode::NOT_FOUND);
        assert_eq!(too_big.message, "User not found");
        assert_eq!(parse_id("-2147483649").unwrap_err().status, StatusCode::NOT_FOUND);
        assert_eq!(
            parse_id("99999999999999999999").unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
    }
}
