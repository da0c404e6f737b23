//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - User registration and CRUD
//! - Authentication (login, logout, current user, token refresh)
//! - Health check

pub mod auth;
pub mod health;
pub mod middleware;
pub mod responses;
pub mod users;

use axum::{
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Protected routes (need an access token)
    let protected_routes = Router::new()
        .route("/users", get(users::list_users))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/auth/me", get(auth::me))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .route("/users", post(users::register))
        .route("/users/register", post(users::register))
        .route("/users/login", post(auth::login))
        .route("/users/logout", post(auth::logout))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/refresh", post(auth::refresh))
        .route("/health", get(health::health))
        .merge(protected_routes)
}

/// CORS with credentials.
///
/// `cors_origin` is a comma-separated allow list. Without one the request's
/// own origin is echoed back.
pub fn build_cors(cors_origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let origins = cors_origin
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(HeaderValue::from_str)
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()
        .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?
        .unwrap_or_default();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true))
}

/// JSON 404 for unmatched routes
async fn not_found(uri: Uri) -> impl IntoResponse {
    // Path and query only, even for absolute-form request targets
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": "Not Found",
            "message": format!("Route {} not found", target),
        })),
    )
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: Option<&str>) -> anyhow::Result<Router> {
    let cors = build_cors(cors_origin)?;

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state))
}
