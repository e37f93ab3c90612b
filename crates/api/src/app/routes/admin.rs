//! Administration and self-service account routes.
//!
//! `/users` and `/todos` are admin-only; `/user` and
//! `/user/change-password` act on the caller's own account.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use tasklane_auth::Principal;
use tasklane_core::UserId;
use tasklane_infra::{Todo, User};

use crate::app::dto::{ChangePasswordRequest, UserResponse};
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiPath};
use crate::app::services::AppServices;
use crate::authz::require_admin;

const USER_NOT_FOUND: &str = "User not found";

pub fn router() -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user))
        .route("/todos", get(list_all_todos))
        .route("/user", get(current_user))
        .route("/user/change-password", put(change_password))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_admin(&principal)?;
    let users = services.db.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<UserResponse>, ApiError> {
    require_admin(&principal)?;
    let id: UserId = id.parse()?;
    let user = load_user(&services, id).await?;
    Ok(Json(user.into()))
}

pub async fn list_all_todos(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Todo>>, ApiError> {
    require_admin(&principal)?;
    Ok(Json(services.db.list_all_todos().await?))
}

pub async fn current_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = load_user(&services, principal.user_id).await?;
    Ok(Json(user.into()))
}

pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let (current, new) = body.validate()?;
    let user = load_user(&services, principal.user_id).await?;

    if !services
        .verify_password(current, user.hashed_password)
        .await?
    {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }

    let hashed = services.hash_password(new).await?;
    if !services.db.update_password(user.id, &hashed).await? {
        return Err(ApiError::not_found(USER_NOT_FOUND));
    }

    tracing::info!(user_id = %user.id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

async fn load_user(services: &AppServices, id: UserId) -> Result<User, ApiError> {
    services
        .db
        .find_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))
}
