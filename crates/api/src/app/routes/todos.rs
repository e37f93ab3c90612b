use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use tasklane_auth::Principal;
use tasklane_core::{Failure, TodoId};
use tasklane_infra::Todo;

use crate::app::dto::TodoRequest;
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiPath};
use crate::app::services::AppServices;

const TODO_NOT_FOUND: &str = "Todo item not found";

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_todos).post(create_todo))
        .route("/batch", post(create_todos))
        .route("/:id", get(get_todo).put(update_todo).delete(delete_todo))
}

pub async fn list_todos(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Todo>>, ApiError> {
    Ok(Json(services.db.list_todos_for(principal.user_id).await?))
}

pub async fn get_todo(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Todo>, ApiError> {
    let id: TodoId = id.parse()?;
    services
        .db
        .get_todo(principal.user_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(TODO_NOT_FOUND))
}

pub async fn create_todo(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    ApiJson(body): ApiJson<TodoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new = body.validate()?;
    let todo = services.db.create_todo(principal.user_id, &new).await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

/// Create several todos atomically: either all are stored or none are.
pub async fn create_todos(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    ApiJson(body): ApiJson<Vec<TodoRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    if body.is_empty() {
        return Err(Failure::validation("items", "must contain at least one todo").into());
    }
    let items = body
        .into_iter()
        .map(TodoRequest::validate)
        .collect::<Result<Vec<_>, _>>()?;
    let todos = services.db.create_todos(principal.user_id, &items).await?;
    Ok((StatusCode::CREATED, Json(todos)))
}

pub async fn update_todo(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<TodoRequest>,
) -> Result<Json<Todo>, ApiError> {
    let id: TodoId = id.parse()?;
    let changes = body.validate()?;
    services
        .db
        .update_todo(principal.user_id, id, &changes)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(TODO_NOT_FOUND))
}

pub async fn delete_todo(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let id: TodoId = id.parse()?;
    if services.db.delete_todo(principal.user_id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(TODO_NOT_FOUND))
    }
}
