use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;

use tasklane_auth::Role;
use tasklane_core::Failure;
use tasklane_infra::NewUser;

use crate::app::dto::{self, RegisterRequest, RegisterResponse, TokenRequest, TokenResponse};
use crate::app::errors::ApiError;
use crate::app::extract::{ApiForm, ApiJson};
use crate::app::services::AppServices;

const INVALID_CREDENTIALS: &str = "Invalid username or password";
const ACCOUNT_DISABLED: &str = "Account is disabled";

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/token", post(token))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reg = body.validate()?;

    if services.precheck_duplicates {
        if services.db.username_exists(&reg.username).await? {
            return Err(Failure::username_taken(reg.username).into());
        }
        if services.db.email_exists(&reg.email).await? {
            return Err(Failure::email_taken(reg.email).into());
        }
    }

    let hashed_password = services.hash_password(reg.password).await?;
    let user = services
        .db
        .create_user(&NewUser {
            email: reg.email,
            username: reg.username,
            first_name: reg.first_name,
            last_name: reg.last_name,
            hashed_password,
            role: reg.role.as_str().to_string(),
        })
        .await?;

    tracing::info!(user_id = %user.id, role = %user.role, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User created successfully",
            user: user.into(),
        }),
    ))
}

pub async fn token(
    Extension(services): Extension<Arc<AppServices>>,
    ApiForm(form): ApiForm<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let username = dto::required("username", form.username)?;
    let password = dto::required("password", form.password)?;

    let Some(user) = services.db.find_user_by_username(&username).await? else {
        return Err(Failure::authentication_failed(INVALID_CREDENTIALS).into());
    };
    if !services
        .verify_password(password, user.hashed_password.clone())
        .await?
    {
        return Err(Failure::authentication_failed(INVALID_CREDENTIALS).into());
    }
    if !user.is_active {
        return Err(Failure::authentication_failed(ACCOUNT_DISABLED).into());
    }

    let role: Role = user
        .role
        .parse()
        .map_err(|e| anyhow::anyhow!("stored user {} has bad role: {e}", user.id))?;
    let token = services
        .tokens
        .issue(user.id, &user.username, role, Utc::now())?;

    Ok(Json(TokenResponse::bearer(token)))
}
