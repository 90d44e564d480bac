use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use domains::{AppError, User, UserRole};

use crate::context::Context;
use crate::error::{ApiError, ApiResult};
use crate::extract::CurrentUser;

#[derive(Deserialize)]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

fn bearer_header(headers: &HeaderMap) -> ApiResult<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            ApiError(AppError::Validation(
                "Missing authorization header".to_string(),
            ))
        })
}

pub async fn sign_up(
    State(ctx): State<Context>,
    Json(body): Json<SignUpRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = ctx
        .users
        .sign_up(body.username, body.email, body.password)
        .await?;
    Ok(Json(user.into()))
}

pub async fn login(
    State(ctx): State<Context>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let access_token = ctx.users.login(&body.username, &body.password).await?;
    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer",
    }))
}

/// Single-session logout is client-side token disposal.
pub async fn logout(CurrentUser(_user): CurrentUser) -> Json<&'static str> {
    Json("ok")
}

pub async fn logout_all(
    State(ctx): State<Context>,
    CurrentUser(_user): CurrentUser,
    headers: HeaderMap,
) -> ApiResult<Json<&'static str>> {
    let header = bearer_header(&headers)?;
    ctx.users.logout_all(header).await?;
    Ok(Json("ok"))
}

pub async fn validate_token(
    State(ctx): State<Context>,
    headers: HeaderMap,
) -> ApiResult<Json<&'static str>> {
    let header = bearer_header(&headers)?;
    ctx.users.authenticate(header).await?;
    Ok(Json("ok"))
}

pub async fn list(
    State(ctx): State<Context>,
    CurrentUser(_user): CurrentUser,
) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = ctx.users.list().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn delete_account(
    State(ctx): State<Context>,
    CurrentUser(caller): CurrentUser,
    Path(user_id): Path<i64>,
) -> ApiResult<StatusCode> {
    ctx.users.delete_account(&caller, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
