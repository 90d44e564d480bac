use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use domains::Comment;

use crate::context::Context;
use crate::error::ApiResult;
use crate::extract::CurrentUser;

#[derive(Deserialize)]
pub struct WriteCommentRequest {
    pub content: String,
}

#[derive(Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub content: String,
    pub author_id: Option<i64>,
    pub article_id: Option<i64>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            content: comment.content,
            author_id: comment.author_id,
            article_id: comment.article_id,
            is_deleted: comment.lifecycle.is_deleted,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

pub async fn write(
    State(ctx): State<Context>,
    CurrentUser(caller): CurrentUser,
    Path((board_id, article_id)): Path<(i64, i64)>,
    Json(body): Json<WriteCommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    let comment = ctx
        .comments
        .create(board_id, article_id, &caller, body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

pub async fn edit(
    State(ctx): State<Context>,
    CurrentUser(caller): CurrentUser,
    Path((board_id, article_id, comment_id)): Path<(i64, i64, i64)>,
    Json(body): Json<WriteCommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    let comment = ctx
        .comments
        .edit(board_id, article_id, comment_id, &caller, body.content)
        .await?;
    Ok(Json(comment.into()))
}

pub async fn delete(
    State(ctx): State<Context>,
    CurrentUser(caller): CurrentUser,
    Path((board_id, article_id, comment_id)): Path<(i64, i64, i64)>,
) -> ApiResult<Json<&'static str>> {
    ctx.comments
        .delete(board_id, article_id, comment_id, &caller)
        .await?;
    Ok(Json("comment is deleted"))
}
