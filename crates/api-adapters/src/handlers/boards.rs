use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use domains::Board;

use crate::context::Context;
use crate::error::ApiResult;
use crate::extract::CurrentUser;

#[derive(Deserialize)]
pub struct CreateBoardRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize)]
pub struct BoardResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Board> for BoardResponse {
    fn from(board: Board) -> Self {
        Self {
            id: board.id,
            title: board.title,
            description: board.description,
            is_deleted: board.lifecycle.is_deleted,
            created_at: board.created_at,
            updated_at: board.updated_at,
        }
    }
}

pub async fn create(
    State(ctx): State<Context>,
    CurrentUser(caller): CurrentUser,
    Json(body): Json<CreateBoardRequest>,
) -> ApiResult<(StatusCode, Json<BoardResponse>)> {
    let board = ctx
        .boards
        .create(&caller, body.title, body.description)
        .await?;
    Ok((StatusCode::CREATED, Json(board.into())))
}

pub async fn list(State(ctx): State<Context>) -> ApiResult<Json<Vec<BoardResponse>>> {
    let boards = ctx.boards.list().await?;
    Ok(Json(boards.into_iter().map(BoardResponse::from).collect()))
}
