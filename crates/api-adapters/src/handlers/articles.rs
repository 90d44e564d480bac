use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use domains::{AppError, Article, ArticlePatch, Comment, PageCursor};

use crate::context::Context;
use crate::error::{ApiError, ApiResult};
use crate::extract::CurrentUser;

#[derive(Deserialize)]
pub struct WriteArticleRequest {
    pub title: String,
    pub content: String,
}

#[derive(Deserialize)]
pub struct EditArticleRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub last_id: Option<i64>,
    pub first_id: Option<i64>,
}

impl PageQuery {
    /// `last_id` wins when both are present, matching the list contract.
    fn cursor(&self) -> PageCursor {
        match (self.last_id, self.first_id) {
            (Some(last_id), _) => PageCursor::Before(last_id),
            (None, Some(first_id)) => PageCursor::After(first_id),
            (None, None) => PageCursor::Latest,
        }
    }
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub keyword: Option<String>,
}

#[derive(Serialize)]
pub struct ArticleResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: Option<i64>,
    pub board_id: Option<i64>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Article> for ArticleResponse {
    fn from(article: Article) -> Self {
        Self {
            id: article.id,
            title: article.title,
            content: article.content,
            author_id: article.author_id,
            board_id: article.board_id,
            is_deleted: article.lifecycle.is_deleted,
            created_at: article.created_at,
            updated_at: article.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct CommentInArticle {
    pub id: i64,
    pub content: String,
    pub author_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<Comment> for CommentInArticle {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            content: comment.content,
            author_id: comment.author_id,
            created_at: comment.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct ArticleDetailResponse {
    #[serde(flatten)]
    pub article: ArticleResponse,
    pub comments: Vec<CommentInArticle>,
}

pub async fn write(
    State(ctx): State<Context>,
    CurrentUser(caller): CurrentUser,
    Path(board_id): Path<i64>,
    Json(body): Json<WriteArticleRequest>,
) -> ApiResult<(StatusCode, Json<ArticleResponse>)> {
    let article = ctx
        .articles
        .create(board_id, &caller, body.title, body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(article.into())))
}

pub async fn list(
    State(ctx): State<Context>,
    Path(board_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<ArticleResponse>>> {
    let articles = ctx.articles.list(board_id, page.cursor()).await?;
    Ok(Json(
        articles.into_iter().map(ArticleResponse::from).collect(),
    ))
}

pub async fn search(
    State(ctx): State<Context>,
    Path(board_id): Path<i64>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<ArticleResponse>>> {
    let keyword = query
        .keyword
        .filter(|keyword| !keyword.is_empty())
        .ok_or_else(|| ApiError(AppError::Validation("keyword is required".to_string())))?;
    let articles = ctx.articles.search(board_id, &keyword).await?;
    Ok(Json(
        articles.into_iter().map(ArticleResponse::from).collect(),
    ))
}

pub async fn detail(
    State(ctx): State<Context>,
    Path((board_id, article_id)): Path<(i64, i64)>,
) -> ApiResult<Json<ArticleDetailResponse>> {
    let (article, comments) = ctx.articles.get(board_id, article_id).await?;
    Ok(Json(ArticleDetailResponse {
        article: article.into(),
        comments: comments.into_iter().map(CommentInArticle::from).collect(),
    }))
}

pub async fn edit(
    State(ctx): State<Context>,
    CurrentUser(caller): CurrentUser,
    Path((board_id, article_id)): Path<(i64, i64)>,
    Json(body): Json<EditArticleRequest>,
) -> ApiResult<Json<ArticleResponse>> {
    let patch = ArticlePatch {
        title: body.title,
        content: body.content,
    };
    let article = ctx
        .articles
        .edit(board_id, article_id, &caller, patch)
        .await?;
    Ok(Json(article.into()))
}

pub async fn delete(
    State(ctx): State<Context>,
    CurrentUser(caller): CurrentUser,
    Path((board_id, article_id)): Path<(i64, i64)>,
) -> ApiResult<Json<&'static str>> {
    ctx.articles.delete(board_id, article_id, &caller).await?;
    Ok(Json("article is deleted"))
}
