use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use domains::{AdAudience, Advertisement, NewAdvertisement};

use crate::context::Context;
use crate::error::ApiResult;
use crate::extract::{ClientIp, CurrentUser, MaybeUser};

#[derive(Deserialize)]
pub struct WriteAdRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub click_count: i64,
}

fn default_visible() -> bool {
    true
}

#[derive(Deserialize)]
pub struct ViewQuery {
    #[serde(default)]
    pub is_true_view: bool,
}

#[derive(Serialize)]
pub struct AdResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub is_visible: bool,
    pub is_deleted: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Advertisement> for AdResponse {
    fn from(ad: Advertisement) -> Self {
        Self {
            id: ad.id,
            title: ad.title,
            content: ad.content,
            is_visible: ad.is_visible,
            is_deleted: ad.lifecycle.is_deleted,
            start_date: ad.start_date,
            end_date: ad.end_date,
            view_count: ad.view_count,
            click_count: ad.click_count,
            created_at: ad.created_at,
            updated_at: ad.updated_at,
        }
    }
}

pub async fn create(
    State(ctx): State<Context>,
    CurrentUser(caller): CurrentUser,
    Json(body): Json<WriteAdRequest>,
) -> ApiResult<(StatusCode, Json<AdResponse>)> {
    let ad = ctx
        .ads
        .create(
            &caller,
            NewAdvertisement {
                title: body.title,
                content: body.content,
                is_visible: body.is_visible,
                start_date: body.start_date,
                end_date: body.end_date,
                view_count: body.view_count,
                click_count: body.click_count,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ad.into())))
}

pub async fn list(State(ctx): State<Context>) -> ApiResult<Json<Vec<AdResponse>>> {
    let ads = ctx.ads.list().await?;
    Ok(Json(ads.into_iter().map(AdResponse::from).collect()))
}

pub async fn detail(
    State(ctx): State<Context>,
    MaybeUser(viewer): MaybeUser,
    ClientIp(client_ip): ClientIp,
    Path(ad_id): Path<i64>,
    Query(query): Query<ViewQuery>,
) -> ApiResult<Json<AdResponse>> {
    let ad = ctx
        .ads
        .get(ad_id, viewer.as_ref(), client_ip, query.is_true_view)
        .await?;
    Ok(Json(ad.into()))
}

pub async fn click(
    State(ctx): State<Context>,
    MaybeUser(viewer): MaybeUser,
    ClientIp(client_ip): ClientIp,
    Path(ad_id): Path<i64>,
) -> ApiResult<Json<&'static str>> {
    ctx.ads.click(ad_id, viewer.as_ref(), client_ip).await?;
    Ok(Json("click"))
}

pub async fn view_history(State(ctx): State<Context>) -> ApiResult<Json<Vec<AdAudience>>> {
    Ok(Json(ctx.ads.view_history().await?))
}

pub async fn click_history(State(ctx): State<Context>) -> ApiResult<Json<Vec<AdAudience>>> {
    Ok(Json(ctx.ads.click_history().await?))
}
