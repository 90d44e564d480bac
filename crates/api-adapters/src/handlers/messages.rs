use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use domains::QueueMessage;

use crate::context::Context;
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct MessagePayload {
    pub routing_key: String,
    pub body: String,
}

/// Ingests a message the relay consumer re-posted. Bodies that fail to
/// parse as a known message are accepted and ignored, same as unknown
/// `type` tags; requeueing them could never succeed.
pub async fn process(
    State(ctx): State<Context>,
    Json(payload): Json<MessagePayload>,
) -> ApiResult<Json<&'static str>> {
    let message = match serde_json::from_str::<QueueMessage>(&payload.body) {
        Ok(message) => message,
        Err(err) => {
            tracing::warn!(routing_key = %payload.routing_key, %err, "undecodable relay message");
            return Ok(Json("ok"));
        }
    };

    ctx.notifications.process(message).await?;
    tracing::info!(routing_key = %payload.routing_key, "relay message processed");
    Ok(Json("ok"))
}
