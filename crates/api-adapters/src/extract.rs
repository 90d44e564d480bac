//! Request extractors: authenticated caller, optional caller, and the
//! client address used as the anonymous-visitor key.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use domains::{AppError, User};

use crate::context::Context;
use crate::error::ApiError;

fn authorization_header(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

/// Mandatory authentication. A missing or malformed header is a validation
/// failure (422), a bad token an authentication failure (401), matching the
/// error taxonomy.
pub struct CurrentUser(pub User);

impl FromRequestParts<Context> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, ctx: &Context) -> Result<Self, Self::Rejection> {
        let header = authorization_header(parts).ok_or_else(|| {
            ApiError(AppError::Validation(
                "Missing authorization header".to_string(),
            ))
        })?;
        ctx.users
            .authenticate(header)
            .await
            .map(CurrentUser)
            .map_err(ApiError)
    }
}

/// Optional authentication; every failure degrades to anonymous.
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<Context> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, ctx: &Context) -> Result<Self, Self::Rejection> {
        let header = authorization_header(parts);
        Ok(MaybeUser(ctx.users.authenticate_optional(header).await))
    }
}

/// Best-effort client address: `X-Forwarded-For`'s first hop when present
/// (the deployment fronts the server with a proxy), otherwise the peer
/// address.
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(|value| value.trim().to_string());

        let ip = forwarded.unwrap_or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string())
        });
        Ok(ClientIp(ip))
    }
}
