//! # api-adapters
//!
//! The web routing and orchestration layer for pinboard. The axum surface
//! lives behind the `web-axum` feature; [`context::Context`] is the explicit
//! bundle of service handles every handler receives in place of ambient
//! globals.

pub mod context;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod handlers;

#[cfg(feature = "web-axum")]
pub use router::build_router;

#[cfg(feature = "web-axum")]
mod router {
    use axum::routing::{delete, get, post, put};
    use axum::Router;
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    use crate::context::Context;
    use crate::handlers::{ads, articles, boards, comments, health, messages, users};

    /// Assembles the full HTTP surface. The more specific
    /// `/articles/search` route coexists with `/articles/{article_id}`;
    /// the router prefers the static segment.
    pub fn build_router(ctx: Context) -> Router {
        Router::new()
            .route("/health", get(health::health_check))
            .route("/users", get(users::list))
            .route("/users/sign-up", post(users::sign_up))
            .route("/users/login", post(users::login))
            .route("/users/logout", post(users::logout))
            .route("/users/logout/all", post(users::logout_all))
            .route("/users/token/validation", post(users::validate_token))
            .route("/users/{user_id}", delete(users::delete_account))
            .route("/boards", post(boards::create).get(boards::list))
            .route(
                "/boards/{board_id}/articles",
                post(articles::write).get(articles::list),
            )
            .route("/boards/{board_id}/articles/search", get(articles::search))
            .route(
                "/boards/{board_id}/articles/{article_id}",
                get(articles::detail)
                    .put(articles::edit)
                    .delete(articles::delete),
            )
            .route(
                "/boards/{board_id}/articles/{article_id}/comments",
                post(comments::write),
            )
            .route(
                "/boards/{board_id}/articles/{article_id}/comments/{comment_id}",
                put(comments::edit).delete(comments::delete),
            )
            .route("/ads", post(ads::create).get(ads::list))
            .route("/ads/history/view", get(ads::view_history))
            .route("/ads/history/click", get(ads::click_history))
            .route("/ads/{ad_id}", get(ads::detail))
            .route("/ads/{ad_id}/click", post(ads::click))
            .route("/internal/messages", post(messages::process))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(ctx)
    }
}
