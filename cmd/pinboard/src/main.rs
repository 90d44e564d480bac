//! # pinboard server
//!
//! Assembles the configured adapters into the service context and serves
//! the HTTP API. All store handles are created here, once, and released
//! when the process stops.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use secrecy::ExposeSecret;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use api_adapters::context::Context;
use auth_adapters::{Argon2PasswordHasher, JwtTokenProvider};
use configs::{RateLimitStrategy, Settings};
use domains::{NewUser, PasswordHasher, RateLimitGate, UserRepo, UserRole};
use services::{
    AdService, ArticleService, BoardService, CommentService, NotificationService, RateLimitPolicy,
    RateLimiter, UserService,
};
use storage_adapters::meili::MeiliSearchIndex;
use storage_adapters::mongo::{MongoHistoryStore, MongoNotificationStore};
use storage_adapters::postgres::{
    DerivedRateLimitGate, PgAdRepo, PgArticleRepo, PgBoardRepo, PgCommentRepo, PgUserRepo,
};
use storage_adapters::rabbit::RabbitPublisher;
use storage_adapters::valkey::{ValkeyObjectCache, ValkeyRateLimitGate, ValkeyTokenBlacklist};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = Settings::load().context("loading configuration")?;

    // Relational store, the source of truth.
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await
        .context("connecting to postgres")?;
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("running migrations")?;

    // Derived stores and the relay.
    let valkey = deadpool_redis::Config::from_url(&settings.valkey.url)
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .context("creating valkey pool")?;

    let search = MeiliSearchIndex::new(
        &settings.search.url,
        settings.search.api_key.expose_secret(),
    )?;
    search.ensure_settings().await?;

    let mongo = mongodb::Client::with_uri_str(&settings.mongodb.url)
        .await
        .context("connecting to mongodb")?
        .database(&settings.mongodb.database);

    let publisher =
        RabbitPublisher::connect(&settings.rabbitmq.url, &settings.rabbitmq.exchange).await?;

    // Repositories and auth primitives.
    let users = Arc::new(PgUserRepo::new(pool.clone()));
    let boards = Arc::new(PgBoardRepo::new(pool.clone()));
    let articles = Arc::new(PgArticleRepo::new(pool.clone()));
    let comments = Arc::new(PgCommentRepo::new(pool.clone()));
    let ads = Arc::new(PgAdRepo::new(pool.clone()));
    let hasher = Arc::new(Argon2PasswordHasher);
    let tokens = Arc::new(JwtTokenProvider::new(
        settings.jwt.secret_key.clone(),
        settings.jwt.expire_minutes,
    ));

    ensure_master_admin(users.as_ref(), hasher.as_ref(), &settings).await?;

    let gate: Arc<dyn RateLimitGate> = match settings.rate_limit.strategy {
        RateLimitStrategy::Valkey => Arc::new(ValkeyRateLimitGate::new(valkey.clone())),
        RateLimitStrategy::Derived => Arc::new(DerivedRateLimitGate::new(pool.clone())),
    };
    let limiter = RateLimiter::new(
        gate,
        RateLimitPolicy {
            article_write: Duration::from_secs(settings.rate_limit.article_write_secs),
            article_edit: Duration::from_secs(settings.rate_limit.article_edit_secs),
            comment_write: Duration::from_secs(settings.rate_limit.comment_write_secs),
            comment_edit: Duration::from_secs(settings.rate_limit.comment_edit_secs),
        },
    );

    let search = Arc::new(search);
    let publisher = Arc::new(publisher);
    let history = Arc::new(MongoHistoryStore::new(mongo.clone()));
    let notifications = Arc::new(MongoNotificationStore::new(mongo));

    let ctx = Context {
        users: UserService::new(
            users,
            hasher,
            tokens,
            Arc::new(ValkeyTokenBlacklist::new(valkey.clone())),
        ),
        boards: BoardService::new(boards.clone()),
        articles: ArticleService::new(
            boards,
            articles.clone(),
            comments.clone(),
            limiter.clone(),
            search,
            publisher.clone(),
        ),
        comments: CommentService::new(articles.clone(), comments.clone(), limiter, publisher),
        ads: AdService::new(
            ads,
            Arc::new(ValkeyObjectCache::new(valkey)),
            history,
            Duration::from_secs(settings.cache.ad_ttl_secs),
        ),
        notifications: NotificationService::new(articles, comments, notifications),
    };

    let app = api_adapters::build_router(ctx);

    let address = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(%address, "pinboard listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("pinboard stopped");
    Ok(())
}

/// Creates the configured master admin account if it does not exist yet.
async fn ensure_master_admin(
    users: &dyn UserRepo,
    hasher: &dyn PasswordHasher,
    settings: &Settings,
) -> anyhow::Result<()> {
    let admin = &settings.admin;
    if users
        .find_active_by_username(&admin.username)
        .await?
        .is_some()
    {
        return Ok(());
    }

    let password_hash = hasher.hash(admin.password.expose_secret())?;
    users
        .insert(NewUser {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash,
            role: UserRole::Admin,
        })
        .await?;
    info!(username = %admin.username, "master admin account created");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received terminate signal, shutting down"),
    }
}
