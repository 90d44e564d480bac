//! Wires the in-memory adapters into the real services and router, with
//! request helpers used across the test suite. Cooldown windows keep their
//! production lengths; tests steer the gate's clock instead of sleeping.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;

use api_adapters::context::Context;
use auth_adapters::{Argon2PasswordHasher, JwtTokenProvider};
use domains::{NewUser, PasswordHasher as _, UserRepo, UserRole};
use services::{
    AdService, ArticleService, BoardService, CommentService, NotificationService, RateLimitPolicy,
    RateLimiter, UserService,
};

use crate::memory::{
    MemoryAdRepo, MemoryArticleRepo, MemoryBoardRepo, MemoryCommentRepo, MemoryHistoryStore,
    MemoryNotificationStore, MemoryObjectCache, MemoryPublisher, MemoryRateLimitGate,
    MemorySearchIndex, MemoryTokenBlacklist, MemoryUserRepo,
};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-pw";

pub struct TestApp {
    router: Router,
    pub gate: Arc<MemoryRateLimitGate>,
    pub cache: Arc<MemoryObjectCache>,
    pub search: Arc<MemorySearchIndex>,
    pub history: Arc<MemoryHistoryStore>,
    pub notifications: Arc<MemoryNotificationStore>,
    pub publisher: Arc<MemoryPublisher>,
    pub ads: Arc<MemoryAdRepo>,
    pub policy: RateLimitPolicy,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let users = Arc::new(MemoryUserRepo::default());
        let boards = Arc::new(MemoryBoardRepo::default());
        let articles = Arc::new(MemoryArticleRepo::default());
        let comments = Arc::new(MemoryCommentRepo::default());
        let ads = Arc::new(MemoryAdRepo::default());
        let gate = Arc::new(MemoryRateLimitGate::default());
        let cache = Arc::new(MemoryObjectCache::default());
        let search = Arc::new(MemorySearchIndex::default());
        let history = Arc::new(MemoryHistoryStore::default());
        let notifications = Arc::new(MemoryNotificationStore::default());
        let publisher = Arc::new(MemoryPublisher::default());

        let hasher = Arc::new(Argon2PasswordHasher);
        let tokens = Arc::new(JwtTokenProvider::new(SecretString::from("test-secret"), 60));

        // Same shape as production, scaled down for tests.
        let policy = RateLimitPolicy {
            article_write: Duration::from_secs(300),
            article_edit: Duration::from_secs(300),
            comment_write: Duration::from_secs(60),
            comment_edit: Duration::from_secs(60),
        };
        let limiter = RateLimiter::new(gate.clone(), policy);

        users
            .insert(NewUser {
                username: ADMIN_USERNAME.to_string(),
                email: "admin@localhost".to_string(),
                password_hash: hasher.hash(ADMIN_PASSWORD).unwrap(),
                role: UserRole::Admin,
            })
            .await
            .unwrap();

        let ctx = Context {
            users: UserService::new(
                users,
                hasher,
                tokens,
                Arc::new(MemoryTokenBlacklist::default()),
            ),
            boards: BoardService::new(boards.clone()),
            articles: ArticleService::new(
                boards,
                articles.clone(),
                comments.clone(),
                limiter.clone(),
                search.clone(),
                publisher.clone(),
            ),
            comments: CommentService::new(
                articles.clone(),
                comments.clone(),
                limiter,
                publisher.clone(),
            ),
            ads: AdService::new(
                ads.clone(),
                cache.clone(),
                history.clone(),
                Duration::from_secs(3600),
            ),
            notifications: NotificationService::new(articles, comments, notifications.clone()),
        };

        Self {
            router: api_adapters::build_router(ctx),
            gate,
            cache,
            search,
            history,
            notifications,
            publisher,
            ads,
            policy,
        }
    }

    /// Drives an arbitrary prebuilt request through the router.
    pub async fn raw(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.raw(request).await
    }

    pub async fn sign_up(&self, username: &str, email: &str, password: &str) -> Value {
        let (status, body) = self
            .request(
                "POST",
                "/users/sign-up",
                None,
                Some(json!({"username": username, "email": email, "password": password})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "sign-up failed: {body}");
        body
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .request(
                "POST",
                "/users/login",
                None,
                Some(json!({"username": username, "password": password})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Sign-up plus login in one go; returns the bearer token.
    pub async fn member_token(&self, username: &str) -> String {
        self.sign_up(username, &format!("{username}@test.com"), "pw123")
            .await;
        self.login(username, "pw123").await
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    pub async fn create_board(&self, token: &str, title: &str) -> i64 {
        let (status, body) = self
            .request(
                "POST",
                "/boards",
                Some(token),
                Some(json!({"title": title, "description": "test board"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "board creation failed: {body}");
        body["id"].as_i64().unwrap()
    }

    /// Writes an article and clears the author's write mark so the next
    /// write in the same test is not throttled.
    pub async fn seed_article(&self, token: &str, board_id: i64, title: &str) -> i64 {
        let (status, body) = self
            .request(
                "POST",
                &format!("/boards/{board_id}/articles"),
                Some(token),
                Some(json!({"title": title, "content": format!("{title} content")})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "article write failed: {body}");
        self.gate.advance(self.policy.article_write);
        body["id"].as_i64().unwrap()
    }

    /// Writes a comment and clears the author's comment mark.
    pub async fn seed_comment(
        &self,
        token: &str,
        board_id: i64,
        article_id: i64,
        content: &str,
    ) -> i64 {
        let (status, body) = self
            .request(
                "POST",
                &format!("/boards/{board_id}/articles/{article_id}/comments"),
                Some(token),
                Some(json!({"content": content})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "comment write failed: {body}");
        self.gate.advance(self.policy.comment_write);
        body["id"].as_i64().unwrap()
    }
}
