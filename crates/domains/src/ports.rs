//! # Core Traits (Ports)
//!
//! Adapter crates implement these against Postgres, Redis, Meilisearch,
//! MongoDB and RabbitMQ; service code only ever sees the trait objects.
//! With the `testing` feature enabled, mockall generates a `MockXxx` type
//! for each port.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::messages::QueueMessage;
use crate::models::{
    AdAudience, Advertisement, Article, ArticleDocument, ArticlePatch, Board, Comment,
    HistoryEvent, HistoryKind, NewAdvertisement, NewArticle, NewBoard, NewComment, NewUser,
    Notification, PageCursor, User,
};

/// Durable user accounts. Inserts translate uniqueness violations on
/// username/email into `AppError::Conflict`.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User>;
    async fn find_active_by_id(&self, id: i64) -> Result<Option<User>>;
    async fn find_active_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn list_active(&self) -> Result<Vec<User>>;
    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BoardRepo: Send + Sync {
    async fn insert(&self, board: NewBoard) -> Result<Board>;
    async fn find_active(&self, id: i64) -> Result<Option<Board>>;
    async fn list_active(&self) -> Result<Vec<Board>>;
}

/// Source of truth for articles. All `find`/`list` methods exclude
/// soft-deleted rows.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ArticleRepo: Send + Sync {
    async fn insert(&self, article: NewArticle) -> Result<Article>;
    /// Active article scoped to its board.
    async fn find_active(&self, board_id: i64, id: i64) -> Result<Option<Article>>;
    /// Active article by id alone; used by the fan-out path, which has no
    /// board context.
    async fn find_active_by_id(&self, id: i64) -> Result<Option<Article>>;
    async fn list_page(&self, board_id: i64, cursor: PageCursor, limit: i64)
        -> Result<Vec<Article>>;
    async fn list_active_by_ids(&self, board_id: i64, ids: Vec<i64>) -> Result<Vec<Article>>;
    async fn update(&self, id: i64, patch: ArticlePatch, at: DateTime<Utc>) -> Result<Article>;
    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn insert(&self, comment: NewComment) -> Result<Comment>;
    async fn find_active(&self, article_id: i64, id: i64) -> Result<Option<Comment>>;
    async fn find_active_by_id(&self, id: i64) -> Result<Option<Comment>>;
    async fn list_active_for_article(&self, article_id: i64) -> Result<Vec<Comment>>;
    async fn update_content(&self, id: i64, content: &str, at: DateTime<Utc>) -> Result<Comment>;
    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AdRepo: Send + Sync {
    async fn insert(&self, ad: NewAdvertisement) -> Result<Advertisement>;
    async fn find_active(&self, id: i64) -> Result<Option<Advertisement>>;
    async fn list_active(&self) -> Result<Vec<Advertisement>>;
}

/// Per-identity cooldown marks. The mark's presence is the whole gate; it
/// carries no payload. `mark` must only be called after the guarded write
/// has committed.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RateLimitGate: Send + Sync {
    /// Whether a mark for `(user, kind)` is still in force. Explicit-mark
    /// implementations ignore `window` (the mark's expiry encodes it);
    /// derived-timestamp implementations compare the newest owned row
    /// against it.
    async fn is_limited(&self, user_id: i64, kind: &str, window: Duration) -> Result<bool>;
    async fn mark(&self, user_id: i64, kind: &str, window: Duration) -> Result<()>;
}

/// Derived text index over articles. Upsert/remove are best-effort; callers
/// log and swallow failures rather than failing the relational write.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn upsert(&self, doc: &ArticleDocument) -> Result<()>;
    async fn remove(&self, article_id: i64) -> Result<()>;
    /// Full-text match on content, filtered to one board. Returns matching
    /// article ids.
    async fn search(&self, board_id: i64, keyword: &str) -> Result<Vec<i64>>;
}

/// Serialized read-model cache (cache-aside, populated on miss).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ObjectCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;
}

/// Append-only view/click event log with prior-day distinct-visitor
/// aggregation.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn record(&self, kind: HistoryKind, event: HistoryEvent) -> Result<()>;
    /// Distinct visitors per ad within `[start, end)`: identified events
    /// keyed by username, anonymous events keyed by client address, the two
    /// partition counts summed per ad. Ads without events are absent.
    async fn unique_visitors(
        &self,
        kind: HistoryKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AdAudience>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn append(&self, notification: Notification) -> Result<()>;
}

/// Outbound relay. Publishing is fire-and-forget with respect to the
/// triggering request.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, message: &QueueMessage) -> Result<()>;
}

/// Revoked-token set with expiry.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<()>;
    async fn is_revoked(&self, token: &str) -> Result<bool>;
}

/// Password hashing contract (argon2 in production).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plain: &str) -> Result<String>;
    fn verify(&self, plain: &str, hash: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Bearer-token issuance and verification contract.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TokenProvider: Send + Sync {
    fn issue(&self, username: &str) -> Result<String>;
    fn decode(&self, token: &str) -> Result<TokenClaims>;
}
