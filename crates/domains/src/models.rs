//! # Domain Models
//!
//! These structs represent the core entities of pinboard. Identifiers are
//! database-assigned `i64` sequence values; cursor pagination compares
//! against them directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::Lifecycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Member,
    Guest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string; never serialized out through the API layer.
    pub password_hash: String,
    pub role: UserRole,
    pub last_login: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}

/// A Board groups Articles (e.g. "General", "Announcements").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBoard {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: Option<i64>,
    pub board_id: Option<i64>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub board_id: i64,
}

/// Partial edit; `None` fields are left untouched. An edit where both
/// fields are `None` is accepted and applied as a no-op.
#[derive(Debug, Clone, Default)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl ArticlePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub author_id: Option<i64>,
    pub article_id: Option<i64>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub author_id: i64,
    pub article_id: i64,
}

/// Banner advertisement. Low churn; single-entity reads go through the
/// object cache (see `ObjectCache`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advertisement {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub is_visible: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub click_count: i64,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAdvertisement {
    pub title: String,
    pub content: String,
    pub is_visible: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub click_count: i64,
}

/// Keyset cursor over article ids, always descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCursor {
    Latest,
    /// Rows with id strictly below the given id (`last_id` parameter).
    Before(i64),
    /// Rows with id strictly above the given id (`first_id` parameter).
    After(i64),
}

/// Denormalized article projection held by the search index. Rebuildable;
/// never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDocument {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub board_id: Option<i64>,
    pub author_id: Option<i64>,
}

impl From<&Article> for ArticleDocument {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id,
            title: article.title.clone(),
            content: article.content.clone(),
            board_id: article.board_id,
            author_id: article.author_id,
        }
    }
}

/// Which advertisement history collection an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    View,
    Click,
}

impl HistoryKind {
    pub fn collection(&self) -> &'static str {
        match self {
            HistoryKind::View => "adViewHistory",
            HistoryKind::Click => "adClickHistory",
        }
    }
}

/// Raw view/click event appended to the document store.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEvent {
    pub ad_id: i64,
    /// `None` for anonymous visitors; the client address then serves as the
    /// distinguishing key in aggregation.
    pub username: Option<String>,
    pub client_ip: String,
    /// Recorded for view events only.
    pub is_true_view: Option<bool>,
    pub created_date: DateTime<Utc>,
}

/// Per-ad distinct-visitor count for the prior-day window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdAudience {
    pub ad_id: i64,
    pub count: i64,
}

/// One notification document per recipient, written by the fan-out step.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub is_read: bool,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}
