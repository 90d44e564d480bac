//! In-memory port implementations. Same observable behavior as the real
//! adapters, minus the network: soft-delete filtering, conflict detection,
//! presence-only cooldown marks with a steerable clock, and the two-partition
//! unique-visitor aggregation.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use domains::{
    soft_delete, AdAudience, AdRepo, Advertisement, AppError, Article, ArticleDocument,
    ArticlePatch, ArticleRepo, Board, BoardRepo, Comment, CommentRepo, HistoryEvent, HistoryKind,
    HistoryStore, Lifecycle, MessagePublisher, NewAdvertisement, NewArticle, NewBoard, NewComment,
    NewUser, Notification, NotificationStore, ObjectCache, PageCursor, QueueMessage,
    RateLimitGate, Result, SearchIndex, TokenBlacklist, User, UserRepo,
};

fn next_id(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::SeqCst) + 1
}

// ─── relational repos ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryUserRepo {
    rows: Mutex<Vec<User>>,
    seq: AtomicI64,
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|row| row.username == user.username || row.email == user.email)
        {
            return Err(AppError::Conflict(
                "username or email already in use".to_string(),
            ));
        }
        let now = Utc::now();
        let created = User {
            id: next_id(&self.seq),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            last_login: None,
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        };
        rows.push(created.clone());
        Ok(created)
    }

    async fn find_active_by_id(&self, id: i64) -> Result<Option<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|row| row.id == id && !row.lifecycle.is_deleted)
            .cloned())
    }

    async fn find_active_by_username(&self, username: &str) -> Result<Option<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|row| row.username == username && !row.lifecycle.is_deleted)
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| !row.lifecycle.is_deleted)
            .cloned()
            .collect())
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|row| row.id == id) {
            row.last_login = Some(at);
            row.updated_at = at;
        }
        Ok(())
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|row| row.id == id) {
            row.lifecycle = soft_delete(row.lifecycle.clone(), at);
            row.updated_at = at;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBoardRepo {
    rows: Mutex<Vec<Board>>,
    seq: AtomicI64,
}

#[async_trait]
impl BoardRepo for MemoryBoardRepo {
    async fn insert(&self, board: NewBoard) -> Result<Board> {
        let now = Utc::now();
        let created = Board {
            id: next_id(&self.seq),
            title: board.title,
            description: board.description,
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn find_active(&self, id: i64) -> Result<Option<Board>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|row| row.id == id && !row.lifecycle.is_deleted)
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<Board>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| !row.lifecycle.is_deleted)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryArticleRepo {
    rows: Mutex<Vec<Article>>,
    seq: AtomicI64,
}

#[async_trait]
impl ArticleRepo for MemoryArticleRepo {
    async fn insert(&self, article: NewArticle) -> Result<Article> {
        let now = Utc::now();
        let created = Article {
            id: next_id(&self.seq),
            title: article.title,
            content: article.content,
            author_id: Some(article.author_id),
            board_id: Some(article.board_id),
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn find_active(&self, board_id: i64, id: i64) -> Result<Option<Article>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|row| {
                row.id == id && row.board_id == Some(board_id) && !row.lifecycle.is_deleted
            })
            .cloned())
    }

    async fn find_active_by_id(&self, id: i64) -> Result<Option<Article>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|row| row.id == id && !row.lifecycle.is_deleted)
            .cloned())
    }

    async fn list_page(
        &self,
        board_id: i64,
        cursor: PageCursor,
        limit: i64,
    ) -> Result<Vec<Article>> {
        let rows = self.rows.lock().unwrap();
        let mut page: Vec<Article> = rows
            .iter()
            .filter(|row| row.board_id == Some(board_id) && !row.lifecycle.is_deleted)
            .filter(|row| match cursor {
                PageCursor::Latest => true,
                PageCursor::Before(last_id) => row.id < last_id,
                PageCursor::After(first_id) => row.id > first_id,
            })
            .cloned()
            .collect();
        page.sort_by(|a, b| b.id.cmp(&a.id));
        page.truncate(limit as usize);
        Ok(page)
    }

    async fn list_active_by_ids(&self, board_id: i64, ids: Vec<i64>) -> Result<Vec<Article>> {
        let rows = self.rows.lock().unwrap();
        let mut found: Vec<Article> = rows
            .iter()
            .filter(|row| {
                row.board_id == Some(board_id)
                    && !row.lifecycle.is_deleted
                    && ids.contains(&row.id)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(found)
    }

    async fn update(&self, id: i64, patch: ArticlePatch, at: DateTime<Utc>) -> Result<Article> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(AppError::NotFound("Article"))?;
        if let Some(title) = patch.title {
            row.title = title;
        }
        if let Some(content) = patch.content {
            row.content = content;
        }
        row.updated_at = at;
        Ok(row.clone())
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|row| row.id == id) {
            row.lifecycle = soft_delete(row.lifecycle.clone(), at);
            row.updated_at = at;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCommentRepo {
    rows: Mutex<Vec<Comment>>,
    seq: AtomicI64,
}

#[async_trait]
impl CommentRepo for MemoryCommentRepo {
    async fn insert(&self, comment: NewComment) -> Result<Comment> {
        let now = Utc::now();
        let created = Comment {
            id: next_id(&self.seq),
            content: comment.content,
            author_id: Some(comment.author_id),
            article_id: Some(comment.article_id),
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn find_active(&self, article_id: i64, id: i64) -> Result<Option<Comment>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|row| {
                row.id == id && row.article_id == Some(article_id) && !row.lifecycle.is_deleted
            })
            .cloned())
    }

    async fn find_active_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|row| row.id == id && !row.lifecycle.is_deleted)
            .cloned())
    }

    async fn list_active_for_article(&self, article_id: i64) -> Result<Vec<Comment>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| row.article_id == Some(article_id) && !row.lifecycle.is_deleted)
            .cloned()
            .collect())
    }

    async fn update_content(&self, id: i64, content: &str, at: DateTime<Utc>) -> Result<Comment> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(AppError::NotFound("Comment"))?;
        row.content = content.to_string();
        row.updated_at = at;
        Ok(row.clone())
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|row| row.id == id) {
            row.lifecycle = soft_delete(row.lifecycle.clone(), at);
            row.updated_at = at;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAdRepo {
    rows: Mutex<Vec<Advertisement>>,
    seq: AtomicI64,
}

impl MemoryAdRepo {
    /// Flips the soft-delete flag directly, bypassing the API; used to probe
    /// cache staleness.
    pub fn soft_delete_directly(&self, id: i64) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|row| row.id == id) {
            row.lifecycle = soft_delete(row.lifecycle.clone(), Utc::now());
        }
    }
}

#[async_trait]
impl AdRepo for MemoryAdRepo {
    async fn insert(&self, ad: NewAdvertisement) -> Result<Advertisement> {
        let now = Utc::now();
        let created = Advertisement {
            id: next_id(&self.seq),
            title: ad.title,
            content: ad.content,
            is_visible: ad.is_visible,
            start_date: ad.start_date,
            end_date: ad.end_date,
            view_count: ad.view_count,
            click_count: ad.click_count,
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn find_active(&self, id: i64) -> Result<Option<Advertisement>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|row| row.id == id && !row.lifecycle.is_deleted)
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<Advertisement>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| !row.lifecycle.is_deleted)
            .cloned()
            .collect())
    }
}

// ─── cooldown gate ───────────────────────────────────────────────────────────

/// Presence-only marks against a steerable clock: tests advance time with
/// [`MemoryRateLimitGate::advance`] instead of sleeping out the window.
#[derive(Default)]
pub struct MemoryRateLimitGate {
    marks: Mutex<HashMap<String, Instant>>,
    skew: Mutex<Duration>,
}

impl MemoryRateLimitGate {
    fn now(&self) -> Instant {
        Instant::now() + *self.skew.lock().unwrap()
    }

    pub fn advance(&self, by: Duration) {
        *self.skew.lock().unwrap() += by;
    }
}

fn mark_key(user_id: i64, kind: &str) -> String {
    format!("{user_id}:{kind}")
}

#[async_trait]
impl RateLimitGate for MemoryRateLimitGate {
    async fn is_limited(&self, user_id: i64, kind: &str, _window: Duration) -> Result<bool> {
        let marks = self.marks.lock().unwrap();
        Ok(marks
            .get(&mark_key(user_id, kind))
            .is_some_and(|expiry| *expiry > self.now()))
    }

    async fn mark(&self, user_id: i64, kind: &str, window: Duration) -> Result<()> {
        let expiry = self.now() + window;
        self.marks
            .lock()
            .unwrap()
            .insert(mark_key(user_id, kind), expiry);
        Ok(())
    }
}

// ─── derived stores ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemorySearchIndex {
    docs: DashMap<i64, ArticleDocument>,
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn upsert(&self, doc: &ArticleDocument) -> Result<()> {
        self.docs.insert(doc.id, doc.clone());
        Ok(())
    }

    async fn remove(&self, article_id: i64) -> Result<()> {
        self.docs.remove(&article_id);
        Ok(())
    }

    async fn search(&self, board_id: i64, keyword: &str) -> Result<Vec<i64>> {
        let needle = keyword.to_lowercase();
        Ok(self
            .docs
            .iter()
            .filter(|entry| {
                entry.board_id == Some(board_id)
                    && entry.content.to_lowercase().contains(&needle)
            })
            .map(|entry| entry.id)
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryObjectCache {
    entries: DashMap<String, String>,
}

impl MemoryObjectCache {
    pub fn evict(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[async_trait]
impl ObjectCache for MemoryObjectCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: &str, _ttl: Option<Duration>) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryHistoryStore {
    events: Mutex<Vec<(HistoryKind, HistoryEvent)>>,
}

impl MemoryHistoryStore {
    pub fn events(&self, kind: HistoryKind) -> Vec<HistoryEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(event_kind, _)| *event_kind == kind)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Rewrites an event's timestamp; tests use this to move events into
    /// the prior-day aggregation window.
    pub fn backdate_all(&self, to: DateTime<Utc>) {
        for (_, event) in self.events.lock().unwrap().iter_mut() {
            event.created_date = to;
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn record(&self, kind: HistoryKind, event: HistoryEvent) -> Result<()> {
        self.events.lock().unwrap().push((kind, event));
        Ok(())
    }

    async fn unique_visitors(
        &self,
        kind: HistoryKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AdAudience>> {
        let events = self.events.lock().unwrap();
        let mut identified: HashMap<i64, HashSet<String>> = HashMap::new();
        let mut anonymous: HashMap<i64, HashSet<String>> = HashMap::new();

        for (event_kind, event) in events.iter() {
            if *event_kind != kind || event.created_date < start || event.created_date >= end {
                continue;
            }
            match &event.username {
                Some(username) => {
                    identified
                        .entry(event.ad_id)
                        .or_default()
                        .insert(username.clone());
                }
                None => {
                    anonymous
                        .entry(event.ad_id)
                        .or_default()
                        .insert(event.client_ip.clone());
                }
            }
        }

        let mut totals: HashMap<i64, i64> = HashMap::new();
        for (ad_id, names) in identified {
            *totals.entry(ad_id).or_insert(0) += names.len() as i64;
        }
        for (ad_id, addresses) in anonymous {
            *totals.entry(ad_id).or_insert(0) += addresses.len() as i64;
        }

        Ok(totals
            .into_iter()
            .map(|(ad_id, count)| AdAudience { ad_id, count })
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryNotificationStore {
    appended: Mutex<Vec<Notification>>,
}

impl MemoryNotificationStore {
    pub fn appended(&self) -> Vec<Notification> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn append(&self, notification: Notification) -> Result<()> {
        self.appended.lock().unwrap().push(notification);
        Ok(())
    }
}

/// Captures published messages so tests can replay them through
/// `/internal/messages` the way the consumer would.
#[derive(Default)]
pub struct MemoryPublisher {
    published: Mutex<Vec<QueueMessage>>,
}

impl MemoryPublisher {
    pub fn drain(&self) -> Vec<QueueMessage> {
        std::mem::take(&mut self.published.lock().unwrap())
    }
}

#[async_trait]
impl MessagePublisher for MemoryPublisher {
    async fn publish(&self, message: &QueueMessage) -> Result<()> {
        self.published.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTokenBlacklist {
    revoked: DashMap<String, ()>,
}

#[async_trait]
impl TokenBlacklist for MemoryTokenBlacklist {
    async fn revoke(&self, token: &str, _ttl: Duration) -> Result<()> {
        self.revoked.insert(token.to_string(), ());
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool> {
        Ok(self.revoked.contains_key(token))
    }
}
