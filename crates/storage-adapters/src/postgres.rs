//! Postgres repositories. The relational store is the source of truth for
//! every CRUD entity; all reads here filter soft-deleted rows. Uniqueness
//! violations surface as `AppError::Conflict`, everything else as
//! `AppError::Internal`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use domains::{
    Advertisement, AppError, Article, ArticlePatch, ArticleRepo, Board, BoardRepo, Comment,
    CommentRepo, Lifecycle, NewAdvertisement, NewArticle, NewBoard, NewComment, NewUser,
    PageCursor, RateLimitGate, Result, User, UserRepo, UserRole,
};

fn store_err(err: sqlx::Error) -> AppError {
    AppError::internal(err)
}

fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => store_err(err),
    }
}

// ─── users ───────────────────────────────────────────────────────────────────

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, last_login, is_deleted, deleted_at, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    last_login: Option<DateTime<Utc>>,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role: match row.role.as_str() {
                "admin" => UserRole::Admin,
                "member" => UserRole::Member,
                _ => UserRole::Guest,
            },
            last_login: row.last_login,
            lifecycle: Lifecycle {
                is_deleted: row.is_deleted,
                deleted_at: row.deleted_at,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn role_str(role: UserRole) -> &'static str {
    match role {
        UserRole::Admin => "admin",
        UserRole::Member => "member",
        UserRole::Guest => "guest",
    }
}

#[derive(Clone)]
pub struct PgUserRepo {
    pool: PgPool,
}

impl PgUserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(role_str(user.role))
            .fetch_one(&self.pool)
            .await
            .map(User::from)
            .map_err(|err| conflict_on_unique(err, "username or email already in use"))
    }

    async fn find_active_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_deleted = FALSE");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(User::from))
            .map_err(store_err)
    }

    async fn find_active_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND is_deleted = FALSE"
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(User::from))
            .map_err(store_err)
    }

    async fn list_active(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE is_deleted = FALSE ORDER BY id");
        sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(User::from).collect())
            .map_err(store_err)
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = $2, updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(store_err)
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE users SET is_deleted = TRUE, deleted_at = $2, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(store_err)
    }
}

// ─── boards ──────────────────────────────────────────────────────────────────

const BOARD_COLUMNS: &str =
    "id, title, description, is_deleted, deleted_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BoardRow {
    id: i64,
    title: String,
    description: String,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BoardRow> for Board {
    fn from(row: BoardRow) -> Self {
        Board {
            id: row.id,
            title: row.title,
            description: row.description,
            lifecycle: Lifecycle {
                is_deleted: row.is_deleted,
                deleted_at: row.deleted_at,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgBoardRepo {
    pool: PgPool,
}

impl PgBoardRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BoardRepo for PgBoardRepo {
    async fn insert(&self, board: NewBoard) -> Result<Board> {
        let sql = format!(
            "INSERT INTO boards (title, description) VALUES ($1, $2) RETURNING {BOARD_COLUMNS}"
        );
        sqlx::query_as::<_, BoardRow>(&sql)
            .bind(&board.title)
            .bind(&board.description)
            .fetch_one(&self.pool)
            .await
            .map(Board::from)
            .map_err(store_err)
    }

    async fn find_active(&self, id: i64) -> Result<Option<Board>> {
        let sql =
            format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id = $1 AND is_deleted = FALSE");
        sqlx::query_as::<_, BoardRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(Board::from))
            .map_err(store_err)
    }

    async fn list_active(&self) -> Result<Vec<Board>> {
        let sql =
            format!("SELECT {BOARD_COLUMNS} FROM boards WHERE is_deleted = FALSE ORDER BY id");
        sqlx::query_as::<_, BoardRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(Board::from).collect())
            .map_err(store_err)
    }
}

// ─── articles ────────────────────────────────────────────────────────────────

const ARTICLE_COLUMNS: &str =
    "id, title, content, author_id, board_id, is_deleted, deleted_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    title: String,
    content: String,
    author_id: Option<i64>,
    board_id: Option<i64>,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: row.id,
            title: row.title,
            content: row.content,
            author_id: row.author_id,
            board_id: row.board_id,
            lifecycle: Lifecycle {
                is_deleted: row.is_deleted,
                deleted_at: row.deleted_at,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgArticleRepo {
    pool: PgPool,
}

impl PgArticleRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArticleRepo for PgArticleRepo {
    async fn insert(&self, article: NewArticle) -> Result<Article> {
        let sql = format!(
            "INSERT INTO articles (title, content, author_id, board_id) \
             VALUES ($1, $2, $3, $4) RETURNING {ARTICLE_COLUMNS}"
        );
        sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(&article.title)
            .bind(&article.content)
            .bind(article.author_id)
            .bind(article.board_id)
            .fetch_one(&self.pool)
            .await
            .map(Article::from)
            .map_err(store_err)
    }

    async fn find_active(&self, board_id: i64, id: i64) -> Result<Option<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE id = $1 AND board_id = $2 AND is_deleted = FALSE"
        );
        sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(id)
            .bind(board_id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(Article::from))
            .map_err(store_err)
    }

    async fn find_active_by_id(&self, id: i64) -> Result<Option<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1 AND is_deleted = FALSE"
        );
        sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(Article::from))
            .map_err(store_err)
    }

    async fn list_page(
        &self,
        board_id: i64,
        cursor: PageCursor,
        limit: i64,
    ) -> Result<Vec<Article>> {
        let rows = match cursor {
            PageCursor::Latest => {
                let sql = format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles \
                     WHERE board_id = $1 AND is_deleted = FALSE \
                     ORDER BY id DESC LIMIT $2"
                );
                sqlx::query_as::<_, ArticleRow>(&sql)
                    .bind(board_id)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
            PageCursor::Before(last_id) => {
                let sql = format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles \
                     WHERE board_id = $1 AND is_deleted = FALSE AND id < $2 \
                     ORDER BY id DESC LIMIT $3"
                );
                sqlx::query_as::<_, ArticleRow>(&sql)
                    .bind(board_id)
                    .bind(last_id)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
            PageCursor::After(first_id) => {
                let sql = format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles \
                     WHERE board_id = $1 AND is_deleted = FALSE AND id > $2 \
                     ORDER BY id DESC LIMIT $3"
                );
                sqlx::query_as::<_, ArticleRow>(&sql)
                    .bind(board_id)
                    .bind(first_id)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
        };
        rows.map(|rows| rows.into_iter().map(Article::from).collect())
            .map_err(store_err)
    }

    async fn list_active_by_ids(&self, board_id: i64, ids: Vec<i64>) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE board_id = $1 AND is_deleted = FALSE AND id = ANY($2) \
             ORDER BY id DESC"
        );
        sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(board_id)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(Article::from).collect())
            .map_err(store_err)
    }

    async fn update(&self, id: i64, patch: ArticlePatch, at: DateTime<Utc>) -> Result<Article> {
        let sql = format!(
            "UPDATE articles SET title = COALESCE($2, title), \
             content = COALESCE($3, content), updated_at = $4 \
             WHERE id = $1 RETURNING {ARTICLE_COLUMNS}"
        );
        sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(id)
            .bind(patch.title)
            .bind(patch.content)
            .bind(at)
            .fetch_one(&self.pool)
            .await
            .map(Article::from)
            .map_err(store_err)
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE articles SET is_deleted = TRUE, deleted_at = $2, updated_at = $2 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(store_err)
    }
}

// ─── comments ────────────────────────────────────────────────────────────────

const COMMENT_COLUMNS: &str =
    "id, content, author_id, article_id, is_deleted, deleted_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    content: String,
    author_id: Option<i64>,
    article_id: Option<i64>,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            content: row.content,
            author_id: row.author_id,
            article_id: row.article_id,
            lifecycle: Lifecycle {
                is_deleted: row.is_deleted,
                deleted_at: row.deleted_at,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgCommentRepo {
    pool: PgPool,
}

impl PgCommentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepo for PgCommentRepo {
    async fn insert(&self, comment: NewComment) -> Result<Comment> {
        let sql = format!(
            "INSERT INTO comments (content, author_id, article_id) \
             VALUES ($1, $2, $3) RETURNING {COMMENT_COLUMNS}"
        );
        sqlx::query_as::<_, CommentRow>(&sql)
            .bind(&comment.content)
            .bind(comment.author_id)
            .bind(comment.article_id)
            .fetch_one(&self.pool)
            .await
            .map(Comment::from)
            .map_err(store_err)
    }

    async fn find_active(&self, article_id: i64, id: i64) -> Result<Option<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments \
             WHERE id = $1 AND article_id = $2 AND is_deleted = FALSE"
        );
        sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(Comment::from))
            .map_err(store_err)
    }

    async fn find_active_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1 AND is_deleted = FALSE"
        );
        sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(Comment::from))
            .map_err(store_err)
    }

    async fn list_active_for_article(&self, article_id: i64) -> Result<Vec<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments \
             WHERE article_id = $1 AND is_deleted = FALSE ORDER BY id"
        );
        sqlx::query_as::<_, CommentRow>(&sql)
            .bind(article_id)
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(Comment::from).collect())
            .map_err(store_err)
    }

    async fn update_content(&self, id: i64, content: &str, at: DateTime<Utc>) -> Result<Comment> {
        let sql = format!(
            "UPDATE comments SET content = $2, updated_at = $3 \
             WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        );
        sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .bind(content)
            .bind(at)
            .fetch_one(&self.pool)
            .await
            .map(Comment::from)
            .map_err(store_err)
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE comments SET is_deleted = TRUE, deleted_at = $2, updated_at = $2 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(store_err)
    }
}

// ─── advertisements ──────────────────────────────────────────────────────────

const AD_COLUMNS: &str =
    "id, title, content, is_visible, start_date, end_date, view_count, click_count, \
     is_deleted, deleted_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct AdRow {
    id: i64,
    title: String,
    content: String,
    is_visible: bool,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    view_count: i64,
    click_count: i64,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AdRow> for Advertisement {
    fn from(row: AdRow) -> Self {
        Advertisement {
            id: row.id,
            title: row.title,
            content: row.content,
            is_visible: row.is_visible,
            start_date: row.start_date,
            end_date: row.end_date,
            view_count: row.view_count,
            click_count: row.click_count,
            lifecycle: Lifecycle {
                is_deleted: row.is_deleted,
                deleted_at: row.deleted_at,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgAdRepo {
    pool: PgPool,
}

impl PgAdRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl domains::AdRepo for PgAdRepo {
    async fn insert(&self, ad: NewAdvertisement) -> Result<Advertisement> {
        let sql = format!(
            "INSERT INTO advertisements \
             (title, content, is_visible, start_date, end_date, view_count, click_count) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {AD_COLUMNS}"
        );
        sqlx::query_as::<_, AdRow>(&sql)
            .bind(&ad.title)
            .bind(&ad.content)
            .bind(ad.is_visible)
            .bind(ad.start_date)
            .bind(ad.end_date)
            .bind(ad.view_count)
            .bind(ad.click_count)
            .fetch_one(&self.pool)
            .await
            .map(Advertisement::from)
            .map_err(store_err)
    }

    async fn find_active(&self, id: i64) -> Result<Option<Advertisement>> {
        let sql = format!(
            "SELECT {AD_COLUMNS} FROM advertisements WHERE id = $1 AND is_deleted = FALSE"
        );
        sqlx::query_as::<_, AdRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(Advertisement::from))
            .map_err(store_err)
    }

    async fn list_active(&self) -> Result<Vec<Advertisement>> {
        let sql = format!(
            "SELECT {AD_COLUMNS} FROM advertisements WHERE is_deleted = FALSE ORDER BY id"
        );
        sqlx::query_as::<_, AdRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(Advertisement::from).collect())
            .map_err(store_err)
    }
}

// ─── derived-timestamp rate limiting ─────────────────────────────────────────

/// Fallback cooldown gate for deployments without a mark store: the newest
/// row owned by the identity *is* the mark, so `mark` has nothing to do.
/// Coupled to the entity schema by construction; prefer the Valkey gate.
#[derive(Clone)]
pub struct DerivedRateLimitGate {
    pool: PgPool,
}

impl DerivedRateLimitGate {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitGate for DerivedRateLimitGate {
    async fn is_limited(
        &self,
        user_id: i64,
        kind: &str,
        window: std::time::Duration,
    ) -> Result<bool> {
        let sql = match kind {
            "article_write" => "SELECT max(created_at) FROM articles WHERE author_id = $1",
            "article_edit" => "SELECT max(updated_at) FROM articles WHERE author_id = $1",
            "comment_write" => "SELECT max(created_at) FROM comments WHERE author_id = $1",
            "comment_edit" => "SELECT max(updated_at) FROM comments WHERE author_id = $1",
            _ => return Ok(false),
        };
        let newest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        let window = chrono::Duration::from_std(window).map_err(AppError::internal)?;
        Ok(newest.is_some_and(|at| Utc::now() - at < window))
    }

    async fn mark(&self, _user_id: i64, _kind: &str, _window: std::time::Duration) -> Result<()> {
        // The guarded write's own timestamp carries the mark.
        Ok(())
    }
}
