//! Article use cases: rate-limited writes, owner-gated mutation, keyset
//! listing, and best-effort projection into the search index and the relay.

use std::sync::Arc;

use chrono::Utc;

use domains::{
    AppError, Article, ArticleDocument, ArticlePatch, ArticleRepo, BoardRepo, Comment,
    CommentRepo, MessagePublisher, NewArticle, PageCursor, QueueMessage, Result, SearchIndex,
    User,
};

use crate::access::authorize_mutation;
use crate::rate_limit::{ActionKind, RateLimiter};

pub const PAGE_SIZE: i64 = 10;

#[derive(Clone)]
pub struct ArticleService {
    boards: Arc<dyn BoardRepo>,
    articles: Arc<dyn ArticleRepo>,
    comments: Arc<dyn CommentRepo>,
    limiter: RateLimiter,
    search: Arc<dyn SearchIndex>,
    publisher: Arc<dyn MessagePublisher>,
}

impl ArticleService {
    pub fn new(
        boards: Arc<dyn BoardRepo>,
        articles: Arc<dyn ArticleRepo>,
        comments: Arc<dyn CommentRepo>,
        limiter: RateLimiter,
        search: Arc<dyn SearchIndex>,
        publisher: Arc<dyn MessagePublisher>,
    ) -> Self {
        Self {
            boards,
            articles,
            comments,
            limiter,
            search,
            publisher,
        }
    }

    pub async fn create(
        &self,
        board_id: i64,
        author: &User,
        title: String,
        content: String,
    ) -> Result<Article> {
        if self.boards.find_active(board_id).await?.is_none() {
            return Err(AppError::NotFound("Board"));
        }
        self.limiter.check(author.id, ActionKind::ArticleWrite).await?;

        let article = self
            .articles
            .insert(NewArticle {
                title,
                content,
                author_id: author.id,
                board_id,
            })
            .await?;

        self.limiter.mark(author.id, ActionKind::ArticleWrite).await?;
        self.index_best_effort(&article).await;
        self.publish_best_effort(QueueMessage::WriteArticle {
            article_id: article.id,
            user_id: author.id,
        })
        .await;

        Ok(article)
    }

    pub async fn list(&self, board_id: i64, cursor: PageCursor) -> Result<Vec<Article>> {
        self.articles.list_page(board_id, cursor, PAGE_SIZE).await
    }

    pub async fn get(&self, board_id: i64, article_id: i64) -> Result<(Article, Vec<Comment>)> {
        let article = self
            .articles
            .find_active(board_id, article_id)
            .await?
            .ok_or(AppError::NotFound("Article"))?;
        let comments = self.comments.list_active_for_article(article_id).await?;
        Ok((article, comments))
    }

    /// Keyword search scoped to one board. An empty hit set short-circuits
    /// without a relational round-trip.
    pub async fn search(&self, board_id: i64, keyword: &str) -> Result<Vec<Article>> {
        let ids = self.search.search(board_id, keyword).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.articles.list_active_by_ids(board_id, ids).await
    }

    pub async fn edit(
        &self,
        board_id: i64,
        article_id: i64,
        caller: &User,
        patch: ArticlePatch,
    ) -> Result<Article> {
        self.limiter.check(caller.id, ActionKind::ArticleEdit).await?;

        let article = self
            .articles
            .find_active(board_id, article_id)
            .await?
            .ok_or(AppError::NotFound("Article"))?;
        authorize_mutation(article.author_id, caller)?;

        // A no-op edit returns the entity unchanged without consuming the
        // cooldown or re-indexing.
        if patch.is_empty() {
            return Ok(article);
        }

        let updated = self.articles.update(article.id, patch, Utc::now()).await?;
        self.limiter.mark(caller.id, ActionKind::ArticleEdit).await?;
        self.index_best_effort(&updated).await;

        Ok(updated)
    }

    pub async fn delete(&self, board_id: i64, article_id: i64, caller: &User) -> Result<()> {
        self.limiter.check(caller.id, ActionKind::ArticleEdit).await?;

        let article = self
            .articles
            .find_active(board_id, article_id)
            .await?
            .ok_or(AppError::NotFound("Article"))?;
        authorize_mutation(article.author_id, caller)?;

        self.articles.soft_delete(article.id, Utc::now()).await?;
        self.limiter.mark(caller.id, ActionKind::ArticleEdit).await?;

        if let Err(err) = self.search.remove(article.id).await {
            tracing::warn!(article_id = article.id, %err, "search document removal failed");
        }
        Ok(())
    }

    async fn index_best_effort(&self, article: &Article) {
        if let Err(err) = self.search.upsert(&ArticleDocument::from(article)).await {
            tracing::warn!(article_id = article.id, %err, "article indexing failed");
        }
    }

    async fn publish_best_effort(&self, message: QueueMessage) {
        if let Err(err) = self.publisher.publish(&message).await {
            tracing::warn!(%err, "relay publish failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::{
        Lifecycle, MockArticleRepo, MockBoardRepo, MockCommentRepo, MockMessagePublisher,
        MockRateLimitGate, MockSearchIndex, UserRole,
    };
    use mockall::predicate::eq;

    use crate::rate_limit::RateLimitPolicy;

    fn member(id: i64) -> User {
        let now = Utc::now();
        User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@test.com"),
            password_hash: String::new(),
            role: UserRole::Member,
            last_login: None,
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn article(id: i64, author_id: i64, board_id: i64) -> Article {
        let now = Utc::now();
        Article {
            id,
            title: "title".to_string(),
            content: "content".to_string(),
            author_id: Some(author_id),
            board_id: Some(board_id),
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn board(id: i64) -> domains::Board {
        let now = Utc::now();
        domains::Board {
            id,
            title: "General".to_string(),
            description: "general talk".to_string(),
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        }
    }

    struct Mocks {
        boards: MockBoardRepo,
        articles: MockArticleRepo,
        comments: MockCommentRepo,
        gate: MockRateLimitGate,
        search: MockSearchIndex,
        publisher: MockMessagePublisher,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                boards: MockBoardRepo::new(),
                articles: MockArticleRepo::new(),
                comments: MockCommentRepo::new(),
                gate: MockRateLimitGate::new(),
                search: MockSearchIndex::new(),
                publisher: MockMessagePublisher::new(),
            }
        }

        fn into_service(self) -> ArticleService {
            ArticleService::new(
                Arc::new(self.boards),
                Arc::new(self.articles),
                Arc::new(self.comments),
                RateLimiter::new(Arc::new(self.gate), RateLimitPolicy::default()),
                Arc::new(self.search),
                Arc::new(self.publisher),
            )
        }
    }

    #[tokio::test]
    async fn test_create_rejected_while_cooldown_active() {
        let mut m = Mocks::new();
        m.boards
            .expect_find_active()
            .returning(|id| Ok(Some(board(id))));
        m.gate.expect_is_limited().returning(|_, _, _| Ok(true));
        m.articles.expect_insert().times(0);

        let err = m
            .into_service()
            .create(1, &member(7), "t".into(), "c".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_create_missing_board_skips_rate_check() {
        let mut m = Mocks::new();
        m.boards.expect_find_active().returning(|_| Ok(None));
        m.gate.expect_is_limited().times(0);

        let err = m
            .into_service()
            .create(1, &member(7), "t".into(), "c".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Board")));
    }

    #[tokio::test]
    async fn test_create_marks_and_projects_after_insert() {
        let mut m = Mocks::new();
        m.boards
            .expect_find_active()
            .returning(|id| Ok(Some(board(id))));
        m.gate.expect_is_limited().returning(|_, _, _| Ok(false));
        m.articles
            .expect_insert()
            .times(1)
            .returning(|new| Ok(article(3, new.author_id, new.board_id)));
        m.gate
            .expect_mark()
            .with(eq(7), eq("article_write"), eq(std::time::Duration::from_secs(300)))
            .times(1)
            .returning(|_, _, _| Ok(()));
        m.search.expect_upsert().times(1).returning(|_| Ok(()));
        m.publisher
            .expect_publish()
            .withf(|msg| {
                matches!(
                    msg,
                    QueueMessage::WriteArticle {
                        article_id: 3,
                        user_id: 7
                    }
                )
            })
            .times(1)
            .returning(|_| Ok(()));

        let created = m
            .into_service()
            .create(1, &member(7), "t".into(), "c".into())
            .await
            .unwrap();
        assert_eq!(created.id, 3);
    }

    #[tokio::test]
    async fn test_create_survives_index_and_publish_failures() {
        let mut m = Mocks::new();
        m.boards
            .expect_find_active()
            .returning(|id| Ok(Some(board(id))));
        m.gate.expect_is_limited().returning(|_, _, _| Ok(false));
        m.articles
            .expect_insert()
            .returning(|new| Ok(article(3, new.author_id, new.board_id)));
        m.gate.expect_mark().returning(|_, _, _| Ok(()));
        m.search
            .expect_upsert()
            .returning(|_| Err(AppError::internal("index down")));
        m.publisher
            .expect_publish()
            .returning(|_| Err(AppError::internal("broker down")));

        assert!(m
            .into_service()
            .create(1, &member(7), "t".into(), "c".into())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_edit_by_non_owner_is_forbidden() {
        let mut m = Mocks::new();
        m.gate.expect_is_limited().returning(|_, _, _| Ok(false));
        m.articles
            .expect_find_active()
            .returning(|board_id, id| Ok(Some(article(id, 1, board_id))));
        m.articles.expect_update().times(0);

        let err = m
            .into_service()
            .edit(
                1,
                3,
                &member(2),
                ArticlePatch {
                    title: Some("x".into()),
                    content: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_noop_edit_skips_mark_and_reindex() {
        let mut m = Mocks::new();
        m.gate.expect_is_limited().returning(|_, _, _| Ok(false));
        m.articles
            .expect_find_active()
            .returning(|board_id, id| Ok(Some(article(id, 7, board_id))));
        m.articles.expect_update().times(0);
        m.gate.expect_mark().times(0);
        m.search.expect_upsert().times(0);

        let unchanged = m
            .into_service()
            .edit(1, 3, &member(7), ArticlePatch::default())
            .await
            .unwrap();
        assert_eq!(unchanged.id, 3);
    }

    #[tokio::test]
    async fn test_search_empty_hits_short_circuit() {
        let mut m = Mocks::new();
        m.search
            .expect_search()
            .with(eq(1), eq("rust"))
            .returning(|_, _| Ok(Vec::new()));
        m.articles.expect_list_active_by_ids().times(0);

        let found = m.into_service().search(1, "rust").await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_search_document() {
        let mut m = Mocks::new();
        m.gate.expect_is_limited().returning(|_, _, _| Ok(false));
        m.articles
            .expect_find_active()
            .returning(|board_id, id| Ok(Some(article(id, 7, board_id))));
        m.articles
            .expect_soft_delete()
            .with(eq(3), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(()));
        m.gate.expect_mark().times(1).returning(|_, _, _| Ok(()));
        m.search
            .expect_remove()
            .with(eq(3))
            .times(1)
            .returning(|_| Ok(()));

        m.into_service().delete(1, 3, &member(7)).await.unwrap();
    }
}
