//! Comment use cases. Same shape as articles with a shorter cooldown; every
//! write is scoped to an active article on the addressed board.

use std::sync::Arc;

use chrono::Utc;

use domains::{
    AppError, ArticleRepo, Comment, CommentRepo, MessagePublisher, NewComment, QueueMessage,
    Result, User,
};

use crate::access::authorize_mutation;
use crate::rate_limit::{ActionKind, RateLimiter};

#[derive(Clone)]
pub struct CommentService {
    articles: Arc<dyn ArticleRepo>,
    comments: Arc<dyn CommentRepo>,
    limiter: RateLimiter,
    publisher: Arc<dyn MessagePublisher>,
}

impl CommentService {
    pub fn new(
        articles: Arc<dyn ArticleRepo>,
        comments: Arc<dyn CommentRepo>,
        limiter: RateLimiter,
        publisher: Arc<dyn MessagePublisher>,
    ) -> Self {
        Self {
            articles,
            comments,
            limiter,
            publisher,
        }
    }

    async fn require_active_article(&self, board_id: i64, article_id: i64) -> Result<()> {
        self.articles
            .find_active(board_id, article_id)
            .await?
            .map(|_| ())
            .ok_or(AppError::NotFound("Article"))
    }

    pub async fn create(
        &self,
        board_id: i64,
        article_id: i64,
        author: &User,
        content: String,
    ) -> Result<Comment> {
        self.limiter.check(author.id, ActionKind::CommentWrite).await?;
        self.require_active_article(board_id, article_id).await?;

        let comment = self
            .comments
            .insert(NewComment {
                content,
                author_id: author.id,
                article_id,
            })
            .await?;

        self.limiter.mark(author.id, ActionKind::CommentWrite).await?;
        if let Err(err) = self
            .publisher
            .publish(&QueueMessage::WriteComment {
                comment_id: comment.id,
            })
            .await
        {
            tracing::warn!(%err, "relay publish failed");
        }

        Ok(comment)
    }

    pub async fn edit(
        &self,
        board_id: i64,
        article_id: i64,
        comment_id: i64,
        caller: &User,
        content: String,
    ) -> Result<Comment> {
        self.limiter.check(caller.id, ActionKind::CommentEdit).await?;
        self.require_active_article(board_id, article_id).await?;

        let comment = self
            .comments
            .find_active(article_id, comment_id)
            .await?
            .ok_or(AppError::NotFound("Comment"))?;
        authorize_mutation(comment.author_id, caller)?;

        let updated = self
            .comments
            .update_content(comment.id, &content, Utc::now())
            .await?;
        self.limiter.mark(caller.id, ActionKind::CommentEdit).await?;
        Ok(updated)
    }

    pub async fn delete(
        &self,
        board_id: i64,
        article_id: i64,
        comment_id: i64,
        caller: &User,
    ) -> Result<()> {
        self.limiter.check(caller.id, ActionKind::CommentEdit).await?;
        self.require_active_article(board_id, article_id).await?;

        let comment = self
            .comments
            .find_active(article_id, comment_id)
            .await?
            .ok_or(AppError::NotFound("Comment"))?;
        authorize_mutation(comment.author_id, caller)?;

        self.comments.soft_delete(comment.id, Utc::now()).await?;
        self.limiter.mark(caller.id, ActionKind::CommentEdit).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::{
        Article, Lifecycle, MockArticleRepo, MockCommentRepo, MockMessagePublisher,
        MockRateLimitGate, UserRole,
    };

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

    fn article(id: i64, board_id: i64) -> Article {
        let now = Utc::now();
        Article {
            id,
            title: "t".to_string(),
            content: "c".to_string(),
            author_id: Some(1),
            board_id: Some(board_id),
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn comment(id: i64, author_id: i64, article_id: i64) -> Comment {
        let now = Utc::now();
        Comment {
            id,
            content: "c".to_string(),
            author_id: Some(author_id),
            article_id: Some(article_id),
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn service(
        articles: MockArticleRepo,
        comments: MockCommentRepo,
        gate: MockRateLimitGate,
        publisher: MockMessagePublisher,
    ) -> CommentService {
        CommentService::new(
            Arc::new(articles),
            Arc::new(comments),
            RateLimiter::new(Arc::new(gate), RateLimitPolicy::default()),
            Arc::new(publisher),
        )
    }

    #[tokio::test]
    async fn test_create_on_missing_article_is_not_found() {
        let mut articles = MockArticleRepo::new();
        articles.expect_find_active().returning(|_, _| Ok(None));
        let mut comments = MockCommentRepo::new();
        comments.expect_insert().times(0);
        let mut gate = MockRateLimitGate::new();
        gate.expect_is_limited().returning(|_, _, _| Ok(false));

        let err = service(articles, comments, gate, MockMessagePublisher::new())
            .create(1, 9, &member(7), "hi".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Article")));
    }

    #[tokio::test]
    async fn test_create_publishes_comment_message() {
        let mut articles = MockArticleRepo::new();
        articles
            .expect_find_active()
            .returning(|board_id, id| Ok(Some(article(id, board_id))));
        let mut comments = MockCommentRepo::new();
        comments
            .expect_insert()
            .returning(|new| Ok(comment(11, new.author_id, new.article_id)));
        let mut gate = MockRateLimitGate::new();
        gate.expect_is_limited().returning(|_, _, _| Ok(false));
        gate.expect_mark().times(1).returning(|_, _, _| Ok(()));
        let mut publisher = MockMessagePublisher::new();
        publisher
            .expect_publish()
            .withf(|msg| matches!(msg, QueueMessage::WriteComment { comment_id: 11 }))
            .times(1)
            .returning(|_| Ok(()));

        let created = service(articles, comments, gate, publisher)
            .create(1, 9, &member(7), "hi".into())
            .await
            .unwrap();
        assert_eq!(created.id, 11);
    }

    #[tokio::test]
    async fn test_edit_by_non_owner_is_forbidden() {
        let mut articles = MockArticleRepo::new();
        articles
            .expect_find_active()
            .returning(|board_id, id| Ok(Some(article(id, board_id))));
        let mut comments = MockCommentRepo::new();
        comments
            .expect_find_active()
            .returning(|article_id, id| Ok(Some(comment(id, 1, article_id))));
        comments.expect_update_content().times(0);
        let mut gate = MockRateLimitGate::new();
        gate.expect_is_limited().returning(|_, _, _| Ok(false));

        let err = service(articles, comments, gate, MockMessagePublisher::new())
            .edit(1, 9, 11, &member(2), "edited".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
