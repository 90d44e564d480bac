//! Fan-out of relayed write events into per-recipient notification
//! documents.
//!
//! Runs when the consumer re-posts a queue message. By then the triggering
//! entity may already be gone or soft-deleted; that case is a successful
//! no-op. Duplicate fan-out for the same event is tolerated upstream, so no
//! cross-invocation dedup happens here.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use domains::{
    ArticleRepo, CommentRepo, Notification, NotificationStore, QueueMessage, Result,
};

const ARTICLE_POSTED: &str = "Your article has been posted.";
const COMMENT_POSTED: &str = "A new comment has been posted.";

#[derive(Clone)]
pub struct NotificationService {
    articles: Arc<dyn ArticleRepo>,
    comments: Arc<dyn CommentRepo>,
    notifications: Arc<dyn NotificationStore>,
}

impl NotificationService {
    pub fn new(
        articles: Arc<dyn ArticleRepo>,
        comments: Arc<dyn CommentRepo>,
        notifications: Arc<dyn NotificationStore>,
    ) -> Self {
        Self {
            articles,
            comments,
            notifications,
        }
    }

    pub async fn process(&self, message: QueueMessage) -> Result<()> {
        match message {
            QueueMessage::WriteArticle {
                article_id,
                user_id,
            } => self.on_article_written(article_id, user_id).await,
            QueueMessage::WriteComment { comment_id } => {
                self.on_comment_written(comment_id).await
            }
            QueueMessage::Unknown => {
                tracing::debug!("ignoring unknown relay message");
                Ok(())
            }
        }
    }

    async fn on_article_written(&self, article_id: i64, user_id: i64) -> Result<()> {
        let Some(article) = self.articles.find_active_by_id(article_id).await? else {
            return Ok(());
        };
        self.append(user_id, ARTICLE_POSTED, article.title).await
    }

    /// Recipients: the comment author, the article author, and every other
    /// live commenter on the same article, deduplicated.
    async fn on_comment_written(&self, comment_id: i64) -> Result<()> {
        let Some(comment) = self.comments.find_active_by_id(comment_id).await? else {
            return Ok(());
        };

        let mut recipients = BTreeSet::new();
        if let Some(author_id) = comment.author_id {
            recipients.insert(author_id);
        }

        if let Some(article_id) = comment.article_id {
            if let Some(article) = self.articles.find_active_by_id(article_id).await? {
                if let Some(author_id) = article.author_id {
                    recipients.insert(author_id);
                }
            }
            for sibling in self.comments.list_active_for_article(article_id).await? {
                if let Some(author_id) = sibling.author_id {
                    recipients.insert(author_id);
                }
            }
        }

        for user_id in recipients {
            self.append(user_id, COMMENT_POSTED, comment.content.clone())
                .await?;
        }
        Ok(())
    }

    async fn append(&self, user_id: i64, title: &str, content: String) -> Result<()> {
        let now = Utc::now();
        self.notifications
            .append(Notification {
                user_id,
                title: title.to_string(),
                content,
                is_read: false,
                created_date: now,
                updated_date: now,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::{
        Article, Comment, Lifecycle, MockArticleRepo, MockCommentRepo, MockNotificationStore,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn article(id: i64, author_id: i64) -> Article {
        let now = Utc::now();
        Article {
            id,
            title: "t".to_string(),
            content: "c".to_string(),
            author_id: Some(author_id),
            board_id: Some(1),
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn comment(id: i64, author_id: i64, article_id: i64) -> Comment {
        let now = Utc::now();
        Comment {
            id,
            content: "hello".to_string(),
            author_id: Some(author_id),
            article_id: Some(article_id),
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_article_event_notifies_the_author() {
        let mut articles = MockArticleRepo::new();
        articles
            .expect_find_active_by_id()
            .returning(|id| Ok(Some(article(id, 7))));
        let mut notifications = MockNotificationStore::new();
        notifications
            .expect_append()
            .withf(|note| note.user_id == 7 && !note.is_read && note.content == "t")
            .times(1)
            .returning(|_| Ok(()));

        NotificationService::new(
            Arc::new(articles),
            Arc::new(MockCommentRepo::new()),
            Arc::new(notifications),
        )
        .process(QueueMessage::WriteArticle {
            article_id: 3,
            user_id: 7,
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_deleted_article_is_a_silent_noop() {
        let mut articles = MockArticleRepo::new();
        articles.expect_find_active_by_id().returning(|_| Ok(None));
        let mut notifications = MockNotificationStore::new();
        notifications.expect_append().times(0);

        NotificationService::new(
            Arc::new(articles),
            Arc::new(MockCommentRepo::new()),
            Arc::new(notifications),
        )
        .process(QueueMessage::WriteArticle {
            article_id: 3,
            user_id: 7,
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_comment_fanout_deduplicates_recipients() {
        // Commenter 7 is also the article author and the only other
        // commenter: exactly one notification.
        let mut comments = MockCommentRepo::new();
        comments
            .expect_find_active_by_id()
            .returning(|id| Ok(Some(comment(id, 7, 3))));
        comments
            .expect_list_active_for_article()
            .returning(|article_id| Ok(vec![comment(20, 7, article_id)]));
        let mut articles = MockArticleRepo::new();
        articles
            .expect_find_active_by_id()
            .returning(|id| Ok(Some(article(id, 7))));
        let mut notifications = MockNotificationStore::new();
        notifications
            .expect_append()
            .withf(|note| note.user_id == 7)
            .times(1)
            .returning(|_| Ok(()));

        NotificationService::new(Arc::new(articles), Arc::new(comments), Arc::new(notifications))
            .process(QueueMessage::WriteComment { comment_id: 21 })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_comment_fanout_reaches_every_distinct_party() {
        let mut comments = MockCommentRepo::new();
        comments
            .expect_find_active_by_id()
            .returning(|id| Ok(Some(comment(id, 7, 3))));
        comments
            .expect_list_active_for_article()
            .returning(|article_id| {
                Ok(vec![comment(20, 4, article_id), comment(21, 5, article_id)])
            });
        let mut articles = MockArticleRepo::new();
        articles
            .expect_find_active_by_id()
            .returning(|id| Ok(Some(article(id, 9))));

        static APPENDS: AtomicUsize = AtomicUsize::new(0);
        let mut notifications = MockNotificationStore::new();
        notifications.expect_append().times(4).returning(|note| {
            assert!([4, 5, 7, 9].contains(&note.user_id));
            APPENDS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        NotificationService::new(Arc::new(articles), Arc::new(comments), Arc::new(notifications))
            .process(QueueMessage::WriteComment { comment_id: 22 })
            .await
            .unwrap();
        assert_eq!(APPENDS.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_unknown_message_is_accepted() {
        let mut notifications = MockNotificationStore::new();
        notifications.expect_append().times(0);

        NotificationService::new(
            Arc::new(MockArticleRepo::new()),
            Arc::new(MockCommentRepo::new()),
            Arc::new(notifications),
        )
        .process(QueueMessage::Unknown)
        .await
        .unwrap();
    }
}
