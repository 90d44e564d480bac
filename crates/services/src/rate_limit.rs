//! Per-identity write cooldowns.
//!
//! The gate is checked before the guarded write and marked only after it
//! commits, so a failed write never consumes the cooldown. The mark itself
//! is presence-only; the window lives in [`RateLimitPolicy`].

use std::sync::Arc;
use std::time::Duration;

use domains::{AppError, RateLimitGate, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    ArticleWrite,
    ArticleEdit,
    CommentWrite,
    CommentEdit,
}

impl ActionKind {
    /// Stable key suffix used by the mark store.
    pub fn key(self) -> &'static str {
        match self {
            ActionKind::ArticleWrite => "article_write",
            ActionKind::ArticleEdit => "article_edit",
            ActionKind::CommentWrite => "comment_write",
            ActionKind::CommentEdit => "comment_edit",
        }
    }

    fn exhausted(self) -> &'static str {
        match self {
            ActionKind::ArticleWrite => "article write cooldown active",
            ActionKind::ArticleEdit => "article edit cooldown active",
            ActionKind::CommentWrite => "comment write cooldown active",
            ActionKind::CommentEdit => "comment edit cooldown active",
        }
    }
}

/// Cooldown windows per action kind.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub article_write: Duration,
    pub article_edit: Duration,
    pub comment_write: Duration,
    pub comment_edit: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            article_write: Duration::from_secs(300),
            article_edit: Duration::from_secs(300),
            comment_write: Duration::from_secs(60),
            comment_edit: Duration::from_secs(60),
        }
    }
}

impl RateLimitPolicy {
    pub fn window(&self, kind: ActionKind) -> Duration {
        match kind {
            ActionKind::ArticleWrite => self.article_write,
            ActionKind::ArticleEdit => self.article_edit,
            ActionKind::CommentWrite => self.comment_write,
            ActionKind::CommentEdit => self.comment_edit,
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    gate: Arc<dyn RateLimitGate>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(gate: Arc<dyn RateLimitGate>, policy: RateLimitPolicy) -> Self {
        Self { gate, policy }
    }

    /// Fails with `RateLimited` while a mark for `(user, kind)` exists.
    pub async fn check(&self, user_id: i64, kind: ActionKind) -> Result<()> {
        if self
            .gate
            .is_limited(user_id, kind.key(), self.policy.window(kind))
            .await?
        {
            return Err(AppError::RateLimited(kind.exhausted().to_string()));
        }
        Ok(())
    }

    /// Records the mark for `(user, kind)` with the configured window.
    /// Call only after the guarded write has committed.
    pub async fn mark(&self, user_id: i64, kind: ActionKind) -> Result<()> {
        self.gate
            .mark(user_id, kind.key(), self.policy.window(kind))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::MockRateLimitGate;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_check_blocks_while_mark_present() {
        let mut gate = MockRateLimitGate::new();
        gate.expect_is_limited()
            .with(eq(7), eq("article_write"), eq(Duration::from_secs(300)))
            .returning(|_, _, _| Ok(true));
        let limiter = RateLimiter::new(Arc::new(gate), RateLimitPolicy::default());

        let err = limiter.check(7, ActionKind::ArticleWrite).await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_mark_uses_configured_window() {
        let mut gate = MockRateLimitGate::new();
        gate.expect_mark()
            .with(eq(7), eq("comment_write"), eq(Duration::from_secs(60)))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let limiter = RateLimiter::new(Arc::new(gate), RateLimitPolicy::default());

        limiter.mark(7, ActionKind::CommentWrite).await.unwrap();
    }
}
