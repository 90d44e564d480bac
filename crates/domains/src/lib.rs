//! pinboard/crates/domains/src/lib.rs
//!
//! The central domain types and port definitions for pinboard.

pub mod error;
pub mod lifecycle;
pub mod messages;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use error::*;
pub use lifecycle::*;
pub use messages::*;
pub use models::*;
pub use ports::*;

#[cfg(test)]
mod tests {
    use super::lifecycle::{soft_delete, Lifecycle};
    use super::models::*;
    use chrono::Utc;

    #[test]
    fn test_article_starts_live() {
        let now = Utc::now();
        let article = Article {
            id: 1,
            title: "Hello".to_string(),
            content: "Hello Rust!".to_string(),
            author_id: Some(7),
            board_id: Some(2),
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        };
        assert!(!article.lifecycle.is_deleted);
        assert!(article.lifecycle.deleted_at.is_none());
    }

    #[test]
    fn test_soft_delete_marks_and_stamps() {
        let at = Utc::now();
        let lc = soft_delete(Lifecycle::default(), at);
        assert!(lc.is_deleted);
        assert_eq!(lc.deleted_at, Some(at));
    }
}
