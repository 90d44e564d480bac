//! Relay message payloads.
//!
//! Write endpoints publish one of these per triggering write; the consumer
//! re-posts them to `/internal/messages`, which dispatches on the variant.
//! Unrecognized `type` tags deserialize to [`QueueMessage::Unknown`] and are
//! accepted without effect.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueMessage {
    WriteArticle { article_id: i64, user_id: i64 },
    WriteComment { comment_id: i64 },
    #[serde(other)]
    Unknown,
}

impl QueueMessage {
    /// Routing key the publisher attaches to this message kind.
    pub fn routing_key(&self) -> &'static str {
        match self {
            QueueMessage::WriteArticle { .. } => "article.write",
            QueueMessage::WriteComment { .. } => "comment.write",
            QueueMessage::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_article_round_trip() {
        let msg = QueueMessage::WriteArticle {
            article_id: 3,
            user_id: 9,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"write_article""#));
        assert_eq!(serde_json::from_str::<QueueMessage>(&json).unwrap(), msg);
    }

    #[test]
    fn test_unknown_type_is_accepted() {
        let parsed: QueueMessage =
            serde_json::from_str(r#"{"type":"delete_article","article_id":1}"#).unwrap();
        assert_eq!(parsed, QueueMessage::Unknown);
    }
}
