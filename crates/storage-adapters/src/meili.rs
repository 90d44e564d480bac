//! Meilisearch adapter for the article search index. The index is a derived
//! projection keyed by article id; `board_id` must be filterable, which
//! [`MeiliSearchIndex::ensure_settings`] establishes at startup.

use async_trait::async_trait;
use meilisearch_sdk::client::Client;

use domains::{AppError, ArticleDocument, Result, SearchIndex};

pub const ARTICLE_INDEX: &str = "articles";

pub struct MeiliSearchIndex {
    client: Client,
}

impl MeiliSearchIndex {
    pub fn new(url: &str, api_key: &str) -> Result<Self> {
        let client = Client::new(url, Some(api_key)).map_err(AppError::internal)?;
        Ok(Self { client })
    }

    /// Idempotent index configuration; run once at process start.
    pub async fn ensure_settings(&self) -> Result<()> {
        self.client
            .index(ARTICLE_INDEX)
            .set_filterable_attributes(["board_id"])
            .await
            .map(|_| ())
            .map_err(AppError::internal)
    }
}

#[async_trait]
impl SearchIndex for MeiliSearchIndex {
    async fn upsert(&self, doc: &ArticleDocument) -> Result<()> {
        self.client
            .index(ARTICLE_INDEX)
            .add_or_update(std::slice::from_ref(doc), Some("id"))
            .await
            .map(|_| ())
            .map_err(AppError::internal)
    }

    async fn remove(&self, article_id: i64) -> Result<()> {
        self.client
            .index(ARTICLE_INDEX)
            .delete_document(article_id)
            .await
            .map(|_| ())
            .map_err(AppError::internal)
    }

    async fn search(&self, board_id: i64, keyword: &str) -> Result<Vec<i64>> {
        let filter = format!("board_id = {board_id}");
        let results = self
            .client
            .index(ARTICLE_INDEX)
            .search()
            .with_query(keyword)
            .with_filter(&filter)
            .execute::<ArticleDocument>()
            .await
            .map_err(AppError::internal)?;
        Ok(results.hits.into_iter().map(|hit| hit.result.id).collect())
    }
}
