//! MongoDB adapters: the append-only ad view/click history with its
//! prior-day distinct-visitor aggregation, and the notification collection
//! the fan-out step writes into. Documents are free-form; nothing here is
//! schema-enforced beyond the fields written.

use std::collections::HashMap;

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::Database;

use domains::{
    AdAudience, AppError, HistoryEvent, HistoryKind, HistoryStore, Notification,
    NotificationStore, Result,
};

const NOTIFICATION_COLLECTION: &str = "userNotificationHistory";

#[derive(Clone)]
pub struct MongoHistoryStore {
    db: Database,
}

impl MongoHistoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn aggregate_counts(
        &self,
        collection: &str,
        matcher: Document,
        distinct_field: &str,
    ) -> Result<HashMap<i64, i64>> {
        let pipeline = vec![
            doc! { "$match": matcher },
            doc! { "$group": {
                "_id": "$ad_id",
                "unique_vals": { "$addToSet": format!("${distinct_field}") },
            } },
            doc! { "$project": {
                "ad_id": "$_id",
                "count": { "$size": "$unique_vals" },
                "_id": 0,
            } },
        ];

        let mut cursor = self
            .db
            .collection::<Document>(collection)
            .aggregate(pipeline)
            .await
            .map_err(AppError::internal)?;

        let mut counts = HashMap::new();
        while let Some(row) = cursor.try_next().await.map_err(AppError::internal)? {
            let ad_id = read_i64(&row, "ad_id")?;
            let count = read_i64(&row, "count")?;
            counts.insert(ad_id, count);
        }
        Ok(counts)
    }
}

fn read_i64(row: &Document, field: &str) -> Result<i64> {
    match row.get(field) {
        Some(Bson::Int64(value)) => Ok(*value),
        Some(Bson::Int32(value)) => Ok(i64::from(*value)),
        other => Err(AppError::Internal(format!(
            "aggregation field {field} missing or non-numeric: {other:?}"
        ))),
    }
}

fn window_filter(start: DateTime<Utc>, end: DateTime<Utc>) -> Document {
    doc! { "$gte": bson::DateTime::from_chrono(start), "$lt": bson::DateTime::from_chrono(end) }
}

#[async_trait]
impl HistoryStore for MongoHistoryStore {
    async fn record(&self, kind: HistoryKind, event: HistoryEvent) -> Result<()> {
        let mut document = doc! {
            "ad_id": event.ad_id,
            "username": event.username.map(Bson::String).unwrap_or(Bson::Null),
            "client_ip": event.client_ip,
            "created_date": bson::DateTime::from_chrono(event.created_date),
        };
        if let Some(is_true_view) = event.is_true_view {
            document.insert("is_true_view", is_true_view);
        }

        self.db
            .collection::<Document>(kind.collection())
            .insert_one(document)
            .await
            .map(|_| ())
            .map_err(AppError::internal)
    }

    async fn unique_visitors(
        &self,
        kind: HistoryKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AdAudience>> {
        let collection = kind.collection();

        // Identified visitors, distinct by username.
        let identified = self
            .aggregate_counts(
                collection,
                doc! {
                    "created_date": window_filter(start, end),
                    "username": { "$exists": true, "$ne": Bson::Null },
                },
                "username",
            )
            .await?;

        // Anonymous visitors, distinct by client address.
        let anonymous = self
            .aggregate_counts(
                collection,
                doc! {
                    "created_date": window_filter(start, end),
                    "$or": [
                        { "username": { "$exists": false } },
                        { "username": Bson::Null },
                    ],
                },
                "client_ip",
            )
            .await?;

        let mut totals = identified;
        for (ad_id, count) in anonymous {
            *totals.entry(ad_id).or_insert(0) += count;
        }

        Ok(totals
            .into_iter()
            .map(|(ad_id, count)| AdAudience { ad_id, count })
            .collect())
    }
}

#[derive(Clone)]
pub struct MongoNotificationStore {
    db: Database,
}

impl MongoNotificationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationStore for MongoNotificationStore {
    async fn append(&self, notification: Notification) -> Result<()> {
        self.db
            .collection::<Document>(NOTIFICATION_COLLECTION)
            .insert_one(doc! {
                "title": notification.title,
                "content": notification.content,
                "userId": notification.user_id,
                "isRead": notification.is_read,
                "createdDate": bson::DateTime::from_chrono(notification.created_date),
                "updatedDate": bson::DateTime::from_chrono(notification.updated_date),
            })
            .await
            .map(|_| ())
            .map_err(AppError::internal)
    }
}
