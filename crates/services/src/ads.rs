//! Advertisement use cases: admin-only creation, cache-aside single reads
//! with view-history recording, click recording, and the prior-day
//! unique-visitor aggregation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as TimeDelta, NaiveTime, Utc};

use domains::{
    AdAudience, AdRepo, Advertisement, AppError, HistoryEvent, HistoryKind, HistoryStore,
    NewAdvertisement, ObjectCache, Result, User, UserRole,
};

fn cache_key(ad_id: i64) -> String {
    format!("ad:{ad_id}")
}

/// `[yesterday 00:00, today 00:00)` in UTC.
pub fn prior_day_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc();
    (today - TimeDelta::days(1), today)
}

#[derive(Clone)]
pub struct AdService {
    ads: Arc<dyn AdRepo>,
    cache: Arc<dyn ObjectCache>,
    history: Arc<dyn HistoryStore>,
    cache_ttl: Duration,
}

impl AdService {
    pub fn new(
        ads: Arc<dyn AdRepo>,
        cache: Arc<dyn ObjectCache>,
        history: Arc<dyn HistoryStore>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            ads,
            cache,
            history,
            cache_ttl,
        }
    }

    pub async fn create(&self, caller: &User, ad: NewAdvertisement) -> Result<Advertisement> {
        if caller.role != UserRole::Admin {
            return Err(AppError::Forbidden(
                "only administrators can create advertisements".to_string(),
            ));
        }
        let created = self.ads.insert(ad).await?;
        self.cache_best_effort(&created).await;
        Ok(created)
    }

    pub async fn list(&self) -> Result<Vec<Advertisement>> {
        self.ads.list_active().await
    }

    /// Cache-aside read plus a view-history record. A cache hit is served
    /// as-is, without re-checking the soft-delete flag against the
    /// relational store; a since-deleted ad stays servable until its entry
    /// expires.
    pub async fn get(
        &self,
        ad_id: i64,
        viewer: Option<&User>,
        client_ip: String,
        is_true_view: bool,
    ) -> Result<Advertisement> {
        let ad = match self.cached(ad_id).await {
            Some(ad) => ad,
            None => {
                let ad = self
                    .ads
                    .find_active(ad_id)
                    .await?
                    .ok_or(AppError::NotFound("Advertisement"))?;
                self.cache_best_effort(&ad).await;
                ad
            }
        };

        let event = HistoryEvent {
            ad_id,
            username: viewer.map(|user| user.username.clone()),
            client_ip,
            is_true_view: Some(is_true_view),
            created_date: Utc::now(),
        };
        if let Err(err) = self.history.record(HistoryKind::View, event).await {
            tracing::warn!(ad_id, %err, "view history record failed");
        }

        Ok(ad)
    }

    /// Click recording is the operation itself, so store failures here are
    /// surfaced rather than suppressed.
    pub async fn click(&self, ad_id: i64, viewer: Option<&User>, client_ip: String) -> Result<()> {
        if self.ads.find_active(ad_id).await?.is_none() {
            return Err(AppError::NotFound("Advertisement"));
        }
        self.history
            .record(
                HistoryKind::Click,
                HistoryEvent {
                    ad_id,
                    username: viewer.map(|user| user.username.clone()),
                    client_ip,
                    is_true_view: None,
                    created_date: Utc::now(),
                },
            )
            .await
    }

    pub async fn view_history(&self) -> Result<Vec<AdAudience>> {
        let (start, end) = prior_day_window(Utc::now());
        self.history
            .unique_visitors(HistoryKind::View, start, end)
            .await
    }

    pub async fn click_history(&self) -> Result<Vec<AdAudience>> {
        let (start, end) = prior_day_window(Utc::now());
        self.history
            .unique_visitors(HistoryKind::Click, start, end)
            .await
    }

    async fn cached(&self, ad_id: i64) -> Option<Advertisement> {
        let payload = match self.cache.get(&cache_key(ad_id)).await {
            Ok(payload) => payload?,
            Err(err) => {
                tracing::warn!(ad_id, %err, "ad cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&payload) {
            Ok(ad) => {
                tracing::debug!(ad_id, "ad cache hit");
                Some(ad)
            }
            Err(err) => {
                tracing::warn!(ad_id, %err, "discarding undecodable ad cache entry");
                None
            }
        }
    }

    async fn cache_best_effort(&self, ad: &Advertisement) {
        let payload = match serde_json::to_string(ad) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(ad_id = ad.id, %err, "ad serialization failed");
                return;
            }
        };
        if let Err(err) = self
            .cache
            .put(&cache_key(ad.id), &payload, Some(self.cache_ttl))
            .await
        {
            tracing::warn!(ad_id = ad.id, %err, "ad cache population failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use domains::{Lifecycle, MockAdRepo, MockHistoryStore, MockObjectCache};
    use mockall::predicate::eq;

    fn user(id: i64, role: UserRole) -> User {
        let now = Utc::now();
        User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@test.com"),
            password_hash: String::new(),
            role,
            last_login: None,
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn ad(id: i64) -> Advertisement {
        let now = Utc::now();
        Advertisement {
            id,
            title: "sale".to_string(),
            content: "banner".to_string(),
            is_visible: true,
            start_date: None,
            end_date: None,
            view_count: 0,
            click_count: 0,
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn service(
        ads: MockAdRepo,
        cache: MockObjectCache,
        history: MockHistoryStore,
    ) -> AdService {
        AdService::new(
            Arc::new(ads),
            Arc::new(cache),
            Arc::new(history),
            Duration::from_secs(3600),
        )
    }

    #[test]
    fn test_prior_day_window_is_midnight_aligned() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 15, 42, 7).unwrap();
        let (start, end) = prior_day_window(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 9, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_member_cannot_create() {
        let mut ads = MockAdRepo::new();
        ads.expect_insert().times(0);
        let err = service(ads, MockObjectCache::new(), MockHistoryStore::new())
            .create(
                &user(2, UserRole::Member),
                NewAdvertisement {
                    title: "sale".into(),
                    content: String::new(),
                    is_visible: true,
                    start_date: None,
                    end_date: None,
                    view_count: 0,
                    click_count: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_relational_store() {
        let mut ads = MockAdRepo::new();
        ads.expect_find_active().times(0);
        let mut cache = MockObjectCache::new();
        cache
            .expect_get()
            .with(eq("ad:5"))
            .returning(|_| Ok(Some(serde_json::to_string(&ad(5)).unwrap())));
        let mut history = MockHistoryStore::new();
        history.expect_record().times(1).returning(|_, _| Ok(()));

        let found = service(ads, cache, history)
            .get(5, None, "10.0.0.1".into(), false)
            .await
            .unwrap();
        assert_eq!(found.id, 5);
    }

    #[tokio::test]
    async fn test_cache_miss_populates_and_records_anonymous_view() {
        let mut ads = MockAdRepo::new();
        ads.expect_find_active()
            .with(eq(5))
            .returning(|id| Ok(Some(ad(id))));
        let mut cache = MockObjectCache::new();
        cache.expect_get().returning(|_| Ok(None));
        cache
            .expect_put()
            .withf(|key, _, ttl| key == "ad:5" && *ttl == Some(Duration::from_secs(3600)))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let mut history = MockHistoryStore::new();
        history
            .expect_record()
            .withf(|kind, event| {
                *kind == HistoryKind::View
                    && event.username.is_none()
                    && event.client_ip == "10.0.0.1"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        service(ads, cache, history)
            .get(5, None, "10.0.0.1".into(), false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_missing_ad_is_not_found() {
        let mut ads = MockAdRepo::new();
        ads.expect_find_active().returning(|_| Ok(None));
        let mut cache = MockObjectCache::new();
        cache.expect_get().returning(|_| Ok(None));
        let mut history = MockHistoryStore::new();
        history.expect_record().times(0);

        let err = service(ads, cache, history)
            .get(99, None, "10.0.0.1".into(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Advertisement")));
    }

    #[tokio::test]
    async fn test_click_requires_active_ad() {
        let mut ads = MockAdRepo::new();
        ads.expect_find_active().returning(|_| Ok(None));
        let mut history = MockHistoryStore::new();
        history.expect_record().times(0);

        let err = service(ads, MockObjectCache::new(), history)
            .click(99, None, "10.0.0.1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
