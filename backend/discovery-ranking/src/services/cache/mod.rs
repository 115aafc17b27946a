//! Read-through feed cache with per-key single-flight.
//!
//! Concurrent misses on the same fingerprint share one computation; other
//! fingerprints proceed independently. Failed computations are never stored,
//! so the next request for that key recomputes.

use crate::error::{RankingError, Result};
use crate::models::FeedPage;
use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Cache schema version - increment when changing key formats
pub const CACHE_VERSION: u32 = 2;

/// Deterministic request identity.
///
/// The weights generation is part of the key so a page computed under old
/// weights is never served after an update.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub viewer_id: Option<Uuid>,
    pub filter: Option<String>,
    pub cursor: Option<String>,
    pub limit: usize,
    pub generation: u64,
}

impl Fingerprint {
    /// Format: v2:feed:{viewer|-}:{f=filter|-}:{c=cursor|-}:{limit}:g{generation}
    ///
    /// Present values carry a prefix and have `%` and `:` escaped, so no
    /// filter or cursor can read as an absent one or spill into the next field.
    pub fn key(&self) -> String {
        let viewer = self
            .viewer_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());

        format!(
            "v{}:feed:{}:{}:{}:{}:g{}",
            CACHE_VERSION,
            viewer,
            key_part("f", self.filter.as_deref()),
            key_part("c", self.cursor.as_deref()),
            self.limit,
            self.generation
        )
    }
}

fn key_part(tag: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => format!("{}={}", tag, value.replace('%', "%25").replace(':', "%3A")),
        None => "-".to_string(),
    }
}

#[derive(Clone)]
pub struct FeedCache {
    pages: Cache<String, Arc<FeedPage>>,
}

impl FeedCache {
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let pages = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { pages }
    }

    /// Return the cached page or run `compute` once for every concurrent
    /// caller of the same fingerprint
    pub async fn get_or_compute<F>(&self, fingerprint: &Fingerprint, compute: F) -> Result<Arc<FeedPage>>
    where
        F: Future<Output = Result<FeedPage>>,
    {
        let key = fingerprint.key();

        let entry = self
            .pages
            .entry(key.clone())
            .or_try_insert_with(async move { compute.await.map(Arc::new) })
            .await
            .map_err(|e: Arc<RankingError>| {
                warn!(key = %key, error = %e, "Feed computation failed, not cached");
                (*e).clone()
            })?;

        if entry.is_fresh() {
            debug!(key = %key, "Feed cache miss, computed");
        } else {
            debug!(key = %key, "Feed cache hit");
        }

        Ok(entry.into_value())
    }

    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<FeedPage>> {
        self.pages.get(&fingerprint.key()).await
    }

    pub fn invalidate_all(&self) {
        self.pages.invalidate_all();
    }

    /// Approximate: pending maintenance may not be applied yet
    pub fn entry_count(&self) -> u64 {
        self.pages.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fingerprint(viewer_id: Option<Uuid>) -> Fingerprint {
        Fingerprint {
            viewer_id,
            filter: None,
            cursor: None,
            limit: 20,
            generation: 0,
        }
    }

    fn empty_page(total: usize) -> FeedPage {
        FeedPage {
            items: Vec::new(),
            has_more: false,
            next_cursor: None,
            total_candidates: total,
            discovery_count: 0,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_fingerprint_key_format() {
        let viewer = Uuid::nil();
        let fp = Fingerprint {
            viewer_id: Some(viewer),
            filter: Some("rust".to_string()),
            cursor: Some("abc".to_string()),
            limit: 10,
            generation: 3,
        };

        assert_eq!(
            fp.key(),
            "v2:feed:00000000-0000-0000-0000-000000000000:f=rust:c=abc:10:g3"
        );
        assert_eq!(fingerprint(None).key(), "v2:feed:-:-:-:20:g0");
    }

    #[test]
    fn test_present_values_never_collide_with_absent_ones() {
        let absent = fingerprint(None);
        let literal = |filter: Option<&str>, cursor: Option<&str>| Fingerprint {
            filter: filter.map(str::to_string),
            cursor: cursor.map(str::to_string),
            ..fingerprint(None)
        };

        for (filter, cursor) in [
            (Some("all"), None),
            (Some("-"), None),
            (None, Some("start")),
            (None, Some("-")),
            (Some(""), None),
        ] {
            assert_ne!(literal(filter, cursor).key(), absent.key());
        }

        // A separator inside the filter cannot shift the cursor field
        assert_ne!(
            literal(Some("a:c=b"), None).key(),
            literal(Some("a"), Some("b")).key()
        );
    }

    #[tokio::test]
    async fn test_single_flight_for_concurrent_requests() {
        let cache = FeedCache::new(Duration::from_secs(60), 100);
        let calls = Arc::new(AtomicUsize::new(0));
        let fp = fingerprint(Some(Uuid::new_v4()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                let calls = Arc::clone(&calls);
                let fp = fp.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_compute(&fp, async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(empty_page(7))
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            let page = handle.await.unwrap().unwrap();
            assert_eq!(page.total_candidates, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_compute_independently() {
        let cache = FeedCache::new(Duration::from_secs(60), 100);
        let calls = Arc::new(AtomicUsize::new(0));

        for viewer in [Some(Uuid::new_v4()), Some(Uuid::new_v4()), None] {
            let calls = Arc::clone(&calls);
            cache
                .get_or_compute(&fingerprint(viewer), async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(empty_page(1))
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = FeedCache::new(Duration::from_secs(60), 100);
        let fp = fingerprint(None);

        let err = cache
            .get_or_compute(&fp, async {
                Err(RankingError::CandidateSource("store offline".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RankingError::CandidateSource(_)));
        assert!(cache.get(&fp).await.is_none());

        let page = cache
            .get_or_compute(&fp, async { Ok(empty_page(4)) })
            .await
            .unwrap();
        assert_eq!(page.total_candidates, 4);
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let cache = FeedCache::new(Duration::from_millis(50), 100);
        let fp = fingerprint(None);

        cache
            .get_or_compute(&fp, async { Ok(empty_page(1)) })
            .await
            .unwrap();
        assert!(cache.get(&fp).await.is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;

        let page = cache
            .get_or_compute(&fp, async { Ok(empty_page(2)) })
            .await
            .unwrap();
        assert_eq!(page.total_candidates, 2);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache = FeedCache::new(Duration::from_secs(60), 100);
        let fp = fingerprint(None);

        cache
            .get_or_compute(&fp, async { Ok(empty_page(1)) })
            .await
            .unwrap();
        cache.pages.run_pending_tasks().await;
        assert_eq!(cache.entry_count(), 1);

        cache.invalidate_all();

        assert!(cache.get(&fp).await.is_none());
    }
}
