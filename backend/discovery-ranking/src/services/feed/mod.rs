//! Feed ranking service: the request-facing entry point.
//!
//! Fetches candidates from a [`CandidateSource`], ranks them through the
//! [`DiscoveryEngine`] and serves pages through the single-flight
//! [`FeedCache`]. Weights can be tuned at runtime; every update bumps a
//! generation that is part of each cache fingerprint.

use crate::config::{Config, ScoringWeights, ServiceConfig};
use crate::error::{RankingError, Result};
use crate::models::{Candidate, FeedPage, FeedRequest, ScoredPost};
use crate::services::cache::{FeedCache, Fingerprint};
use crate::services::engine::{ranking_clock, DiscoveryEngine, FeedCursor};
use crate::services::ranking::RankingLayer;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Collaborator that supplies the candidate batch for a request
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn fetch_candidates(&self, request: &FeedRequest) -> anyhow::Result<Vec<Candidate>>;
}

/// Fixed candidate pool; the request filter selects posts carrying that hashtag
#[derive(Debug, Clone, Default)]
pub struct InMemoryCandidateSource {
    candidates: Vec<Candidate>,
}

impl InMemoryCandidateSource {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[async_trait]
impl CandidateSource for InMemoryCandidateSource {
    async fn fetch_candidates(&self, request: &FeedRequest) -> anyhow::Result<Vec<Candidate>> {
        let tag = request
            .filter
            .as_deref()
            .map(|f| f.trim().trim_start_matches('#').to_lowercase())
            .filter(|f| !f.is_empty());

        Ok(match tag {
            Some(tag) => self
                .candidates
                .iter()
                .filter(|c| has_hashtag(&c.post.content, &tag))
                .cloned()
                .collect(),
            None => self.candidates.clone(),
        })
    }
}

fn has_hashtag(content: &str, tag: &str) -> bool {
    content
        .split_whitespace()
        .filter_map(|word| word.strip_prefix('#'))
        .map(|word| word.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_'))
        .any(|word| word.to_lowercase() == tag)
}

struct ActiveWeights {
    weights: Arc<ScoringWeights>,
    generation: u64,
}

pub struct FeedRankingService {
    config: ServiceConfig,
    engine: DiscoveryEngine,
    cache: FeedCache,
    source: Arc<dyn CandidateSource>,
    active: RwLock<ActiveWeights>,
}

impl FeedRankingService {
    pub fn new(config: Config, source: Arc<dyn CandidateSource>) -> Result<Self> {
        config.service.validate()?;
        config.weights.validate()?;

        let cache = FeedCache::new(
            Duration::from_secs(config.service.cache_ttl_secs),
            config.service.cache_max_entries,
        );
        let engine = DiscoveryEngine::new(RankingLayer::new(
            config.service.parallel_scoring_threshold,
        ));

        info!(
            service = %config.service.service_name,
            cache_ttl_secs = config.service.cache_ttl_secs,
            max_page_size = config.service.max_page_size,
            "Feed ranking service initialized"
        );

        Ok(Self {
            config: config.service,
            engine,
            cache,
            source,
            active: RwLock::new(ActiveWeights {
                weights: Arc::new(config.weights),
                generation: 0,
            }),
        })
    }

    pub async fn weights(&self) -> Arc<ScoringWeights> {
        Arc::clone(&self.active.read().await.weights)
    }

    pub async fn generation(&self) -> u64 {
        self.active.read().await.generation
    }

    /// Merge a partial weights object over the active weights.
    ///
    /// Invalid patches leave the active weights untouched.
    pub async fn update_weights(&self, patch: &Value) -> Result<Arc<ScoringWeights>> {
        let mut active = self.active.write().await;
        let merged = Arc::new(active.weights.merge_patch(patch)?);

        active.weights = Arc::clone(&merged);
        active.generation += 1;
        self.cache.invalidate_all();

        info!(generation = active.generation, "Scoring weights updated");
        Ok(merged)
    }

    /// Rank one page of the feed, read through the cache.
    ///
    /// The first page is ranked at the current time; later pages reuse the
    /// ranking time and window carried by their cursor.
    pub async fn rank_feed(&self, request: &FeedRequest) -> Result<Arc<FeedPage>> {
        let limit = self.page_size(request);
        let position = self.position(request, limit)?;
        let (weights, fingerprint) = self.fingerprint(request, limit).await;

        debug!(
            key = %fingerprint.key(),
            offset = position.offset,
            limit = limit,
            window = position.window,
            "Ranking feed"
        );

        let timeout_ms = self.config.request_timeout_ms;
        let compute = self.compute_page(request, weights, position, limit);

        tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.cache.get_or_compute(&fingerprint, compute),
        )
        .await
        .map_err(|_| {
            warn!(key = %fingerprint.key(), timeout_ms = timeout_ms, "Feed ranking timed out");
            RankingError::Timeout(timeout_ms)
        })?
    }

    /// Breakdown for one post as the viewer would see it for this request.
    ///
    /// Served from the cached page when present, otherwise the request's
    /// candidate batch is scored again at the cursor's ranking time.
    pub async fn explain_post(&self, request: &FeedRequest, post_id: Uuid) -> Result<ScoredPost> {
        let limit = self.page_size(request);
        let position = self.position(request, limit)?;
        let (weights, fingerprint) = self.fingerprint(request, limit).await;

        if let Some(page) = self.cache.get(&fingerprint).await {
            if let Some(scored) = page.find(post_id) {
                return Ok(scored.clone());
            }
        }

        let candidates = self.fetch(request).await?;
        let viewer = request.viewer.clone().map(Arc::new);
        self.engine
            .explain(weights, candidates, viewer, post_id, position.ranked_at)
            .await
    }

    /// Where in the ordering this request starts. Invalid cursors are
    /// rejected before the cache or the source is touched.
    fn position(&self, request: &FeedRequest, limit: usize) -> Result<FeedCursor> {
        match request.cursor.as_deref() {
            Some(cursor) => {
                let cursor = FeedCursor::decode(cursor)?;
                Ok(FeedCursor {
                    window: cursor.window.min(self.config.max_page_size),
                    ..cursor
                })
            }
            None => Ok(FeedCursor {
                offset: 0,
                ranked_at: ranking_clock(),
                window: limit,
            }),
        }
    }

    fn page_size(&self, request: &FeedRequest) -> usize {
        request
            .limit
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size)
    }

    async fn fingerprint(
        &self,
        request: &FeedRequest,
        limit: usize,
    ) -> (Arc<ScoringWeights>, Fingerprint) {
        let active = self.active.read().await;
        let fingerprint = Fingerprint {
            viewer_id: request.viewer.as_ref().map(|v| v.viewer_id),
            filter: request.filter.clone(),
            cursor: request.cursor.clone(),
            limit,
            generation: active.generation,
        };
        (Arc::clone(&active.weights), fingerprint)
    }

    async fn fetch(&self, request: &FeedRequest) -> Result<Vec<Candidate>> {
        self.source
            .fetch_candidates(request)
            .await
            .map_err(|e| RankingError::CandidateSource(format!("{:#}", e)))
    }

    async fn compute_page(
        &self,
        request: &FeedRequest,
        weights: Arc<ScoringWeights>,
        position: FeedCursor,
        limit: usize,
    ) -> Result<FeedPage> {
        let candidates = self.fetch(request).await?;
        let viewer = request.viewer.clone().map(Arc::new);

        self.engine
            .rank_page(
                weights,
                candidates,
                viewer,
                position.offset,
                limit,
                position.window,
                position.ranked_at,
            )
            .await
    }
}
