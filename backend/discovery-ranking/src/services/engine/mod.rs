//! Discovery engine: one ranking pass from candidate batch to feed page.
//!
//! Scoring and sorting happen in [`RankingLayer`], the discovery floor in
//! [`DiversityLayer`]. Windows are aligned to the first page's size so every
//! page honors the floor on its own.

use crate::config::ScoringWeights;
use crate::error::{RankingError, Result};
use crate::models::{Candidate, FeedPage, ScoredPost, Viewer};
use crate::services::diversity::DiversityLayer;
use crate::services::ranking::RankingLayer;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct DiscoveryEngine {
    ranking: RankingLayer,
}

impl Default for DiscoveryEngine {
    fn default() -> Self {
        Self::new(RankingLayer::default())
    }
}

impl DiscoveryEngine {
    pub fn new(ranking: RankingLayer) -> Self {
        Self { ranking }
    }

    /// Full ordering of the batch after scoring and the discovery floor
    pub async fn rank_all(
        &self,
        weights: Arc<ScoringWeights>,
        candidates: Vec<Candidate>,
        viewer: Option<Arc<Viewer>>,
        window: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredPost>> {
        let diversity = DiversityLayer::new(weights.diversity.discovery_floor);
        let ranked = self
            .ranking
            .rank_candidates(weights, candidates, viewer, now)
            .await?;

        Ok(diversity.rerank(ranked, window))
    }

    /// One page of the ordering.
    ///
    /// `window` is the discovery-floor window size. Follow-up pages pass the
    /// window and `now` carried in their cursor so the ordering under the
    /// offset stays the one the first page was cut from.
    #[allow(clippy::too_many_arguments)]
    pub async fn rank_page(
        &self,
        weights: Arc<ScoringWeights>,
        candidates: Vec<Candidate>,
        viewer: Option<Arc<Viewer>>,
        offset: usize,
        limit: usize,
        window: usize,
        now: DateTime<Utc>,
    ) -> Result<FeedPage> {
        let ordered = self.rank_all(weights, candidates, viewer, window, now).await?;
        let total_candidates = ordered.len();

        let items: Vec<ScoredPost> = ordered.into_iter().skip(offset).take(limit).collect();
        let end = offset.saturating_add(items.len());
        let has_more = end < total_candidates;
        let discovery_count = items.iter().filter(|p| p.is_discovery()).count();

        debug!(
            offset = offset,
            returned = items.len(),
            window = window,
            discovery_count = discovery_count,
            has_more = has_more,
            "Built feed page"
        );

        let next_cursor = has_more.then(|| {
            FeedCursor {
                offset: end,
                ranked_at: now,
                window,
            }
            .encode()
        });

        Ok(FeedPage {
            items,
            has_more,
            next_cursor,
            total_candidates,
            discovery_count,
            generated_at: now,
        })
    }

    /// Re-score the batch and return the breakdown for one post
    pub async fn explain(
        &self,
        weights: Arc<ScoringWeights>,
        candidates: Vec<Candidate>,
        viewer: Option<Arc<Viewer>>,
        post_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ScoredPost> {
        self.ranking
            .rank_candidates(weights, candidates, viewer, now)
            .await?
            .into_iter()
            .find(|scored| scored.post.id == post_id)
            .ok_or(RankingError::PostNotFound(post_id))
    }
}

/// Current time truncated to the millisecond precision a cursor carries
pub fn ranking_clock() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.timestamp_millis_opt(now.timestamp_millis())
        .single()
        .unwrap_or(now)
}

/// Position in a ranked feed.
///
/// Carries the ranking time and window size of the first page so every later
/// page is cut from the same ordering. Encoded as URL-safe base64 of
/// `offset:<n>:at:<unix_ms>:window:<w>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedCursor {
    pub offset: usize,
    pub ranked_at: DateTime<Utc>,
    pub window: usize,
}

impl FeedCursor {
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!(
            "offset:{}:at:{}:window:{}",
            self.offset,
            self.ranked_at.timestamp_millis(),
            self.window
        ))
    }

    pub fn decode(cursor: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor.trim())
            .map_err(|e| RankingError::InvalidCursor(format!("not base64: {}", e)))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| RankingError::InvalidCursor("not utf-8".to_string()))?;

        let malformed = || RankingError::InvalidCursor(format!("unexpected payload '{}'", text));

        let parts: Vec<&str> = text.split(':').collect();
        let ["offset", offset, "at", millis, "window", window] = parts.as_slice() else {
            return Err(malformed());
        };

        let offset = offset.parse::<usize>().map_err(|_| malformed())?;
        let millis = millis.parse::<i64>().map_err(|_| malformed())?;
        let window = window
            .parse::<usize>()
            .ok()
            .filter(|w| *w > 0)
            .ok_or_else(malformed)?;
        let ranked_at = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(malformed)?;

        Ok(Self {
            offset,
            ranked_at,
            window,
        })
    }
}
