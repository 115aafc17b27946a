//! Ranking Module
//!
//! Scores a candidate batch and orders it for the feed.
//!
//! # Workflow
//! 1. Build the same-author duplicate index over the whole batch
//! 2. Score every candidate (inline for small batches, chunked on the
//!    blocking pool for large ones)
//! 3. Sort by final score, newest first on ties, then post id
//! 4. Re-check every breakdown against its final score

use crate::config::ScoringWeights;
use crate::error::{RankingError, Result};
use crate::models::{Candidate, ScoredPost, Viewer};
use crate::services::scoring::{DuplicateIndex, PostScorer};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};

/// Batches at or below this size are scored on the calling task
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 256;

pub struct RankingLayer {
    parallel_threshold: usize,
}

impl Default for RankingLayer {
    fn default() -> Self {
        Self::new(DEFAULT_PARALLEL_THRESHOLD)
    }
}

impl RankingLayer {
    pub fn new(parallel_threshold: usize) -> Self {
        Self {
            parallel_threshold: parallel_threshold.max(1),
        }
    }

    /// Score and sort a candidate batch
    pub async fn rank_candidates(
        &self,
        weights: Arc<ScoringWeights>,
        candidates: Vec<Candidate>,
        viewer: Option<Arc<Viewer>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredPost>> {
        let candidate_count = candidates.len();
        let duplicates = Arc::new(DuplicateIndex::build(&candidates));

        let mut ranked = if candidate_count <= self.parallel_threshold {
            let scorer = PostScorer::new(&weights);
            candidates
                .iter()
                .map(|candidate| {
                    scorer.score(
                        candidate,
                        viewer.as_deref(),
                        duplicates.score_for(&candidate.post),
                        now,
                    )
                })
                .collect::<Vec<_>>()
        } else {
            self.score_chunked(weights, candidates, viewer, duplicates, now)
                .await?
        };

        ranked.sort_by(|a, b| a.rank_cmp(b));

        for scored in &ranked {
            scored.breakdown.verify(scored.post.id)?;
        }

        info!(
            candidate_count = candidate_count,
            discovery_count = ranked.iter().filter(|p| p.is_discovery()).count(),
            top_score = ranked.first().map(|p| p.final_score()).unwrap_or(0.0),
            "Ranked candidate batch"
        );

        Ok(ranked)
    }

    async fn score_chunked(
        &self,
        weights: Arc<ScoringWeights>,
        candidates: Vec<Candidate>,
        viewer: Option<Arc<Viewer>>,
        duplicates: Arc<DuplicateIndex>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredPost>> {
        let chunk_size = self.parallel_threshold;
        let shared = Arc::new(candidates);
        let total = shared.len();

        debug!(
            candidate_count = total,
            chunk_size = chunk_size,
            "Scoring batch on blocking pool"
        );

        let tasks = (0..total).step_by(chunk_size).map(|start| {
            let end = (start + chunk_size).min(total);
            let candidates = Arc::clone(&shared);
            let weights = Arc::clone(&weights);
            let viewer = viewer.clone();
            let duplicates = Arc::clone(&duplicates);

            tokio::task::spawn_blocking(move || {
                let scorer = PostScorer::new(&weights);
                candidates[start..end]
                    .iter()
                    .map(|candidate| {
                        scorer.score(
                            candidate,
                            viewer.as_deref(),
                            duplicates.score_for(&candidate.post),
                            now,
                        )
                    })
                    .collect::<Vec<_>>()
            })
        });

        let chunks = try_join_all(tasks)
            .await
            .map_err(|e| RankingError::Internal(format!("scoring task failed: {}", e)))?;

        Ok(chunks.into_iter().flatten().collect())
    }
}
